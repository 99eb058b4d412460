// src/protocol/amp/codec.rs

use super::{AMP_VERSION, HEADER_LEN, MAX_PARTS, MAX_PART_SIZE, PART_LEN_PREFIX};
use crate::error::TetherError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Encodes an ordered list of parts into a single frame.
pub fn encode(parts: &[Bytes]) -> Result<Bytes, TetherError> {
  if parts.len() > MAX_PARTS {
    return Err(TetherError::InvalidMessage(format!(
      "a frame holds at most {} parts, got {}",
      MAX_PARTS,
      parts.len()
    )));
  }

  let body_len: usize = parts.iter().map(|p| PART_LEN_PREFIX + p.len()).sum();
  let mut dst = BytesMut::with_capacity(HEADER_LEN + body_len);
  dst.put_u8((AMP_VERSION << 4) | parts.len() as u8);
  for part in parts {
    let len = u32::try_from(part.len())
      .map_err(|_| TetherError::InvalidMessage(format!("part of {} bytes is too large to frame", part.len())))?;
    dst.put_u32(len);
    dst.put_slice(part);
  }
  Ok(dst.freeze())
}

/// Decodes one complete frame back into its parts.
///
/// The slice must contain exactly one frame; trailing bytes are a violation.
pub fn decode(frame: &[u8]) -> Result<Vec<Bytes>, TetherError> {
  let mut src = frame;
  if src.is_empty() {
    return Err(TetherError::ProtocolViolation("empty frame".into()));
  }
  let argc = check_header(src[0])?;
  src.advance(HEADER_LEN);

  let mut parts = Vec::with_capacity(argc);
  for index in 0..argc {
    if src.len() < PART_LEN_PREFIX {
      return Err(TetherError::ProtocolViolation(format!("truncated length of part {}", index)));
    }
    let len = src.get_u32() as usize;
    if src.len() < len {
      return Err(TetherError::ProtocolViolation(format!(
        "part {} declares {} bytes but only {} remain",
        index,
        len,
        src.len()
      )));
    }
    parts.push(Bytes::copy_from_slice(&src[..len]));
    src.advance(len);
  }

  if !src.is_empty() {
    return Err(TetherError::ProtocolViolation(format!(
      "{} trailing bytes after frame",
      src.len()
    )));
  }
  Ok(parts)
}

fn check_header(header: u8) -> Result<usize, TetherError> {
  let version = header >> 4;
  if version != AMP_VERSION {
    return Err(TetherError::ProtocolViolation(format!(
      "unsupported frame version {}",
      version
    )));
  }
  Ok((header & 0x0f) as usize)
}

/// Splits a byte stream into raw frames without decoding the parts.
///
/// Frames are handed out whole so that the socket's packer (plain or secure)
/// can interpret them.
#[derive(Debug, Default)]
pub struct AmpFrameCodec {
  _priv: (),
}

impl AmpFrameCodec {
  pub fn new() -> Self {
    Self::default()
  }

  /// Returns the total length of the frame at the start of `src`, or `None`
  /// if more bytes are needed to know it.
  fn frame_len(src: &[u8]) -> Result<Option<usize>, TetherError> {
    if src.is_empty() {
      return Ok(None);
    }
    let argc = check_header(src[0])?;
    let mut offset = HEADER_LEN;
    for _ in 0..argc {
      if src.len() < offset + PART_LEN_PREFIX {
        return Ok(None);
      }
      let mut len_bytes = &src[offset..offset + PART_LEN_PREFIX];
      let len = len_bytes.get_u32() as usize;
      if len > MAX_PART_SIZE {
        return Err(TetherError::ProtocolViolation(format!(
          "part of {} bytes exceeds limit of {}",
          len, MAX_PART_SIZE
        )));
      }
      offset += PART_LEN_PREFIX + len;
    }
    Ok(Some(offset))
  }
}

impl Decoder for AmpFrameCodec {
  type Item = Bytes;
  type Error = TetherError;

  fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
    match Self::frame_len(src)? {
      Some(total) if src.len() >= total => Ok(Some(src.split_to(total).freeze())),
      Some(total) => {
        src.reserve(total - src.len());
        Ok(None)
      }
      None => Ok(None),
    }
  }
}

// Frames are packed before they reach the writer, so encoding is a copy.
impl Encoder<Bytes> for AmpFrameCodec {
  type Error = TetherError;

  fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
    dst.reserve(item.len());
    dst.put_slice(&item);
    Ok(())
  }
}
