// src/message/msg.rs

use bytes::Bytes;
use std::fmt;

/// One logical message: the ordered list of byte-string parts a caller passed
/// to `send`. It travels as a single frame on the wire.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Msg {
  parts: Vec<Bytes>,
}

impl Msg {
  /// Creates a message with no parts.
  pub fn new() -> Self {
    Self::default()
  }

  /// Creates a message from already split parts.
  pub fn from_parts(parts: Vec<Bytes>) -> Self {
    Self { parts }
  }

  /// Creates a single-part message from a `Vec<u8>`, taking ownership.
  pub fn from_vec(data: Vec<u8>) -> Self {
    Self::from_bytes(Bytes::from(data))
  }

  /// Creates a single-part message from `bytes::Bytes`.
  pub fn from_bytes(data: Bytes) -> Self {
    Self { parts: vec![data] }
  }

  /// Creates a single-part message from a static byte slice (zero-copy).
  pub fn from_static(data: &'static [u8]) -> Self {
    Self::from_bytes(Bytes::from_static(data))
  }

  /// Appends a part, builder style.
  pub fn with_part(mut self, part: impl Into<Bytes>) -> Self {
    self.parts.push(part.into());
    self
  }

  /// Appends a part.
  pub fn push(&mut self, part: impl Into<Bytes>) {
    self.parts.push(part.into());
  }

  /// Returns the payload of the first part, if any.
  pub fn data(&self) -> Option<&[u8]> {
    self.parts.first().map(|b| b.as_ref())
  }

  pub fn parts(&self) -> &[Bytes] {
    &self.parts
  }

  pub fn into_parts(self) -> Vec<Bytes> {
    self.parts
  }

  /// Number of parts.
  pub fn len(&self) -> usize {
    self.parts.len()
  }

  pub fn is_empty(&self) -> bool {
    self.parts.is_empty()
  }

  /// Total payload size across all parts, in bytes.
  pub fn size(&self) -> usize {
    self.parts.iter().map(|p| p.len()).sum()
  }
}

impl From<Vec<Bytes>> for Msg {
  fn from(parts: Vec<Bytes>) -> Self {
    Self::from_parts(parts)
  }
}

impl From<&'static str> for Msg {
  fn from(s: &'static str) -> Self {
    Self::from_static(s.as_bytes())
  }
}

impl From<String> for Msg {
  fn from(s: String) -> Self {
    Self::from_vec(s.into_bytes())
  }
}

impl From<Vec<u8>> for Msg {
  fn from(data: Vec<u8>) -> Self {
    Self::from_vec(data)
  }
}

impl From<Bytes> for Msg {
  fn from(data: Bytes) -> Self {
    Self::from_bytes(data)
  }
}

impl fmt::Debug for Msg {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    // Avoid printing large payloads
    f.debug_struct("Msg")
      .field("parts", &self.parts.len())
      .field("size", &self.size())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parts_keep_their_order() {
    let msg = Msg::from("topic").with_part(Bytes::from_static(b"payload")).with_part(vec![1u8, 2, 3]);
    assert_eq!(msg.len(), 3);
    assert_eq!(msg.data(), Some(&b"topic"[..]));
    assert_eq!(msg.parts()[1].as_ref(), b"payload");
    assert_eq!(msg.size(), 5 + 7 + 3);
  }

  #[test]
  fn empty_message_has_no_data() {
    let msg = Msg::new();
    assert!(msg.is_empty());
    assert_eq!(msg.data(), None);
    assert_eq!(msg.size(), 0);
  }
}
