// src/security/packer.rs

use std::fmt;

use bytes::Bytes;

use super::cipher::{CipherKind, IDataCipher};
use crate::error::TetherError;
use crate::protocol::amp;

/// Turns message parts into one wire frame and back.
///
/// Implementations must be cheap to call from synchronous send paths.
pub trait IPacker: Send + Sync + 'static {
  fn pack(&self, parts: &[Bytes]) -> Result<Bytes, TetherError>;
  fn unpack(&self, frame: &[u8]) -> Result<Vec<Bytes>, TetherError>;

  /// True when frames are encrypted.
  fn is_secure(&self) -> bool {
    false
  }
}

/// Frames parts as-is.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainPacker;

impl IPacker for PlainPacker {
  fn pack(&self, parts: &[Bytes]) -> Result<Bytes, TetherError> {
    amp::encode(parts)
  }

  fn unpack(&self, frame: &[u8]) -> Result<Vec<Bytes>, TetherError> {
    amp::decode(frame)
  }
}

/// Encrypts the whole plain frame and carries `nonce || ciphertext` as the
/// single part of an outer frame.
pub struct SecurePacker {
  cipher: Box<dyn IDataCipher>,
}

impl SecurePacker {
  pub fn new(kind: CipherKind, secret: &str) -> Self {
    Self {
      cipher: kind.build(secret),
    }
  }
}

impl fmt::Debug for SecurePacker {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SecurePacker")
      .field("cipher", &self.cipher.name())
      .finish()
  }
}

impl IPacker for SecurePacker {
  fn pack(&self, parts: &[Bytes]) -> Result<Bytes, TetherError> {
    let inner = amp::encode(parts)?;
    let sealed = self.cipher.encrypt(&inner)?;
    amp::encode(&[Bytes::from(sealed)])
  }

  fn unpack(&self, frame: &[u8]) -> Result<Vec<Bytes>, TetherError> {
    let outer = amp::decode(frame)?;
    let sealed = match outer.as_slice() {
      [sealed] => sealed,
      other => {
        return Err(TetherError::EncryptionError(format!(
          "secure frame must carry one part, got {}",
          other.len()
        )))
      }
    };
    let inner = self.cipher.decrypt(sealed)?;
    amp::decode(&inner)
  }

  fn is_secure(&self) -> bool {
    true
  }
}
