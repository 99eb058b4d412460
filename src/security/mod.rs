// src/security/mod.rs

//! Optional message-level encryption.
//!
//! Sockets always move frames through an [`IPacker`]. When the `secure`
//! option is off that is the [`PlainPacker`]; when it is on, frames are
//! sealed by a [`SecurePacker`] keyed from the `secret` option.

pub mod cipher;
pub mod packer;

use std::sync::Arc;

pub use cipher::{CipherKind, IDataCipher, NONCE_LEN};
pub use packer::{IPacker, PlainPacker, SecurePacker};

use crate::error::TetherError;
use crate::socket::options::{SocketOptions, DEFAULT_SECRET};

/// Builds the packer described by the current options.
pub(crate) fn packer_for(options: &SocketOptions) -> Result<Arc<dyn IPacker>, TetherError> {
  // Validated even while insecure, so a bad name fails when it is set.
  let kind = CipherKind::from_name(&options.cipher)?;
  if !options.secure {
    return Ok(Arc::new(PlainPacker));
  }
  if options.secret == DEFAULT_SECRET {
    tracing::warn!(
      cipher = %options.cipher,
      "Secure mode enabled with the default secret. Set the 'secret' option to a private value."
    );
  }
  Ok(Arc::new(SecurePacker::new(kind, &options.secret)))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn insecure_options_give_plain_packer() {
    let packer = packer_for(&SocketOptions::default()).unwrap();
    assert!(!packer.is_secure());
  }

  #[test]
  fn secure_options_give_secure_packer() {
    let mut opts = SocketOptions::default();
    opts.secure = true;
    opts.secret = "k".into();
    assert!(packer_for(&opts).unwrap().is_secure());
  }

  #[test]
  fn unknown_cipher_is_unsupported() {
    let mut opts = SocketOptions::default();
    opts.secure = true;
    opts.cipher = "rot13".into();
    assert!(matches!(packer_for(&opts), Err(TetherError::UnsupportedCipher(ref c)) if c == "rot13"));
  }
}
