// src/security/cipher.rs

use crate::error::TetherError;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce as AesNonce};
use chacha20poly1305::{ChaCha20Poly1305, Nonce as ChaChaNonce};
use sha2::{Digest, Sha256};

/// Length of the random nonce prepended to every sealed payload.
pub const NONCE_LEN: usize = 12;

/// Encrypts and decrypts complete, already framed payloads.
///
/// `encrypt` returns `nonce || ciphertext`; `decrypt` expects the same layout.
pub trait IDataCipher: Send + Sync + 'static {
  /// Canonical name of the cipher (as accepted by the `cipher` option).
  fn name(&self) -> &'static str;

  /// Encrypts a single, complete block of plaintext bytes.
  fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, TetherError>;

  /// Decrypts a single, complete block produced by `encrypt`.
  fn decrypt(&self, sealed: &[u8]) -> Result<Vec<u8>, TetherError>;
}

/// Ciphers selectable through the `cipher` socket option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherKind {
  Aes256Gcm,
  ChaCha20Poly1305,
}

impl CipherKind {
  /// Resolves a cipher name. `aes256` is the default name.
  pub fn from_name(name: &str) -> Result<Self, TetherError> {
    match name.to_ascii_lowercase().as_str() {
      "aes256" | "aes-256-gcm" | "aes256gcm" => Ok(CipherKind::Aes256Gcm),
      "chacha20-poly1305" | "chacha20poly1305" | "chacha20" => Ok(CipherKind::ChaCha20Poly1305),
      _ => Err(TetherError::UnsupportedCipher(name.to_string())),
    }
  }

  /// Builds a cipher keyed from the shared secret.
  pub fn build(self, secret: &str) -> Box<dyn IDataCipher> {
    let key = derive_key(secret);
    match self {
      CipherKind::Aes256Gcm => Box::new(Aes256GcmCipher {
        cipher: Aes256Gcm::new(&key.into()),
      }),
      CipherKind::ChaCha20Poly1305 => Box::new(ChaCha20Poly1305Cipher {
        cipher: ChaCha20Poly1305::new(&key.into()),
      }),
    }
  }
}

/// Both ciphers take a 256-bit key; the secret is stretched with SHA-256.
fn derive_key(secret: &str) -> [u8; 32] {
  Sha256::digest(secret.as_bytes()).into()
}

fn split_sealed(sealed: &[u8]) -> Result<(&[u8], &[u8]), TetherError> {
  if sealed.len() < NONCE_LEN {
    return Err(TetherError::EncryptionError(format!(
      "sealed payload of {} bytes is shorter than its nonce",
      sealed.len()
    )));
  }
  Ok(sealed.split_at(NONCE_LEN))
}

fn seal(nonce: [u8; NONCE_LEN], ciphertext: Vec<u8>) -> Vec<u8> {
  let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
  out.extend_from_slice(&nonce);
  out.extend_from_slice(&ciphertext);
  out
}

struct Aes256GcmCipher {
  cipher: Aes256Gcm,
}

impl IDataCipher for Aes256GcmCipher {
  fn name(&self) -> &'static str {
    "aes256"
  }

  fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, TetherError> {
    let nonce: [u8; NONCE_LEN] = rand::random();
    tracing::trace!(cipher = self.name(), len = plaintext.len(), "encrypting payload");
    let ciphertext = self
      .cipher
      .encrypt(AesNonce::from_slice(&nonce), plaintext)
      .map_err(|_| TetherError::EncryptionError("aes256 encryption failed".into()))?;
    Ok(seal(nonce, ciphertext))
  }

  fn decrypt(&self, sealed: &[u8]) -> Result<Vec<u8>, TetherError> {
    let (nonce, ciphertext) = split_sealed(sealed)?;
    tracing::trace!(cipher = self.name(), len = ciphertext.len(), "decrypting payload");
    self
      .cipher
      .decrypt(AesNonce::from_slice(nonce), ciphertext)
      .map_err(|_| TetherError::EncryptionError("aes256 decryption failed (cipher or secret mismatch?)".into()))
  }
}

struct ChaCha20Poly1305Cipher {
  cipher: ChaCha20Poly1305,
}

impl IDataCipher for ChaCha20Poly1305Cipher {
  fn name(&self) -> &'static str {
    "chacha20-poly1305"
  }

  fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, TetherError> {
    let nonce: [u8; NONCE_LEN] = rand::random();
    tracing::trace!(cipher = self.name(), len = plaintext.len(), "encrypting payload");
    let ciphertext = self
      .cipher
      .encrypt(ChaChaNonce::from_slice(&nonce), plaintext)
      .map_err(|_| TetherError::EncryptionError("chacha20-poly1305 encryption failed".into()))?;
    Ok(seal(nonce, ciphertext))
  }

  fn decrypt(&self, sealed: &[u8]) -> Result<Vec<u8>, TetherError> {
    let (nonce, ciphertext) = split_sealed(sealed)?;
    tracing::trace!(cipher = self.name(), len = ciphertext.len(), "decrypting payload");
    self.cipher.decrypt(ChaChaNonce::from_slice(nonce), ciphertext).map_err(|_| {
      TetherError::EncryptionError("chacha20-poly1305 decryption failed (cipher or secret mismatch?)".into())
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn cipher_names_resolve() {
    assert_eq!(CipherKind::from_name("aes256").unwrap(), CipherKind::Aes256Gcm);
    assert_eq!(CipherKind::from_name("AES-256-GCM").unwrap(), CipherKind::Aes256Gcm);
    assert_eq!(CipherKind::from_name("chacha20").unwrap(), CipherKind::ChaCha20Poly1305);
    assert!(matches!(
      CipherKind::from_name("rot13"),
      Err(TetherError::UnsupportedCipher(ref n)) if n == "rot13"
    ));
  }

  #[test]
  fn each_cipher_opens_what_it_sealed() {
    for kind in [CipherKind::Aes256Gcm, CipherKind::ChaCha20Poly1305] {
      let cipher = kind.build("shared");
      let sealed = cipher.encrypt(b"attack at dawn").unwrap();
      assert_ne!(&sealed[NONCE_LEN..], b"attack at dawn");
      assert_eq!(cipher.decrypt(&sealed).unwrap(), b"attack at dawn");
    }
  }

  #[test]
  fn nonces_differ_between_messages() {
    let cipher = CipherKind::Aes256Gcm.build("shared");
    let a = cipher.encrypt(b"same").unwrap();
    let b = cipher.encrypt(b"same").unwrap();
    assert_ne!(a, b);
  }

  #[test]
  fn wrong_secret_or_cipher_fails_to_open() {
    let sealed = CipherKind::Aes256Gcm.build("one").encrypt(b"payload").unwrap();
    assert!(matches!(
      CipherKind::Aes256Gcm.build("two").decrypt(&sealed),
      Err(TetherError::EncryptionError(_))
    ));
    assert!(matches!(
      CipherKind::ChaCha20Poly1305.build("one").decrypt(&sealed),
      Err(TetherError::EncryptionError(_))
    ));
  }

  #[test]
  fn short_payload_is_an_error() {
    let cipher = CipherKind::Aes256Gcm.build("one");
    assert!(matches!(cipher.decrypt(&[1, 2, 3]), Err(TetherError::EncryptionError(_))));
  }
}
