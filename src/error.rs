// src/error.rs

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TetherError {
  // --- I/O Errors ---
  #[error("I/O error: {0}")]
  Io(#[from] io::Error),

  // --- Timeouts ---
  #[error("Operation timed out")]
  Timeout,

  // --- Endpoint Errors ---
  #[error("Invalid endpoint format: {0}")]
  InvalidEndpoint(String),
  #[error("Address already in use: {0}")]
  AddrInUse(String),
  #[error("Address not available: {0}")]
  AddrNotAvailable(String),
  #[error("Permission denied for endpoint: {0}")]
  PermissionDenied(String),

  // --- Option Errors ---
  #[error("Invalid value provided for option '{0}'")]
  InvalidOptionValue(String),
  #[error("Cipher not supported: {0}")]
  UnsupportedCipher(String),

  // --- State Errors ---
  #[error("Operation is invalid for the socket type ({0})")]
  InvalidSocketType(&'static str),
  #[error("Operation is invalid for the current socket state: {0}")]
  InvalidState(&'static str),

  // --- Protocol Errors ---
  #[error("Framing protocol violation: {0}")]
  ProtocolViolation(String),
  #[error("Invalid message format for operation: {0}")]
  InvalidMessage(String),

  // --- Security Errors ---
  #[error("Encryption/Decryption error: {0}")]
  EncryptionError(String),
}

pub type TetherResult<T> = Result<T, TetherError>;

impl TetherError {
  /// Maps a bind/listen error onto the endpoint-aware variants.
  pub fn from_io_endpoint(e: io::Error, endpoint: &str) -> Self {
    match e.kind() {
      io::ErrorKind::AddrInUse => TetherError::AddrInUse(endpoint.to_string()),
      io::ErrorKind::AddrNotAvailable => TetherError::AddrNotAvailable(endpoint.to_string()),
      io::ErrorKind::PermissionDenied => TetherError::PermissionDenied(endpoint.to_string()),
      io::ErrorKind::TimedOut => TetherError::Timeout,
      _ => TetherError::Io(e),
    }
  }

  /// Returns the underlying I/O error, if this error wraps one.
  pub fn as_io(&self) -> Option<&io::Error> {
    match self {
      TetherError::Io(e) => Some(e),
      _ => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn bind_errors_keep_the_endpoint() {
    let err = TetherError::from_io_endpoint(io::Error::from(io::ErrorKind::AddrInUse), "tcp://127.0.0.1:1");
    assert!(matches!(err, TetherError::AddrInUse(ref s) if s == "tcp://127.0.0.1:1"));

    let err = TetherError::from_io_endpoint(io::Error::from(io::ErrorKind::Other), "tcp://127.0.0.1:1");
    assert!(err.as_io().is_some());
  }
}
