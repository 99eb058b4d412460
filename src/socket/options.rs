// src/socket/options.rs

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::error::TetherError;

// Option keys, as accepted by `Socket::set_option`.
pub const HWM: &str = "hwm";
pub const IDENTITY: &str = "identity";
pub const RETRY_TIMEOUT: &str = "retry timeout";
pub const RETRY_MAX_TIMEOUT: &str = "retry max timeout";
pub const SECURE: &str = "secure";
pub const CIPHER: &str = "cipher";
pub const SECRET: &str = "secret";

/// Keys whose change re-installs the packer.
pub const SECURITY_OPTIONS: [&str; 3] = [SECURE, CIPHER, SECRET];

pub const DEFAULT_RETRY_TIMEOUT_MS: u64 = 100;
pub const DEFAULT_RETRY_MAX_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_CIPHER: &str = "aes256";
/// Documented insecure default; using it logs a warning.
pub const DEFAULT_SECRET: &str = "secret";

/// A value stored under an option key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
  Bool(bool),
  Int(i64),
  Str(String),
  Duration(Duration),
}

impl fmt::Display for OptionValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      OptionValue::Bool(b) => write!(f, "{}", b),
      OptionValue::Int(i) => write!(f, "{}", i),
      OptionValue::Str(s) => write!(f, "{}", s),
      OptionValue::Duration(d) => write!(f, "{}ms", d.as_millis()),
    }
  }
}

impl From<bool> for OptionValue {
  fn from(v: bool) -> Self {
    OptionValue::Bool(v)
  }
}

impl From<i32> for OptionValue {
  fn from(v: i32) -> Self {
    OptionValue::Int(v as i64)
  }
}

impl From<i64> for OptionValue {
  fn from(v: i64) -> Self {
    OptionValue::Int(v)
  }
}

impl From<u32> for OptionValue {
  fn from(v: u32) -> Self {
    OptionValue::Int(v as i64)
  }
}

impl From<u64> for OptionValue {
  fn from(v: u64) -> Self {
    OptionValue::Int(v.min(i64::MAX as u64) as i64)
  }
}

impl From<usize> for OptionValue {
  fn from(v: usize) -> Self {
    OptionValue::Int(v.min(i64::MAX as usize) as i64)
  }
}

impl From<&str> for OptionValue {
  fn from(v: &str) -> Self {
    OptionValue::Str(v.to_string())
  }
}

impl From<String> for OptionValue {
  fn from(v: String) -> Self {
    OptionValue::Str(v)
  }
}

impl From<Duration> for OptionValue {
  fn from(v: Duration) -> Self {
    OptionValue::Duration(v)
  }
}

/// Holds parsed and validated socket options.
#[derive(Debug, Clone)]
pub(crate) struct SocketOptions {
  /// Queue high-water-mark. `None` = unbounded.
  pub hwm: Option<usize>,
  pub identity: String,
  /// Base reconnect delay.
  pub retry_timeout: Duration,
  /// Backoff cap.
  pub retry_max_timeout: Duration,
  pub secure: bool,
  pub cipher: String,
  pub secret: String,
  /// Keys no built-in behavior consults. Stored so callers can read them back.
  pub extra: HashMap<String, OptionValue>,
}

impl Default for SocketOptions {
  fn default() -> Self {
    Self {
      hwm: None,
      identity: std::process::id().to_string(),
      retry_timeout: Duration::from_millis(DEFAULT_RETRY_TIMEOUT_MS),
      retry_max_timeout: Duration::from_millis(DEFAULT_RETRY_MAX_TIMEOUT_MS),
      secure: false,
      cipher: DEFAULT_CIPHER.to_string(),
      secret: DEFAULT_SECRET.to_string(),
      extra: HashMap::new(),
    }
  }
}

impl SocketOptions {
  /// Stores one option. Returns `true` when the key affects the packer.
  pub(crate) fn set(&mut self, key: &str, value: OptionValue) -> Result<bool, TetherError> {
    match key {
      HWM => self.hwm = parse_hwm_option(key, &value)?,
      IDENTITY => self.identity = parse_string_option(key, &value)?,
      RETRY_TIMEOUT => self.retry_timeout = parse_duration_ms_option(key, &value)?,
      RETRY_MAX_TIMEOUT => self.retry_max_timeout = parse_duration_ms_option(key, &value)?,
      SECURE => self.secure = parse_bool_option(key, &value)?,
      CIPHER => self.cipher = parse_string_option(key, &value)?,
      SECRET => self.secret = parse_string_option(key, &value)?,
      _ => {
        tracing::trace!(option = key, %value, "storing unrecognized option");
        self.extra.insert(key.to_string(), value);
      }
    }
    Ok(SECURITY_OPTIONS.contains(&key))
  }

  /// Reads back any stored option.
  pub(crate) fn get(&self, key: &str) -> Option<OptionValue> {
    match key {
      HWM => Some(match self.hwm {
        Some(hwm) => OptionValue::from(hwm),
        None => OptionValue::Int(-1),
      }),
      IDENTITY => Some(OptionValue::Str(self.identity.clone())),
      RETRY_TIMEOUT => Some(OptionValue::Duration(self.retry_timeout)),
      RETRY_MAX_TIMEOUT => Some(OptionValue::Duration(self.retry_max_timeout)),
      SECURE => Some(OptionValue::Bool(self.secure)),
      CIPHER => Some(OptionValue::Str(self.cipher.clone())),
      SECRET => Some(OptionValue::Str(self.secret.clone())),
      _ => self.extra.get(key).cloned(),
    }
  }
}

// --- Helper functions for parsing option values ---

/// Parses the high-water-mark. `-1` means unbounded.
pub(crate) fn parse_hwm_option(key: &str, value: &OptionValue) -> Result<Option<usize>, TetherError> {
  match value {
    OptionValue::Int(-1) => Ok(None),
    OptionValue::Int(n) if *n >= 0 => Ok(Some(*n as usize)),
    _ => Err(TetherError::InvalidOptionValue(key.to_string())),
  }
}

/// Accepts either a `Duration` or an integer number of milliseconds.
pub(crate) fn parse_duration_ms_option(key: &str, value: &OptionValue) -> Result<Duration, TetherError> {
  match value {
    OptionValue::Duration(d) => Ok(*d),
    OptionValue::Int(ms) if *ms >= 0 => Ok(Duration::from_millis(*ms as u64)),
    _ => Err(TetherError::InvalidOptionValue(key.to_string())),
  }
}

/// Accepts a boolean, or 0/1.
pub(crate) fn parse_bool_option(key: &str, value: &OptionValue) -> Result<bool, TetherError> {
  match value {
    OptionValue::Bool(b) => Ok(*b),
    OptionValue::Int(0) => Ok(false),
    OptionValue::Int(1) => Ok(true),
    _ => Err(TetherError::InvalidOptionValue(key.to_string())),
  }
}

pub(crate) fn parse_string_option(key: &str, value: &OptionValue) -> Result<String, TetherError> {
  match value {
    OptionValue::Str(s) => Ok(s.clone()),
    _ => Err(TetherError::InvalidOptionValue(key.to_string())),
  }
}
