// src/transport/backoff.rs

use std::time::Duration;

/// Growth factor applied per consecutive failed connect.
pub const BACKOFF_MULTIPLIER: f64 = 1.5;

/// Reconnect delay state for one connecter.
///
/// After `F` consecutive failed connects the next delay is
/// `min(max, base * 1.5^F)`, rounded to whole milliseconds.
#[derive(Debug, Clone)]
pub(crate) struct Backoff {
  base: Duration,
  max: Duration,
  failures: u32,
}

impl Backoff {
  pub(crate) fn new(base: Duration, max: Duration) -> Self {
    Self { base, max, failures: 0 }
  }

  /// Delay to wait before the next attempt.
  pub(crate) fn delay(&self) -> Duration {
    let base_ms = self.base.as_millis() as f64;
    let max_ms = self.max.as_millis() as f64;
    let grown = base_ms * BACKOFF_MULTIPLIER.powi(self.failures.min(i32::MAX as u32) as i32);
    let capped = if grown.is_finite() { grown.min(max_ms) } else { max_ms };
    Duration::from_millis(capped.round() as u64)
  }

  /// Picks up changed `retry timeout` / `retry max timeout` values. The
  /// failure count is kept.
  pub(crate) fn set_bounds(&mut self, base: Duration, max: Duration) {
    self.base = base;
    self.max = max;
  }

  pub(crate) fn record_failure(&mut self) {
    self.failures = self.failures.saturating_add(1);
  }

  /// Called on a successful connect.
  pub(crate) fn reset(&mut self) {
    self.failures = 0;
  }

  pub(crate) fn failures(&self) -> u32 {
    self.failures
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
  }

  #[test]
  fn grows_by_one_and_a_half_until_capped() {
    let mut backoff = Backoff::new(ms(100), ms(5000));
    let mut seen = Vec::new();
    for _ in 0..12 {
      seen.push(backoff.delay().as_millis());
      backoff.record_failure();
    }
    assert_eq!(
      seen,
      vec![100, 150, 225, 338, 506, 759, 1139, 1709, 2563, 3844, 5000, 5000]
    );
  }

  #[test]
  fn reset_returns_to_base() {
    let mut backoff = Backoff::new(ms(40), ms(1000));
    backoff.record_failure();
    backoff.record_failure();
    assert_eq!(backoff.delay(), ms(90));
    backoff.reset();
    assert_eq!(backoff.failures(), 0);
    assert_eq!(backoff.delay(), ms(40));
  }

  #[test]
  fn new_bounds_apply_to_the_next_delay() {
    let mut backoff = Backoff::new(ms(100), ms(5000));
    backoff.record_failure();
    backoff.set_bounds(ms(20), ms(25));
    assert_eq!(backoff.delay(), ms(25));
    backoff.set_bounds(ms(20), ms(1000));
    assert_eq!(backoff.delay(), ms(30));
  }

  #[test]
  fn base_above_max_is_capped() {
    let backoff = Backoff::new(ms(800), ms(500));
    assert_eq!(backoff.delay(), ms(500));
  }

  #[test]
  fn many_failures_do_not_overflow() {
    let mut backoff = Backoff::new(ms(100), ms(5000));
    for _ in 0..10_000 {
      backoff.record_failure();
    }
    assert_eq!(backoff.delay(), ms(5000));
  }
}
