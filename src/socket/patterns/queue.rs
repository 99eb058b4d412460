// src/socket/patterns/queue.rs

use crate::message::Msg;
use parking_lot::Mutex;

/// Messages held while no peer can take them.
#[derive(Debug, Default)]
pub(crate) struct OutboundQueue {
  queue: Mutex<Vec<Msg>>,
}

impl OutboundQueue {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  /// Appends `msg`, or hands it back if the queue already holds `hwm` entries.
  pub(crate) fn enqueue(&self, msg: Msg, hwm: Option<usize>) -> Result<(), Msg> {
    let mut queue = self.queue.lock();
    if let Some(hwm) = hwm {
      if queue.len() >= hwm {
        return Err(msg);
      }
    }
    queue.push(msg);
    Ok(())
  }

  /// Swaps the queue out for an empty one.
  pub(crate) fn take(&self) -> Vec<Msg> {
    std::mem::take(&mut *self.queue.lock())
  }

  pub(crate) fn is_empty(&self) -> bool {
    self.queue.lock().is_empty()
  }

  #[cfg(test)]
  pub(crate) fn len(&self) -> usize {
    self.queue.lock().len()
  }
}
