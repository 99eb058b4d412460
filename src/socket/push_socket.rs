// src/socket/push_socket.rs

use crate::error::TetherResult;
use crate::message::Msg;
use crate::socket::core::SocketCore;
use crate::socket::events::SocketEvent;
use crate::socket::patterns::{OutboundQueue, RoundRobin, RouteOutcome};
use crate::socket::ISocket;

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

/// Round-robins messages over its peers. While no peer can take a message it
/// is queued (up to `hwm`) and replayed when a peer connects.
///
/// Sends and flushes are serialized, and a non-empty queue holds back new
/// messages, so peers always see messages in `send` order.
#[derive(Debug)]
pub(crate) struct PushSocket {
  core: Arc<SocketCore>,
  queue: OutboundQueue,
  round_robin: RoundRobin,
  send_lock: Mutex<()>,
}

impl PushSocket {
  pub fn new(core: Arc<SocketCore>) -> Self {
    Self {
      core,
      queue: OutboundQueue::new(),
      round_robin: RoundRobin::new(),
      send_lock: Mutex::new(()),
    }
  }

  fn enqueue(&self, msg: Msg) {
    if let Err(dropped) = self.queue.enqueue(msg, self.core.hwm()) {
      tracing::debug!(handle = self.core.handle, hwm = ?self.core.hwm(), "PUSH queue full, dropping message");
      self.core.emit(SocketEvent::Dropped { msg: dropped });
    }
  }

  /// Replays everything queued through the router, then reports the batch.
  fn flush(&self) {
    let _guard = self.send_lock.lock();
    let msgs = self.queue.take();
    if msgs.is_empty() {
      return;
    }
    tracing::debug!(handle = self.core.handle, count = msgs.len(), "Flushing queued messages");
    for msg in msgs.iter().cloned() {
      if let Err(e) = self.route(msg) {
        tracing::warn!(handle = self.core.handle, error = %e, "Queued message could not be sent");
      }
    }
    self.core.emit(SocketEvent::Flushed { msgs });
  }

  /// Caller holds `send_lock`.
  fn route(&self, msg: Msg) -> TetherResult<()> {
    let peers = self.core.peers.snapshot();
    if peers.is_empty() || !self.queue.is_empty() {
      self.enqueue(msg);
      return Ok(());
    }

    let frame = self.core.pack(&msg)?;
    match self.round_robin.route(&peers, |peer| peer.write(frame.clone())) {
      RouteOutcome::Written { peer_id } => {
        tracing::trace!(handle = self.core.handle, peer_id = peer_id, "PUSH sent message");
      }
      RouteOutcome::Fallback => self.enqueue(msg),
      RouteOutcome::Discarded => {}
    }
    Ok(())
  }
}

impl Drop for PushSocket {
  fn drop(&mut self) {
    self.core.abort();
  }
}

#[async_trait]
impl ISocket for PushSocket {
  fn core(&self) -> &Arc<SocketCore> {
    &self.core
  }

  fn send(&self, msg: Msg) -> TetherResult<()> {
    self.core.check_msg(&msg)?;
    let _guard = self.send_lock.lock();
    self.route(msg)
  }

  fn on_peer_attached(&self) {
    self.flush();
  }
}
