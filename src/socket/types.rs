// src/socket/types.rs

use crate::error::TetherResult;
use crate::message::Msg;
use crate::socket::events::{MonitorReceiver, DEFAULT_MONITOR_CAPACITY};
use crate::socket::options::OptionValue;
use crate::socket::ISocket;
use crate::transport::{BoundAddress, IntoEndpoint};
use std::fmt;
use std::sync::Arc;

/// The messaging pattern a socket follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketType {
  /// Sends every message to all connected peers.
  Pub,
  /// Receives from any number of pushers. Cannot send.
  Pull,
  /// Sends each message to one peer in rotation, queuing while none is connected.
  Push,
}

impl fmt::Display for SocketType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      SocketType::Pub => "PUB",
      SocketType::Pull => "PULL",
      SocketType::Push => "PUSH",
    };
    f.write_str(name)
  }
}

/// The public handle for interacting with a socket.
/// Handles are cloneable; clones refer to the same socket.
/// Dropping the last handle aborts the socket without waiting; call `close`
/// to shut down gracefully.
#[derive(Clone)]
pub struct Socket {
  pub(crate) inner: Arc<dyn ISocket>,
}

impl Socket {
  pub(crate) fn new(socket_impl: Arc<dyn ISocket>) -> Self {
    Self { inner: socket_impl }
  }

  pub fn socket_type(&self) -> SocketType {
    self.inner.socket_type()
  }

  /// Unique handle assigned by the owning context.
  pub fn handle(&self) -> usize {
    self.inner.core().handle
  }

  // --- Lifecycle ---

  /// Listens on `endpoint`. Bind errors are returned directly.
  pub async fn bind(&self, endpoint: impl IntoEndpoint) -> TetherResult<()> {
    self.inner.bind(endpoint.into_endpoint()?).await
  }

  /// Starts connecting to `endpoint` and keeps reconnecting until `close`.
  /// Returns before the first attempt completes; watch for `SocketEvent::Connected`.
  pub async fn connect(&self, endpoint: impl IntoEndpoint) -> TetherResult<()> {
    self.inner.connect(endpoint.into_endpoint()?).await
  }

  /// Destroys all peers, stops listening and reconnecting. Idempotent.
  pub async fn close(&self) -> TetherResult<()> {
    self.inner.close().await
  }

  /// The listening address, once bound.
  pub fn address(&self) -> Option<BoundAddress> {
    self.inner.core().address()
  }

  // --- Messages ---

  pub fn send(&self, msg: impl Into<Msg>) -> TetherResult<()> {
    self.inner.send(msg.into())
  }

  /// Waits for the next inbound message. Fails once the socket is closed and drained.
  pub async fn recv(&self) -> TetherResult<Msg> {
    self.inner.recv().await
  }

  pub fn try_recv(&self) -> Option<Msg> {
    self.inner.core().try_recv()
  }

  // --- Options ---

  pub fn set_option(&self, key: &str, value: impl Into<OptionValue>) -> TetherResult<()> {
    self.inner.core().set_option(key, value.into())
  }

  pub fn set_options<I, K, V>(&self, items: I) -> TetherResult<()>
  where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<OptionValue>,
  {
    self
      .inner
      .core()
      .set_options(items.into_iter().map(|(k, v)| (k, v.into())))
  }

  pub fn get_option(&self, key: &str) -> Option<OptionValue> {
    self.inner.core().get_option(key)
  }

  // --- Monitoring ---

  /// Opens an event channel with room for `capacity` unread events.
  /// Events that do not fit are discarded. Replaces any earlier monitor.
  pub fn monitor(&self, capacity: usize) -> MonitorReceiver {
    self.inner.core().monitor(capacity)
  }

  pub fn monitor_default(&self) -> MonitorReceiver {
    self.monitor(DEFAULT_MONITOR_CAPACITY)
  }
}

impl fmt::Debug for Socket {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Socket")
      .field("handle", &self.handle())
      .field("type", &self.socket_type())
      .finish_non_exhaustive()
  }
}
