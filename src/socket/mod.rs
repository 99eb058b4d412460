// src/socket/mod.rs

pub(crate) mod core;
pub mod events;
pub mod options;
pub(crate) mod patterns;
pub(crate) mod peers;
pub mod types;

pub(crate) mod pub_socket;
pub(crate) mod pull_socket;
pub(crate) mod push_socket;

pub use events::{MonitorReceiver, MonitorSender, SocketEvent};
pub use options::OptionValue;
pub use types::{Socket, SocketType};

use crate::context::Context;
use crate::error::TetherResult;
use crate::message::Msg;
use crate::transport::Endpoint;
use async_trait::async_trait;
use self::core::SocketCore;
use self::options::SocketOptions;
use std::sync::Arc;

/// Pattern-specific behavior layered over a shared `SocketCore`.
#[async_trait]
pub(crate) trait ISocket: Send + Sync + 'static {
  fn core(&self) -> &Arc<SocketCore>;

  fn socket_type(&self) -> SocketType {
    self.core().socket_type
  }

  async fn bind(&self, endpoint: Endpoint) -> TetherResult<()> {
    self.core().bind(endpoint).await
  }

  async fn connect(&self, endpoint: Endpoint) -> TetherResult<()> {
    self.core().connect(endpoint).await
  }

  async fn close(&self) -> TetherResult<()> {
    self.core().close().await
  }

  /// Routes one message according to the pattern. Never suspends.
  fn send(&self, msg: Msg) -> TetherResult<()>;

  async fn recv(&self) -> TetherResult<Msg> {
    self.core().recv().await
  }

  /// Called after a new peer joined and `Connected` was emitted.
  fn on_peer_attached(&self) {}
}

/// Builds the core and pattern for `socket_type` and links them.
pub(crate) fn create_socket(handle: usize, ctx: Context, socket_type: SocketType) -> Arc<dyn ISocket> {
  let core = SocketCore::new(handle, socket_type, ctx, SocketOptions::default());
  let socket: Arc<dyn ISocket> = match socket_type {
    SocketType::Pub => Arc::new(pub_socket::PubSocket::new(core.clone())),
    SocketType::Pull => Arc::new(pull_socket::PullSocket::new(core.clone())),
    SocketType::Push => Arc::new(push_socket::PushSocket::new(core.clone())),
  };
  core.set_socket(Arc::downgrade(&socket));
  socket
}
