// src/socket/pull_socket.rs

use crate::error::{TetherError, TetherResult};
use crate::message::Msg;
use crate::socket::core::SocketCore;
use crate::socket::ISocket;

use async_trait::async_trait;
use std::sync::Arc;

#[derive(Debug)]
pub(crate) struct PullSocket {
  core: Arc<SocketCore>,
}

impl PullSocket {
  pub fn new(core: Arc<SocketCore>) -> Self {
    Self { core }
  }
}

impl Drop for PullSocket {
  fn drop(&mut self) {
    self.core.abort();
  }
}

#[async_trait]
impl ISocket for PullSocket {
  fn core(&self) -> &Arc<SocketCore> {
    &self.core
  }

  fn send(&self, _msg: Msg) -> TetherResult<()> {
    Err(TetherError::InvalidSocketType("PULL sockets cannot send messages"))
  }
}
