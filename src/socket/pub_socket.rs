// src/socket/pub_socket.rs

use crate::error::TetherResult;
use crate::message::Msg;
use crate::socket::core::SocketCore;
use crate::socket::patterns::Distributor;
use crate::socket::ISocket;

use async_trait::async_trait;
use std::sync::Arc;

/// Broadcasts each message to every writable peer. Nothing is queued.
#[derive(Debug)]
pub(crate) struct PubSocket {
  core: Arc<SocketCore>,
  distributor: Distributor,
}

impl PubSocket {
  pub fn new(core: Arc<SocketCore>) -> Self {
    Self {
      core,
      distributor: Distributor::new(),
    }
  }
}

impl Drop for PubSocket {
  fn drop(&mut self) {
    self.core.abort();
  }
}

#[async_trait]
impl ISocket for PubSocket {
  fn core(&self) -> &Arc<SocketCore> {
    &self.core
  }

  fn send(&self, msg: Msg) -> TetherResult<()> {
    self.core.check_msg(&msg)?;
    let peers = self.core.peers.snapshot();
    if peers.is_empty() {
      tracing::trace!(handle = self.core.handle, "PUB send with no peers, message dropped");
      return Ok(());
    }
    // Packed once; every peer gets the same frame.
    let frame = self.core.pack(&msg)?;
    let delivered = self.distributor.send_to_all(&peers, &frame);
    tracing::trace!(handle = self.core.handle, delivered, peers = peers.len(), "PUB sent message");
    Ok(())
  }
}
