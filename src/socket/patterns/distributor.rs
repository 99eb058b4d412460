// src/socket/patterns/distributor.rs

use crate::transport::ConnectionEndpoint;
use bytes::Bytes;
use std::sync::Arc;

/// Writes one packed frame to every writable peer.
#[derive(Debug, Default)]
pub(crate) struct Distributor;

impl Distributor {
  pub(crate) fn new() -> Self {
    Self
  }

  /// Returns how many peers accepted the frame. Non-writable peers miss it.
  pub(crate) fn send_to_all(&self, peers: &[Arc<ConnectionEndpoint>], frame: &Bytes) -> usize {
    if peers.is_empty() {
      tracing::trace!("Distributor: No peers to send to.");
      return 0;
    }
    let mut delivered = 0;
    for peer in peers {
      if peer.is_writable() && peer.write(frame.clone()) {
        delivered += 1;
      } else {
        tracing::trace!(peer_id = peer.id(), "Distributor: peer not writable, skipping");
      }
    }
    delivered
  }
}
