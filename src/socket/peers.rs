// src/socket/peers.rs

use crate::transport::ConnectionEndpoint;
use parking_lot::Mutex;
use std::sync::Arc;

/// Currently open connections of one socket, in accept/connect order.
#[derive(Debug, Default)]
pub(crate) struct PeerSet {
  peers: Mutex<Vec<Arc<ConnectionEndpoint>>>,
}

impl PeerSet {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  /// Appends `peer` unless a peer with the same id is already present.
  pub(crate) fn add(&self, peer: Arc<ConnectionEndpoint>) -> bool {
    let mut peers = self.peers.lock();
    if peers.iter().any(|p| p.id() == peer.id()) {
      return false;
    }
    peers.push(peer);
    true
  }

  pub(crate) fn remove(&self, id: usize) -> Option<Arc<ConnectionEndpoint>> {
    let mut peers = self.peers.lock();
    let index = peers.iter().position(|p| p.id() == id)?;
    Some(peers.remove(index))
  }

  pub(crate) fn get(&self, id: usize) -> Option<Arc<ConnectionEndpoint>> {
    self.peers.lock().iter().find(|p| p.id() == id).cloned()
  }

  /// A fixed copy for iteration; later adds and removes do not affect it.
  pub(crate) fn snapshot(&self) -> Vec<Arc<ConnectionEndpoint>> {
    self.peers.lock().clone()
  }

  pub(crate) fn len(&self) -> usize {
    self.peers.lock().len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn keeps_order_and_rejects_duplicates() {
    let set = PeerSet::new();
    let (a, _ra) = ConnectionEndpoint::detached(1);
    let (b, _rb) = ConnectionEndpoint::detached(2);
    assert!(set.add(a.clone()));
    assert!(set.add(b));
    assert!(!set.add(a));
    let ids: Vec<usize> = set.snapshot().iter().map(|p| p.id()).collect();
    assert_eq!(ids, vec![1, 2]);
  }

  #[test]
  fn snapshot_survives_removal() {
    let set = PeerSet::new();
    let (a, _ra) = ConnectionEndpoint::detached(1);
    set.add(a);
    let snap = set.snapshot();
    assert!(set.remove(1).is_some());
    assert!(set.remove(1).is_none());
    assert_eq!(set.len(), 0);
    assert_eq!(snap.len(), 1);
    assert!(set.get(1).is_none());
  }
}
