// src/socket/patterns/round_robin.rs

use crate::transport::ConnectionEndpoint;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// What happened to one routed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RouteOutcome {
  /// Written to exactly one peer.
  Written { peer_id: usize },
  /// No peer could take it; the caller's fallback applies.
  Fallback,
  /// Several peers exist but none was writable. The message is gone.
  Discarded,
}

#[derive(Debug, Default)]
struct Rotation {
  /// Indices into the peer list, front = next to try.
  order: VecDeque<usize>,
  /// Peer count the rotation was built for.
  built_for: usize,
}

/// Spreads messages across peers in rotation.
///
/// The rotation is rebuilt only when the number of peers changes. Replacing a
/// peer with another (same count) keeps the current position.
#[derive(Debug, Default)]
pub(crate) struct RoundRobin {
  rotation: Mutex<Rotation>,
}

impl RoundRobin {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  /// Picks a peer and hands it to `write`, which returns whether the frame
  /// was accepted.
  pub(crate) fn route<F>(&self, peers: &[Arc<ConnectionEndpoint>], mut write: F) -> RouteOutcome
  where
    F: FnMut(&ConnectionEndpoint) -> bool,
  {
    match peers.len() {
      0 => RouteOutcome::Fallback,
      1 => {
        let peer = &peers[0];
        if peer.is_writable() && write(peer) {
          RouteOutcome::Written { peer_id: peer.id() }
        } else {
          RouteOutcome::Fallback
        }
      }
      n => {
        let mut rotation = self.rotation.lock();
        if rotation.built_for != n {
          tracing::trace!(peers = n, "Rebuilding round-robin rotation");
          rotation.order = (0..n).collect();
          rotation.built_for = n;
        }
        for _ in 0..n {
          let Some(index) = rotation.order.pop_front() else {
            break;
          };
          rotation.order.push_back(index);
          let peer = &peers[index];
          if peer.is_writable() && write(peer) {
            return RouteOutcome::Written { peer_id: peer.id() };
          }
          tracing::trace!(peer_id = peer.id(), "Skipping non-writable peer");
        }
        tracing::trace!(peers = n, "No writable peer, discarding message");
        RouteOutcome::Discarded
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use bytes::Bytes;

  fn peers(n: usize) -> (Vec<Arc<ConnectionEndpoint>>, Vec<async_channel::Receiver<Bytes>>) {
    (1..=n).map(ConnectionEndpoint::detached).unzip()
  }

  fn send(rr: &RoundRobin, peers: &[Arc<ConnectionEndpoint>]) -> RouteOutcome {
    rr.route(peers, |p| p.write(Bytes::from_static(b"m")))
  }

  #[test]
  fn no_peers_falls_back() {
    let rr = RoundRobin::new();
    assert_eq!(send(&rr, &[]), RouteOutcome::Fallback);
  }

  #[test]
  fn single_unwritable_peer_falls_back() {
    let rr = RoundRobin::new();
    let (peers, _rx) = peers(1);
    assert_eq!(send(&rr, &peers), RouteOutcome::Written { peer_id: 1 });
    peers[0].destroy();
    assert_eq!(send(&rr, &peers), RouteOutcome::Fallback);
  }

  #[test]
  fn rotates_fairly_over_peers() {
    let rr = RoundRobin::new();
    let (peers, rx) = peers(3);
    for _ in 0..10 {
      assert!(matches!(send(&rr, &peers), RouteOutcome::Written { .. }));
    }
    let counts: Vec<usize> = rx.iter().map(|r| r.len()).collect();
    assert_eq!(counts, vec![4, 3, 3]);
  }

  #[test]
  fn single_peer_takes_a_burst_without_falling_back() {
    let rr = RoundRobin::new();
    let (peers, rx) = peers(1);
    for _ in 0..3000 {
      assert_eq!(send(&rr, &peers), RouteOutcome::Written { peer_id: 1 });
    }
    assert_eq!(rx[0].len(), 3000);
  }

  #[test]
  fn skips_closed_peers_and_discards_when_none_writable() {
    let rr = RoundRobin::new();
    let (peers, rx) = peers(2);
    peers[0].destroy();
    assert_eq!(send(&rr, &peers), RouteOutcome::Written { peer_id: 2 });
    assert_eq!(send(&rr, &peers), RouteOutcome::Written { peer_id: 2 });
    assert_eq!(rx[1].len(), 2);

    peers[1].destroy();
    assert_eq!(send(&rr, &peers), RouteOutcome::Discarded);
  }

  #[test]
  fn rotation_is_kept_when_a_peer_is_replaced() {
    let rr = RoundRobin::new();
    let (mut list, _rx) = peers(2);
    assert_eq!(send(&rr, &list), RouteOutcome::Written { peer_id: 1 });

    // Same count, different peer in slot 1: position is not reset.
    let (replacement, _rr) = ConnectionEndpoint::detached(9);
    list[1] = replacement;
    assert_eq!(send(&rr, &list), RouteOutcome::Written { peer_id: 9 });

    // A count change rebuilds and starts from the first peer again.
    let (extra, _re) = ConnectionEndpoint::detached(10);
    list.push(extra);
    assert_eq!(send(&rr, &list), RouteOutcome::Written { peer_id: 1 });
  }
}
