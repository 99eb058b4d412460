// src/socket/events.rs

use crate::message::Msg;
use std::time::Duration;

/// Represents significant events occurring within a socket or its connections.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum SocketEvent {
  // --- Listener Events ---
  /// Socket is listening on `endpoint` (`tcp://ip:port`).
  Bound { endpoint: String },

  // --- Connection Events ---
  /// A peer was added, either accepted by a listener or reached by a connecter.
  Connected { endpoint: String, peer_addr: String },
  /// A peer terminated and was removed from the peer set.
  Disconnected { endpoint: String, peer_addr: String },
  /// Waiting `interval` before the next connect attempt.
  ReconnectAttempt { endpoint: String, interval: Duration },
  /// The socket finished closing. Emitted once.
  Closed,

  // --- Errors ---
  /// Any error seen on a connection. Always followed by `Error` or `IgnoredError`.
  SocketError { endpoint: String, error_msg: String },
  /// Transient network fault (refused, reset, unreachable...). The socket recovers on its own.
  IgnoredError { endpoint: String, error_msg: String },
  /// Unclassified error, including inbound frames that fail to unpack.
  Error { endpoint: String, error_msg: String },

  // --- Queue Events ---
  /// The outbound queue was full; `msg` was discarded.
  Dropped { msg: Msg },
  /// Queued messages were replayed after a peer connected.
  Flushed { msgs: Vec<Msg> },
}

// Type alias for the channel sender used for monitor events
pub type MonitorSender = async_channel::Sender<SocketEvent>;
// Type alias for the channel receiver used for monitor events
pub type MonitorReceiver = async_channel::Receiver<SocketEvent>;

// Default capacity for monitor channel
pub const DEFAULT_MONITOR_CAPACITY: usize = 1024;
