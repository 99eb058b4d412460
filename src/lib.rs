//! tether - push/pull and pub socket patterns over plain TCP.
//!
//! Sockets frame messages, track their peers, reconnect with backoff, queue
//! while no peer is reachable, and can encrypt every frame with a shared secret.

pub mod context;
pub mod error;
pub mod message;
pub mod protocol;
pub mod security;
pub mod socket;
pub mod transport;

// Re-export core types for user convenience
pub use context::{context, Context};
pub use error::{TetherError, TetherResult};
pub use message::Msg;
pub use socket::events::{MonitorReceiver, SocketEvent};
pub use socket::options::OptionValue;
pub use socket::types::{Socket, SocketType};
pub use transport::{AddressFamily, BoundAddress, Endpoint, IntoEndpoint};

// --- Top-Level Functions ---

const VERSION_MAJOR: i32 = 0;
const VERSION_MINOR: i32 = 1;
const VERSION_PATCH: i32 = 0;

/// Returns the library version as a tuple (major, minor, patch).
pub fn version() -> (i32, i32, i32) {
  (VERSION_MAJOR, VERSION_MINOR, VERSION_PATCH)
}
