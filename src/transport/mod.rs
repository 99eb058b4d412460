// src/transport/mod.rs

pub(crate) mod backoff;
pub mod connection;
pub mod endpoint;
pub(crate) mod tcp;

pub use connection::ConnectionEndpoint;
pub(crate) use connection::ConnectionHandler;
pub use endpoint::{AddressFamily, BoundAddress, Endpoint, IntoEndpoint};
