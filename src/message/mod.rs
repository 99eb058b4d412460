//! Message type carried by every socket pattern.

mod msg;

pub use msg::Msg;
