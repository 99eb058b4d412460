// src/protocol/amp/mod.rs

//! Message framing.
//!
//! A frame is one header byte holding the protocol version in the high nibble
//! and the part count in the low nibble, followed by each part as a big-endian
//! `u32` length and that many bytes:
//!
//! ```text
//! +----------------+----------+---------+----------+---------+-----
//! | ver:4 | argc:4 | len0:u32 | data0   | len1:u32 | data1   | ...
//! +----------------+----------+---------+----------+---------+-----
//! ```

pub mod codec;

pub use codec::{decode, encode, AmpFrameCodec};

/// Version written into (and required from) every frame header.
pub const AMP_VERSION: u8 = 1;
/// The part count lives in four bits.
pub const MAX_PARTS: usize = 15;
/// Largest single part the stream decoder accepts.
pub const MAX_PART_SIZE: usize = 64 * 1024 * 1024;

pub(crate) const HEADER_LEN: usize = 1;
pub(crate) const PART_LEN_PREFIX: usize = 4;
