// src/protocol/mod.rs

/// AMP-style length-delimited framing used for every message on the wire.
pub mod amp;
