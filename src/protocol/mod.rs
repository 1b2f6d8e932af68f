//! The agency wire protocol.
//!
//! every message travels in its own frame: 4 ascii digits holding the
//! payload length, followed by the payload itself.

pub mod batch;
pub mod connection;
pub mod frame;
pub mod message;
