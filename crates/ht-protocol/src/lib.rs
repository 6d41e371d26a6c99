//! ht-protocol: Stream framing for hijacked connections
//!
//! When a session runs without a TTY, the remote side interleaves stdout and
//! stderr on one connection. Each chunk is prefixed with a small header that
//! names the stream it belongs to. This crate encodes and decodes that format.

pub mod codec;
pub mod error;
pub mod frame;

pub use codec::{StreamFrame, StreamFrameCodec};
pub use error::ProtocolError;
pub use frame::{FrameHeader, StreamType, HEADER_SIZE, MAX_PAYLOAD_SIZE};
