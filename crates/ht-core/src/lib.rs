//! ht-core: Core abstractions and configuration for hitch
//!
//! This crate provides the shared types, the traits the streaming core
//! consumes (remote engine, local terminal), the duplex `Connection`
//! abstraction and the client configuration.

pub mod config;
pub mod connection;
pub mod detach_keys;
pub mod error;
pub mod signal;
pub mod traits;
pub mod types;

pub use connection::{Connection, ConnectionReader, ConnectionWriter};
pub use detach_keys::DetachKeys;
pub use error::{ConfigError, ConnectionError, EngineError, TerminalError};
pub use types::{TargetId, TargetKind, TerminalSize};
