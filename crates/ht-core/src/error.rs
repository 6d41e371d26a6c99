//! Core error types for hitch

use ht_protocol::ProtocolError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by a remote engine operation
#[derive(Error, Debug)]
pub enum EngineError {
    /// Target does not exist
    #[error("No such target: {0}")]
    NotFound(String),

    /// Target was already started
    #[error("Target {0} is already started")]
    AlreadyStarted(String),

    /// Operation needs a pseudo-terminal the target does not have
    #[error("Target {0} has no TTY")]
    NotATty(String),

    /// Signal name not understood by the engine
    #[error("Invalid signal: {0}")]
    InvalidSignal(String),

    /// Request failed on the engine side
    #[error("{0}")]
    Request(String),

    /// I/O error talking to the engine
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures on the duplex connection
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// Read or write failed
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// Remote side reported an error in-band
    #[error("{0}")]
    Remote(String),

    /// Remote closed the connection before streaming started
    #[error("{0}")]
    ClosedByRemote(String),

    /// Stream frames could not be decoded
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Local terminal capability failures
#[derive(Error, Debug)]
pub enum TerminalError {
    /// stdin/stdout are not attached to a terminal
    #[error("the input device is not a TTY")]
    NotATerminal,

    /// Entering or leaving raw mode failed
    #[error("Failed to change terminal mode: {0}")]
    RawMode(#[source] std::io::Error),

    /// Reading the window size failed
    #[error("Failed to read terminal size: {0}")]
    Size(#[source] std::io::Error),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
