//! Session error types

use ht_core::{ConnectionError, EngineError, TerminalError};
use thiserror::Error;

/// Exit code used when the session failed before or around the remote process
pub const EXIT_CODE_ENGINE: i32 = 125;

/// Errors surfaced by a session
#[derive(Error, Debug)]
pub enum SessionError {
    /// The local terminal could not be prepared
    #[error(transparent)]
    Terminal(#[from] TerminalError),

    /// The stream relay failed
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// The engine embedded an error in the exit notification
    #[error("{0}")]
    RemoteExit(String),

    /// The remote process exited with a non-zero status
    #[error("remote process exited with status {0}")]
    NonZeroExit(i32),

    /// Starting the remote process failed
    #[error("failed to start: {0}")]
    Start(#[source] EngineError),

    /// The wait-for-exit subscription failed
    #[error("failed to wait for exit: {0}")]
    Wait(#[source] EngineError),

    /// Any other engine request failed
    #[error(transparent)]
    Engine(EngineError),

    /// The session was cancelled before it could resolve
    #[error("session cancelled")]
    Cancelled,
}

impl SessionError {
    /// Process exit code a command-line front end should use
    pub fn exit_code(&self) -> i32 {
        match self {
            // Anything a process exit code cannot carry would wrap
            SessionError::NonZeroExit(code @ 1..=255) => *code,
            SessionError::NonZeroExit(_) => EXIT_CODE_ENGINE,
            SessionError::RemoteExit(_) | SessionError::Start(_) | SessionError::Wait(_) => {
                EXIT_CODE_ENGINE
            }
            _ => 1,
        }
    }

    /// Whether the error only carries an exit status and has nothing to print
    pub fn is_status_only(&self) -> bool {
        matches!(self, SessionError::NonZeroExit(_))
    }
}
