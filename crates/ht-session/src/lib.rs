//! ht-session: Interactive attach sessions for hitch
//!
//! This crate connects a local terminal to a remote process:
//! - Stream relay with detach-key recognition and stream demultiplexing
//! - Raw terminal mode with guaranteed single restoration
//! - Window size propagation and signal forwarding
//! - Exit status resolution

pub mod detach;
pub mod error;
pub mod exit;
pub mod relay;
pub mod resize;
pub mod session;
pub mod signals;
pub mod terminal;

pub use detach::{DetachSequenceFilter, Filtered};
pub use error::SessionError;
pub use exit::SessionExitResolver;
pub use relay::{LocalStdio, RelayOutcome, RunningRelay, StreamRelay};
pub use resize::{ResizeMonitor, WatchMode};
pub use session::{Session, SessionOptions};
pub use signals::{is_forwardable, os_signals, SignalForwarder};
pub use terminal::{CrosstermTerminal, LocalStdin, StdinHandle, TerminalModeGuard};
