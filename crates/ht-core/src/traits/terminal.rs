//! Local terminal capability trait

use crate::error::TerminalError;
use crate::types::TerminalSize;

/// The local terminal the user is typing into
pub trait LocalTerminal: Send + Sync {
    /// Whether local input comes from a terminal
    fn is_terminal(&self) -> bool;

    /// Current window size
    fn size(&self) -> Result<TerminalSize, TerminalError>;

    /// Switch the terminal into raw mode
    fn set_raw_mode(&self) -> Result<(), TerminalError>;

    /// Return the terminal to the mode it had before raw mode
    fn restore_mode(&self) -> Result<(), TerminalError>;

    /// Release the local input handle
    fn close_input(&self) -> Result<(), TerminalError> {
        Ok(())
    }

    /// Whether `close_input` can block indefinitely on this platform
    ///
    /// Some console implementations hang when the input handle is closed
    /// while a read is outstanding.
    fn input_close_may_block(&self) -> bool {
        cfg!(windows)
    }
}
