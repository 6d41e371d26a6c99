//! Core domain types

use std::fmt;

/// Identifier of the remote resource a session attaches to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetId(pub String);

impl TargetId {
    /// Create a new target ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the raw ID string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shortened form for log lines
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(12)
            .map(|(i, _)| i)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TargetId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TargetId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// What kind of remote resource a target is
///
/// Resize requests are routed differently for exec instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetKind {
    /// Primary process of a container-like resource
    #[default]
    Container,
    /// Secondary process started inside a running resource
    Exec,
}

impl TargetKind {
    /// Whether this target is an exec instance
    pub fn is_exec(self) -> bool {
        matches!(self, TargetKind::Exec)
    }
}

/// Terminal dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalSize {
    /// Number of rows (height)
    pub rows: u16,
    /// Number of columns (width)
    pub cols: u16,
}

impl TerminalSize {
    /// Create a new terminal size
    pub fn new(rows: u16, cols: u16) -> Self {
        Self { rows, cols }
    }

    /// Default terminal size (24x80)
    pub fn default_size() -> Self {
        Self { rows: 24, cols: 80 }
    }

    /// A 0x0 size means the dimensions are unknown and must not be sent
    pub fn is_zero(&self) -> bool {
        self.rows == 0 && self.cols == 0
    }

    /// One row and one column larger
    pub fn grown(&self) -> Self {
        Self {
            rows: self.rows.saturating_add(1),
            cols: self.cols.saturating_add(1),
        }
    }
}

impl Default for TerminalSize {
    fn default() -> Self {
        Self::default_size()
    }
}

impl fmt::Display for TerminalSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.cols, self.rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_id_short() {
        let id = TargetId::new("0123456789abcdef0123");
        assert_eq!(id.short(), "0123456789ab");

        let id = TargetId::new("tiny");
        assert_eq!(id.short(), "tiny");
    }

    #[test]
    fn test_terminal_size_zero_and_grown() {
        assert!(TerminalSize::new(0, 0).is_zero());
        assert!(!TerminalSize::new(0, 80).is_zero());
        assert_eq!(TerminalSize::new(24, 80).grown(), TerminalSize::new(25, 81));
        assert_eq!(
            TerminalSize::new(u16::MAX, 1).grown(),
            TerminalSize::new(u16::MAX, 2)
        );
    }

    #[test]
    fn test_terminal_size_display() {
        assert_eq!(format!("{}", TerminalSize::new(24, 80)), "80x24");
    }
}
