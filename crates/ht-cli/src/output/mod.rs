//! Output formatting utilities
//!
//! Standard output belongs to the attached process, so status messages go
//! to standard error unless a command has nothing else to print.

use std::io::{self, Write};

use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use ht_core::config::ClientConfig;
use ht_core::detach_keys::DEFAULT_DETACH_KEYS;

/// Render the effective configuration for display
pub fn format_config(config: &ClientConfig) -> String {
    let mut output = String::new();
    output.push_str(&format!(
        "detach_keys = {}\n",
        config
            .detach_keys
            .as_deref()
            .map(|k| format!("{:?}", k))
            .unwrap_or_else(|| format!("(default: {:?})", DEFAULT_DETACH_KEYS))
    ));
    output.push_str(&format!(
        "resize_poll_interval_ms = {}\n",
        config.resize_poll_interval.as_millis()
    ));
    output.push_str(&format!("proxy_signals = {}\n", config.proxy_signals));
    output
}

fn print_prefixed(mut out: impl Write, color: Color, prefix: &str, msg: &str) {
    let _ = crossterm::execute!(
        out,
        SetForegroundColor(color),
        Print(prefix),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a success message in green with a checkmark prefix
pub fn print_success(msg: &str) {
    print_prefixed(io::stdout(), Color::Green, "✓ ", msg);
}

/// Print an error message in red with an X prefix
///
/// Raw mode is always released before errors are printed, so the plain
/// newline renders correctly.
pub fn print_error(msg: &str) {
    print_prefixed(io::stderr(), Color::Red, "✗ ", msg);
}

/// Print a warning message in yellow
pub fn print_warning(msg: &str) {
    print_prefixed(io::stderr(), Color::Yellow, "⚠ ", msg);
}

/// Print an informational message in cyan
pub fn print_info(msg: &str) {
    print_prefixed(io::stderr(), Color::Cyan, "ℹ ", msg);
}
