//! Run command implementation
//!
//! Creates a target on the loopback engine, then attaches an interactive
//! session to it and starts it.

use std::sync::Arc;

use anyhow::{Context, Result};
use ht_core::config::ClientConfig;
use ht_core::traits::LocalTerminal;
use ht_core::TerminalSize;
use ht_local::{LaunchSpec, LocalEngine};
use ht_session::{
    CrosstermTerminal, LocalStdin, LocalStdio, Session, SessionOptions, WatchMode,
};

use crate::output::print_error;

/// Arguments of `hitch run`
#[derive(Debug, Clone, Default)]
pub struct RunArgs {
    /// Keep local input attached
    pub interactive: bool,
    /// Allocate a pseudo-terminal
    pub tty: bool,
    /// Remove the target once it exits
    pub auto_remove: bool,
    /// Detach sequence override
    pub detach_keys: Option<String>,
    /// Signal proxy override
    pub sig_proxy: Option<bool>,
    /// Extra environment, as `KEY=VALUE`
    pub env: Vec<String>,
    /// Program and arguments
    pub command: Vec<String>,
}

/// Run a command and attach to it
///
/// Returns the exit code the process should exit with.
pub async fn run_command(config: &ClientConfig, args: RunArgs) -> Result<i32> {
    let (stdin, stdin_handle) = if args.interactive {
        let (stdin, handle) = LocalStdin::spawn();
        (Some(stdin), Some(handle))
    } else {
        (None, None)
    };
    let terminal: Arc<dyn LocalTerminal> = Arc::new(match stdin_handle {
        Some(handle) => CrosstermTerminal::with_stdin(handle),
        None => CrosstermTerminal::new(),
    });

    let mut spec = LaunchSpec::new(args.command.clone());
    for pair in &args.env {
        let (key, value) = parse_env(pair)?;
        spec = spec.with_env(key, value);
    }
    if args.tty {
        let size = if terminal.is_terminal() {
            terminal.size().unwrap_or_default()
        } else {
            TerminalSize::default()
        };
        spec = spec.with_tty(size);
    }

    let engine = Arc::new(LocalEngine::new());
    let target = engine
        .create(spec)
        .with_context(|| format!("Failed to create target for {:?}", args.command))?;

    let options = SessionOptions {
        tty: args.tty,
        attach_stdin: args.interactive,
        attach_stdout: true,
        attach_stderr: true,
        detach_keys: config.detach_keys(args.detach_keys.as_deref()),
        proxy_signals: args.sig_proxy.unwrap_or(config.proxy_signals),
        auto_remove: args.auto_remove,
        start: true,
        watch_mode: WatchMode::platform_default(config.resize_poll_interval),
        ..Default::default()
    };
    tracing::debug!("Running {:?} as {} with {:?}", args.command, target, options);

    let mut stdio = LocalStdio::new()
        .with_output(tokio::io::stdout())
        .with_error(tokio::io::stderr())
        .with_terminal(terminal);
    if let Some(stdin) = stdin {
        stdio = stdio.with_input(stdin);
    }

    match Session::new(engine, target, options).run(stdio).await {
        Ok(()) => Ok(0),
        Err(e) => {
            if !e.is_status_only() {
                print_error(&e.to_string());
            }
            Ok(e.exit_code())
        }
    }
}

fn parse_env(pair: &str) -> Result<(&str, &str)> {
    match pair.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key, value)),
        _ => anyhow::bail!("Invalid environment variable {:?}, expected KEY=VALUE", pair),
    }
}
