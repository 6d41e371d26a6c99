//! Interactive session orchestration
//!
//! A session wires one local terminal to one remote target: it subscribes
//! to the target's exit, attaches, optionally starts the process, relays
//! streams, keeps the window size and signals in step, and finally turns
//! everything into a single result.

use std::sync::Arc;

use ht_core::traits::{AttachOptions, Attached, RemoteEngine};
use ht_core::{ConnectionError, DetachKeys, TargetId, TargetKind, TerminalError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::SessionError;
use crate::exit::SessionExitResolver;
use crate::relay::{LocalStdio, RelayOutcome, StreamRelay};
use crate::resize::{ResizeMonitor, WatchMode};
use crate::signals::{os_signals, SignalForwarder};

/// What a session attaches and how it behaves
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Kind of the target, used to route resize requests
    pub kind: TargetKind,
    /// The remote side has a pseudo-terminal
    pub tty: bool,
    /// Forward local input
    pub attach_stdin: bool,
    /// Receive standard output
    pub attach_stdout: bool,
    /// Receive standard error
    pub attach_stderr: bool,
    /// Sequence that detaches in TTY mode
    pub detach_keys: DetachKeys,
    /// Relay local signals to the target when there is no TTY
    pub proxy_signals: bool,
    /// The engine removes the target after it exits
    pub auto_remove: bool,
    /// Start the target's process after attaching
    pub start: bool,
    /// Nudge full-screen programs to repaint on attach
    pub redraw_on_attach: bool,
    /// How local window changes are detected
    pub watch_mode: WatchMode,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            kind: TargetKind::Container,
            tty: false,
            attach_stdin: false,
            attach_stdout: true,
            attach_stderr: true,
            detach_keys: DetachKeys::default(),
            proxy_signals: true,
            auto_remove: false,
            start: false,
            redraw_on_attach: false,
            watch_mode: WatchMode::default(),
        }
    }
}

/// One interactive session against one remote target
pub struct Session {
    engine: Arc<dyn RemoteEngine>,
    target: TargetId,
    options: SessionOptions,
    cancel: CancellationToken,
    signals: Option<mpsc::UnboundedReceiver<i32>>,
}

impl Session {
    /// Create a session
    pub fn new(engine: Arc<dyn RemoteEngine>, target: TargetId, options: SessionOptions) -> Self {
        Self {
            engine,
            target,
            options,
            cancel: CancellationToken::new(),
            signals: None,
        }
    }

    /// Forward signals from `signals` instead of subscribing to the process's own
    pub fn with_signal_source(mut self, signals: mpsc::UnboundedReceiver<i32>) -> Self {
        self.signals = Some(signals);
        self
    }

    /// Token that cancels the session from outside
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the session to completion
    ///
    /// Background helpers (resize monitor, signal forwarder) are stopped
    /// before this returns, whatever the result.
    pub async fn run(mut self, stdio: LocalStdio) -> Result<(), SessionError> {
        let result = self.drive(stdio).await;
        self.cancel.cancel();
        match &result {
            Ok(()) => debug!(id = %self.target.short(), "Session finished"),
            Err(e) => debug!(id = %self.target.short(), "Session finished with error: {}", e),
        }
        result
    }

    async fn drive(&mut self, stdio: LocalStdio) -> Result<(), SessionError> {
        let options = self.options.clone();

        // Refuse before touching the engine
        if options.tty && options.attach_stdin {
            let is_terminal = stdio
                .terminal
                .as_ref()
                .map(|t| t.is_terminal())
                .unwrap_or(false);
            if !is_terminal {
                return Err(TerminalError::NotATerminal.into());
            }
        }

        let resolver =
            SessionExitResolver::subscribe(self.engine.as_ref(), &self.target, options.auto_remove)
                .await;

        let attach_options = AttachOptions {
            stdin: options.attach_stdin,
            stdout: options.attach_stdout,
            stderr: options.attach_stderr,
            detach_keys: options.detach_keys.clone(),
        };
        let Attached {
            connection,
            early_close,
        } = self
            .engine
            .attach(&self.target, &attach_options)
            .await
            .map_err(SessionError::Engine)?;
        debug!(id = %self.target.short(), tty = options.tty, "Attached");

        let forwarder = if options.proxy_signals && !options.tty {
            self.start_signal_forwarder()
        } else {
            None
        };

        let stdio = stdio.restrict(
            options.attach_stdin,
            options.attach_stdout,
            options.attach_stderr,
        );
        let terminal = stdio.terminal.clone();
        let relay_cancel = self.cancel.child_token();
        let relay = StreamRelay::new(options.tty, options.detach_keys.clone(), stdio)
            .start(connection, relay_cancel.clone())
            .await?;

        if options.start {
            if let Err(e) = self.engine.start(&self.target).await {
                debug!(id = %self.target.short(), "Start failed: {}", e);
                relay_cancel.cancel();
                relay.outcome().await;
                if options.auto_remove {
                    resolver.await_removal().await;
                }
                return Err(SessionError::Start(e));
            }
            debug!(id = %self.target.short(), "Started");
        }

        if options.tty {
            if let Some(terminal) = terminal.filter(|t| t.is_terminal()) {
                ResizeMonitor::new(
                    self.engine.clone(),
                    self.target.clone(),
                    options.kind,
                    terminal,
                )
                .spawn(
                    options.watch_mode,
                    options.redraw_on_attach,
                    self.cancel.clone(),
                );
            }
        }

        let outcome = match (relay.outcome().await, early_close) {
            (RelayOutcome::Completed, Some(message)) => {
                RelayOutcome::Failed(ConnectionError::ClosedByRemote(message))
            }
            (outcome, _) => outcome,
        };

        if let Some(forwarder) = forwarder {
            forwarder.stop();
        }

        if matches!(outcome, RelayOutcome::Detached) {
            info!(id = %self.target.short(), "Detached from session");
        }
        resolver.resolve(outcome, &self.cancel).await
    }

    fn start_signal_forwarder(&mut self) -> Option<SignalForwarder> {
        let signals = match self.signals.take() {
            Some(signals) => Ok(signals),
            None => os_signals(&self.cancel),
        };
        match signals {
            Ok(signals) => Some(SignalForwarder::spawn(
                self.engine.clone(),
                self.target.clone(),
                signals,
                self.cancel.clone(),
            )),
            Err(e) => {
                debug!("Couldn't subscribe to signals: {}", e);
                None
            }
        }
    }
}
