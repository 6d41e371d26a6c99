//! Terminal size propagation
//!
//! The monitor pushes the local window size to the remote once at startup
//! and again whenever the local window changes. The initial push is
//! retried briefly because a freshly started process may not have its
//! terminal ready yet.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use ht_core::traits::{LocalTerminal, RemoteEngine};
use ht_core::{EngineError, TargetId, TargetKind, TerminalSize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Retries after the initial resize fails
pub const BOOTSTRAP_RETRIES: usize = 5;

/// Delay between initial resize retries
pub const BOOTSTRAP_RETRY_DELAY: Duration = Duration::from_millis(10);

/// Poll interval where no window-change signal exists
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// How local window changes are detected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchMode {
    /// React to the window-change signal
    WindowChange,
    /// Compare the window size on a fixed interval
    Poll(Duration),
}

impl WatchMode {
    /// Signal-driven where the platform supports it, polling otherwise
    pub fn platform_default(poll_interval: Duration) -> Self {
        if cfg!(unix) {
            WatchMode::WindowChange
        } else {
            WatchMode::Poll(poll_interval)
        }
    }
}

impl Default for WatchMode {
    fn default() -> Self {
        Self::platform_default(DEFAULT_POLL_INTERVAL)
    }
}

/// Keeps the remote terminal size in step with the local window
pub struct ResizeMonitor {
    engine: Arc<dyn RemoteEngine>,
    target: TargetId,
    kind: TargetKind,
    terminal: Arc<dyn LocalTerminal>,
    last_applied: Mutex<Option<TerminalSize>>,
}

impl ResizeMonitor {
    /// Create a monitor for `target`
    pub fn new(
        engine: Arc<dyn RemoteEngine>,
        target: TargetId,
        kind: TargetKind,
        terminal: Arc<dyn LocalTerminal>,
    ) -> Self {
        Self {
            engine,
            target,
            kind,
            terminal,
            last_applied: Mutex::new(None),
        }
    }

    /// Push the initial size, then watch until `cancel` fires
    ///
    /// With `redraw` set the remote is first resized one row and column
    /// larger, forcing full-screen programs to repaint on attach.
    pub fn spawn(self, mode: WatchMode, redraw: bool, cancel: CancellationToken) -> JoinHandle<()> {
        let monitor = Arc::new(self);
        tokio::spawn(async move {
            monitor.bootstrap(redraw, &cancel).await;
            match mode {
                WatchMode::Poll(interval) => monitor.watch_poll(interval, &cancel).await,
                WatchMode::WindowChange => monitor.watch_window_change(&cancel).await,
            }
            debug!(id = %monitor.target.short(), "Resize monitor stopped");
        })
    }

    /// Resize the remote to `size`
    ///
    /// The size is recorded as applied when the request is issued, so a
    /// failed request is not repeated by the watch loop until the local
    /// size changes again. Zero sizes are skipped.
    pub async fn resize_to(&self, size: TerminalSize) -> Result<(), EngineError> {
        if size.is_zero() {
            return Ok(());
        }
        *self.last_applied.lock().unwrap_or_else(|p| p.into_inner()) = Some(size);

        let result = self.engine.resize(&self.target, size, self.kind).await;
        if let Err(e) = &result {
            debug!(id = %self.target.short(), %size, "Error resizing: {}", e);
        }
        result
    }

    /// Resize the remote if the local size differs from the last one applied
    ///
    /// Returns whether a request was issued.
    pub async fn sync(&self) -> bool {
        let Some(size) = self.local_size() else {
            return false;
        };
        if self.last_applied() == Some(size) {
            return false;
        }
        let _ = self.resize_to(size).await;
        true
    }

    /// Size most recently sent to the remote
    pub fn last_applied(&self) -> Option<TerminalSize> {
        *self.last_applied.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn local_size(&self) -> Option<TerminalSize> {
        match self.terminal.size() {
            Ok(size) if !size.is_zero() => Some(size),
            Ok(_) => None,
            Err(e) => {
                debug!("Couldn't read local terminal size: {}", e);
                None
            }
        }
    }

    async fn bootstrap(self: &Arc<Self>, redraw: bool, cancel: &CancellationToken) {
        let Some(size) = self.local_size() else {
            return;
        };

        if redraw {
            let _ = self.resize_to(size.grown()).await;
        }
        if self.resize_to(size).await.is_ok() {
            return;
        }

        let monitor = Arc::clone(self);
        let cancel = cancel.clone();
        tokio::spawn(async move { monitor.retry_bootstrap(&cancel).await });
    }

    async fn retry_bootstrap(&self, cancel: &CancellationToken) {
        for retry in 1..=BOOTSTRAP_RETRIES {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(BOOTSTRAP_RETRY_DELAY) => {}
            }

            let Some(size) = self.local_size() else {
                return;
            };
            if self.resize_to(size).await.is_ok() {
                debug!(retry, "Initial resize succeeded");
                return;
            }
        }
        warn!("Failed to resize tty, using default size");
    }

    async fn watch_poll(&self, interval: Duration, cancel: &CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(interval) => {
                    self.sync().await;
                }
            }
        }
    }

    #[cfg(unix)]
    async fn watch_window_change(&self, cancel: &CancellationToken) {
        use tokio::signal::unix::{signal, SignalKind};

        let mut winch = match signal(SignalKind::window_change()) {
            Ok(winch) => winch,
            Err(e) => {
                debug!("Couldn't watch window changes, polling instead: {}", e);
                return self.watch_poll(DEFAULT_POLL_INTERVAL, cancel).await;
            }
        };

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                received = winch.recv() => {
                    if received.is_none() {
                        return;
                    }
                    self.sync().await;
                }
            }
        }
    }

    #[cfg(not(unix))]
    async fn watch_window_change(&self, cancel: &CancellationToken) {
        self.watch_poll(DEFAULT_POLL_INTERVAL, cancel).await
    }
}
