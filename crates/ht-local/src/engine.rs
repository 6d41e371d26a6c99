//! Local process engine

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use futures::future::BoxFuture;
use ht_core::signal::signal_number;
use ht_core::traits::{
    exit_channel, AttachOptions, Attached, ExitNotification, ExitReporter, ExitSubscription,
    RemoteEngine, WaitCondition,
};
use ht_core::{Connection, EngineError, TargetId, TargetKind, TerminalSize};
use portable_pty::{MasterPty, PtySize};
use tokio::io::DuplexStream;
use tracing::{debug, info};

/// Buffer size of the in-memory attach connection
const CONNECTION_BUFFER: usize = 64 * 1024;

/// Status reported when a target could not be started
const START_FAILED_STATUS: i64 = 127;

/// What to run for a target
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    /// Program and arguments
    pub command: Vec<String>,
    /// Extra environment variables
    pub env: Vec<(String, String)>,
    /// Run on a pseudo-terminal
    pub tty: bool,
    /// Initial pseudo-terminal size
    pub size: TerminalSize,
}

impl LaunchSpec {
    /// Run `command` with piped standard streams
    pub fn new(command: Vec<String>) -> Self {
        Self {
            command,
            env: Vec::new(),
            tty: false,
            size: TerminalSize::default(),
        }
    }

    /// Run on a pseudo-terminal of the given size
    pub fn with_tty(mut self, size: TerminalSize) -> Self {
        self.tty = true;
        self.size = size;
        self
    }

    /// Add an environment variable
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// A started process
pub(crate) struct Process {
    pub pid: Option<u32>,
    pub master: Option<Box<dyn MasterPty + Send>>,
}

/// Result of spawning a target's process
pub(crate) struct Spawned {
    pub process: Process,
    pub exited: BoxFuture<'static, ExitNotification>,
}

struct Target {
    spec: LaunchSpec,
    stream: Option<DuplexStream>,
    attach: AttachOptions,
    process: Option<Process>,
    exit: Option<ExitNotification>,
    waiters: Vec<(WaitCondition, ExitReporter)>,
}

#[derive(Default)]
struct Shared {
    targets: Mutex<HashMap<TargetId, Target>>,
}

impl Shared {
    fn targets(&self) -> MutexGuard<'_, HashMap<TargetId, Target>> {
        self.targets.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Record termination and notify waiters
    ///
    /// A target with a removal waiter is removed before anyone is told.
    fn finish(&self, id: &TargetId, notification: ExitNotification) {
        let waiters = {
            let mut targets = self.targets();
            let Some(target) = targets.get_mut(id) else {
                return;
            };
            target.exit = Some(notification.clone());
            let waiters = std::mem::take(&mut target.waiters);
            if waiters
                .iter()
                .any(|(condition, _)| *condition == WaitCondition::Removed)
            {
                targets.remove(id);
                debug!(id = %id, "Removed target");
            }
            waiters
        };

        info!(id = %id, status = notification.status_code, "Process exited");
        for (_, reporter) in waiters {
            reporter.report(Ok(notification.clone()));
        }
    }
}

/// Engine that runs targets as local processes
///
/// Targets are created stopped. A single attach is accepted before start;
/// streams of an unattached target are drained and discarded.
#[derive(Default)]
pub struct LocalEngine {
    shared: Arc<Shared>,
    next_id: AtomicU64,
}

impl LocalEngine {
    /// Create an engine with no targets
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a target without starting it
    pub fn create(&self, spec: LaunchSpec) -> Result<TargetId, EngineError> {
        if spec.command.is_empty() {
            return Err(EngineError::Request("no command given".to_string()));
        }

        let id = TargetId::new(format!(
            "local-{}",
            self.next_id.fetch_add(1, Ordering::SeqCst) + 1
        ));
        debug!(id = %id, command = ?spec.command, tty = spec.tty, "Created target");

        self.shared.targets().insert(
            id.clone(),
            Target {
                spec,
                stream: None,
                attach: AttachOptions::default(),
                process: None,
                exit: None,
                waiters: Vec::new(),
            },
        );
        Ok(id)
    }

    /// Whether the engine still knows `target`
    pub fn contains(&self, target: &TargetId) -> bool {
        self.shared.targets().contains_key(target)
    }

    fn spawn_process(
        id: &TargetId,
        spec: &LaunchSpec,
        stream: Option<DuplexStream>,
        attach: &AttachOptions,
    ) -> Result<Spawned, EngineError> {
        if spec.tty {
            crate::pty::spawn(spec, stream, attach)
        } else {
            crate::piped::spawn(spec, stream, attach)
        }
        .map_err(|e| {
            debug!(id = %id, "Failed to start: {}", e);
            e
        })
    }
}

#[async_trait]
impl RemoteEngine for LocalEngine {
    async fn attach(
        &self,
        target: &TargetId,
        options: &AttachOptions,
    ) -> Result<Attached, EngineError> {
        let mut targets = self.shared.targets();
        let entry = targets
            .get_mut(target)
            .ok_or_else(|| EngineError::NotFound(target.to_string()))?;

        if entry.process.is_some() || entry.exit.is_some() {
            return Err(EngineError::Request(format!(
                "{} is already running, attach before start",
                target
            )));
        }
        if entry.stream.is_some() {
            return Err(EngineError::Request(format!("{} is already attached", target)));
        }

        let (local, remote) = tokio::io::duplex(CONNECTION_BUFFER);
        entry.stream = Some(remote);
        entry.attach = options.clone();
        debug!(id = %target, "Attached");

        Ok(Attached::new(Connection::from_stream(local)))
    }

    async fn start(&self, target: &TargetId) -> Result<(), EngineError> {
        let (spec, stream, attach) = {
            let mut targets = self.shared.targets();
            let entry = targets
                .get_mut(target)
                .ok_or_else(|| EngineError::NotFound(target.to_string()))?;
            if entry.process.is_some() || entry.exit.is_some() {
                return Err(EngineError::AlreadyStarted(target.to_string()));
            }
            (entry.spec.clone(), entry.stream.take(), entry.attach.clone())
        };

        let Spawned { process, exited } =
            match Self::spawn_process(target, &spec, stream, &attach) {
                Ok(spawned) => spawned,
                Err(e) => {
                    self.shared
                        .finish(target, ExitNotification::status(START_FAILED_STATUS));
                    return Err(e);
                }
            };

        info!(id = %target, pid = ?process.pid, "Started process");
        if let Some(entry) = self.shared.targets().get_mut(target) {
            entry.process = Some(process);
        }

        let shared = self.shared.clone();
        let id = target.clone();
        tokio::spawn(async move {
            let notification = exited.await;
            shared.finish(&id, notification);
        });
        Ok(())
    }

    async fn resize(
        &self,
        target: &TargetId,
        size: TerminalSize,
        _kind: TargetKind,
    ) -> Result<(), EngineError> {
        let mut targets = self.shared.targets();
        let entry = targets
            .get_mut(target)
            .ok_or_else(|| EngineError::NotFound(target.to_string()))?;
        if !entry.spec.tty {
            return Err(EngineError::NotATty(target.to_string()));
        }

        match entry.process.as_ref().and_then(|p| p.master.as_ref()) {
            Some(master) => {
                debug!(id = %target, %size, "Resizing PTY");
                master
                    .resize(pty_size(size))
                    .map_err(request_error("Failed to resize PTY"))
            }
            None => {
                entry.spec.size = size;
                Ok(())
            }
        }
    }

    async fn send_signal(&self, target: &TargetId, signal: &str) -> Result<(), EngineError> {
        let pid = {
            let targets = self.shared.targets();
            let entry = targets
                .get(target)
                .ok_or_else(|| EngineError::NotFound(target.to_string()))?;
            if entry.exit.is_some() {
                return Err(EngineError::Request(format!("{} is not running", target)));
            }
            entry
                .process
                .as_ref()
                .and_then(|p| p.pid)
                .ok_or_else(|| EngineError::Request(format!("{} is not running", target)))?
        };
        let signo =
            signal_number(signal).ok_or_else(|| EngineError::InvalidSignal(signal.to_string()))?;

        debug!(id = %target, pid, signal, "Sending signal");
        kill(pid, signo)
    }

    async fn wait_for_exit(
        &self,
        target: &TargetId,
        condition: WaitCondition,
    ) -> Result<ExitSubscription, EngineError> {
        let (reporter, subscription) = exit_channel();
        let mut targets = self.shared.targets();
        let entry = targets
            .get_mut(target)
            .ok_or_else(|| EngineError::NotFound(target.to_string()))?;

        match entry.exit.clone() {
            Some(notification) => {
                if condition == WaitCondition::Removed {
                    targets.remove(target);
                }
                reporter.report(Ok(notification));
            }
            None => entry.waiters.push((condition, reporter)),
        }
        Ok(subscription)
    }
}

#[cfg(unix)]
fn kill(pid: u32, signo: i32) -> Result<(), EngineError> {
    // SAFETY: kill has no memory-safety preconditions
    let rc = unsafe { libc::kill(pid as libc::pid_t, signo) };
    if rc == -1 {
        return Err(EngineError::Io(std::io::Error::last_os_error()));
    }
    Ok(())
}

#[cfg(not(unix))]
fn kill(_pid: u32, _signo: i32) -> Result<(), EngineError> {
    Err(EngineError::Request(
        "signals are not supported on this platform".to_string(),
    ))
}

pub(crate) fn pty_size(size: TerminalSize) -> PtySize {
    PtySize {
        rows: size.rows,
        cols: size.cols,
        pixel_width: 0,
        pixel_height: 0,
    }
}

pub(crate) fn request_error<E: Display>(context: &'static str) -> impl FnOnce(E) -> EngineError {
    move |e| EngineError::Request(format!("{}: {}", context, e))
}
