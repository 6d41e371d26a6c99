//! Remote engine trait
//!
//! The streaming core never talks to an engine directly over the wire. It
//! consumes the handful of operations below, which any backend (a container
//! daemon client, the in-process loopback engine, a test double) provides.

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::connection::Connection;
use crate::detach_keys::DetachKeys;
use crate::error::EngineError;
use crate::types::{TargetId, TargetKind, TerminalSize};

/// Which local streams the attach request wants wired up
#[derive(Debug, Clone, Default)]
pub struct AttachOptions {
    /// Forward local input
    pub stdin: bool,
    /// Receive standard output
    pub stdout: bool,
    /// Receive standard error
    pub stderr: bool,
    /// Sequence the engine should also treat as a detach request
    pub detach_keys: DetachKeys,
}

/// Result of a successful attach
pub struct Attached {
    /// The hijacked connection
    pub connection: Connection,
    /// Set when the remote hit an error before streaming began and closed
    /// its end, but left the explanation readable on the connection
    pub early_close: Option<String>,
}

impl Attached {
    /// Wrap a connection with no early-close condition
    pub fn new(connection: Connection) -> Self {
        Self {
            connection,
            early_close: None,
        }
    }
}

/// Condition a wait-for-exit subscription resolves on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitCondition {
    /// The next time the process exits
    #[default]
    NextExit,
    /// After the process exited and the target was removed
    Removed,
}

/// Termination report delivered by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitNotification {
    /// Process exit status
    pub status_code: i64,
    /// Failure the engine embedded in the notification, if any
    pub error: Option<String>,
}

impl ExitNotification {
    /// A plain exit with the given status
    pub fn status(status_code: i64) -> Self {
        Self {
            status_code,
            error: None,
        }
    }
}

/// Pending wait-for-exit subscription
#[derive(Debug)]
pub struct ExitSubscription {
    rx: oneshot::Receiver<Result<ExitNotification, EngineError>>,
}

/// Sending side of an [`ExitSubscription`], held by the engine
#[derive(Debug)]
pub struct ExitReporter {
    tx: oneshot::Sender<Result<ExitNotification, EngineError>>,
}

/// Create a linked reporter/subscription pair
pub fn exit_channel() -> (ExitReporter, ExitSubscription) {
    let (tx, rx) = oneshot::channel();
    (ExitReporter { tx }, ExitSubscription { rx })
}

impl ExitReporter {
    /// Deliver the result; a dropped subscription is ignored
    pub fn report(self, result: Result<ExitNotification, EngineError>) {
        let _ = self.tx.send(result);
    }
}

impl ExitSubscription {
    /// Wait for the engine to report termination
    pub async fn recv(self) -> Result<ExitNotification, EngineError> {
        self.rx.await.unwrap_or_else(|_| {
            Err(EngineError::Request(
                "wait subscription closed before the target exited".to_string(),
            ))
        })
    }
}

/// Operations the session core consumes from a remote engine
#[async_trait]
pub trait RemoteEngine: Send + Sync {
    /// Open a hijacked connection to the target
    async fn attach(
        &self,
        target: &TargetId,
        options: &AttachOptions,
    ) -> Result<Attached, EngineError>;

    /// Start the target's process
    async fn start(&self, target: &TargetId) -> Result<(), EngineError>;

    /// Resize the target's pseudo-terminal
    async fn resize(
        &self,
        target: &TargetId,
        size: TerminalSize,
        kind: TargetKind,
    ) -> Result<(), EngineError>;

    /// Deliver a signal, named without the `SIG` prefix (e.g. `TERM`)
    async fn send_signal(&self, target: &TargetId, signal: &str) -> Result<(), EngineError>;

    /// Subscribe to the target's termination
    async fn wait_for_exit(
        &self,
        target: &TargetId,
        condition: WaitCondition,
    ) -> Result<ExitSubscription, EngineError>;
}
