//! Exit status resolution
//!
//! The wait subscription is opened before the relay starts so a process
//! that exits immediately is not missed. Which exit is waited for depends
//! on whether the engine removes the target afterwards: waiting for
//! removal keeps the status read from racing the removal.

use ht_core::traits::{ExitSubscription, RemoteEngine, WaitCondition};
use ht_core::{EngineError, TargetId};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::SessionError;
use crate::relay::RelayOutcome;

/// Turns a relay outcome and the engine's exit report into a session result
pub struct SessionExitResolver {
    target: TargetId,
    subscription: Result<ExitSubscription, EngineError>,
}

impl SessionExitResolver {
    /// Subscribe to the target's termination
    ///
    /// A failed subscription is kept and only surfaces if the session ends
    /// up needing the exit status.
    pub async fn subscribe(engine: &dyn RemoteEngine, target: &TargetId, auto_remove: bool) -> Self {
        let condition = if auto_remove {
            WaitCondition::Removed
        } else {
            WaitCondition::NextExit
        };

        let subscription = engine.wait_for_exit(target, condition).await;
        if let Err(e) = &subscription {
            debug!(id = %target.short(), "Error subscribing to exit: {}", e);
        }
        Self::from_subscription(target.clone(), subscription)
    }

    /// Wrap an existing subscription
    pub fn from_subscription(
        target: TargetId,
        subscription: Result<ExitSubscription, EngineError>,
    ) -> Self {
        Self {
            target,
            subscription,
        }
    }

    /// Combine the relay outcome with the exit report
    ///
    /// A detach succeeds without looking at the subscription. Relay
    /// failures win over the exit status.
    pub async fn resolve(
        self,
        outcome: RelayOutcome,
        cancel: &CancellationToken,
    ) -> Result<(), SessionError> {
        match outcome {
            RelayOutcome::Detached => {
                debug!(id = %self.target.short(), "Detached, not waiting for exit");
                Ok(())
            }
            RelayOutcome::Failed(e) => Err(SessionError::Connection(e)),
            RelayOutcome::Cancelled => Err(SessionError::Cancelled),
            RelayOutcome::Completed => self.wait(cancel).await,
        }
    }

    /// Wait for the exit report and map it to a result
    pub async fn wait(self, cancel: &CancellationToken) -> Result<(), SessionError> {
        let subscription = self.subscription.map_err(SessionError::Wait)?;

        let notification = tokio::select! {
            _ = cancel.cancelled() => return Err(SessionError::Cancelled),
            received = subscription.recv() => received.map_err(SessionError::Wait)?,
        };

        if let Some(message) = notification.error {
            return Err(SessionError::RemoteExit(message));
        }
        match notification.status_code {
            0 => Ok(()),
            code => {
                debug!(id = %self.target.short(), code, "Remote process exited");
                Err(SessionError::NonZeroExit(i32::try_from(code).unwrap_or(i32::MAX)))
            }
        }
    }

    /// Drain the subscription after a failed start so removal completes
    pub async fn await_removal(self) {
        let Ok(subscription) = self.subscription else {
            return;
        };
        match subscription.recv().await {
            Ok(notification) => debug!(
                id = %self.target.short(),
                "Target removed with status {}", notification.status_code
            ),
            Err(e) => debug!(id = %self.target.short(), "Error waiting for removal: {}", e),
        }
    }
}
