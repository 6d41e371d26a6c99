//! Signal forwarding for non-TTY sessions
//!
//! Without a terminal there is no line discipline to turn keystrokes into
//! signals on the remote side, so signals delivered to this process are
//! relayed by name instead.

use std::io;
use std::sync::Arc;

use ht_core::signal::signal_name;
use ht_core::traits::RemoteEngine;
use ht_core::TargetId;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Whether a received signal should be relayed to the remote
///
/// Child-status and broken-pipe notifications concern this process only,
/// and the urgent-data signal is used by some runtimes for preemption.
pub fn is_forwardable(signo: i32) -> bool {
    !matches!(signal_name(signo), Some("CHLD" | "PIPE" | "URG"))
}

/// Relays locally received signals to a remote target
pub struct SignalForwarder {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SignalForwarder {
    /// Start relaying signals from `signals` to `target`
    ///
    /// Each delivery runs on its own task so a slow engine never holds up
    /// the next signal. The forwarder stops on [`stop`](Self::stop), when
    /// `cancel` fires or when the signal source closes.
    pub fn spawn(
        engine: Arc<dyn RemoteEngine>,
        target: TargetId,
        mut signals: mpsc::UnboundedReceiver<i32>,
        cancel: CancellationToken,
    ) -> Self {
        let cancel = cancel.child_token();
        let loop_cancel = cancel.clone();

        let task = tokio::spawn(async move {
            loop {
                let signo = tokio::select! {
                    biased;
                    _ = loop_cancel.cancelled() => break,
                    signo = signals.recv() => match signo {
                        Some(signo) => signo,
                        None => break,
                    },
                };

                if !is_forwardable(signo) {
                    continue;
                }
                let Some(name) = signal_name(signo) else {
                    debug!("Unsupported signal: {}. Discarding.", signo);
                    continue;
                };

                let engine = engine.clone();
                let target = target.clone();
                tokio::spawn(async move {
                    if let Err(e) = engine.send_signal(&target, name).await {
                        debug!("Error sending signal {}: {}", name, e);
                    }
                });
            }
            debug!("Signal forwarder stopped");
        });

        Self { cancel, task }
    }

    /// Stop forwarding and release the subscription
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Wait for the forwarding loop to exit
    pub async fn join(self) {
        let _ = self.task.await;
    }
}

/// Subscribe to every catchable signal delivered to this process
///
/// Signal numbers arrive on the returned channel until `cancel` fires.
#[cfg(unix)]
pub fn os_signals(cancel: &CancellationToken) -> io::Result<mpsc::UnboundedReceiver<i32>> {
    use tokio::signal::unix::{signal, SignalKind};

    const CATCHABLE: &[i32] = &[
        libc::SIGHUP,
        libc::SIGINT,
        libc::SIGQUIT,
        libc::SIGUSR1,
        libc::SIGUSR2,
        libc::SIGPIPE,
        libc::SIGALRM,
        libc::SIGTERM,
        libc::SIGCHLD,
        libc::SIGCONT,
        libc::SIGTSTP,
        libc::SIGTTIN,
        libc::SIGTTOU,
        libc::SIGURG,
        libc::SIGXCPU,
        libc::SIGXFSZ,
        libc::SIGVTALRM,
        libc::SIGPROF,
        libc::SIGWINCH,
        libc::SIGIO,
        libc::SIGSYS,
    ];

    let (tx, rx) = mpsc::unbounded_channel();
    for &signo in CATCHABLE {
        let mut stream = signal(SignalKind::from_raw(signo))?;
        let tx = tx.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    received = stream.recv() => {
                        if received.is_none() || tx.send(signo).is_err() {
                            break;
                        }
                    }
                }
            }
        });
    }
    Ok(rx)
}

/// Subscribe to interrupt requests delivered to this process
#[cfg(not(unix))]
pub fn os_signals(cancel: &CancellationToken) -> io::Result<mpsc::UnboundedReceiver<i32>> {
    const SIGINT: i32 = 2;

    let (tx, rx) = mpsc::unbounded_channel();
    let cancel = cancel.clone();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                received = tokio::signal::ctrl_c() => {
                    if received.is_err() || tx.send(SIGINT).is_err() {
                        break;
                    }
                }
            }
        }
    });
    Ok(rx)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_process_local_signals_are_dropped() {
        assert!(!is_forwardable(libc::SIGCHLD));
        assert!(!is_forwardable(libc::SIGPIPE));
        assert!(!is_forwardable(libc::SIGURG));
        assert!(is_forwardable(libc::SIGTERM));
        assert!(is_forwardable(libc::SIGINT));
        assert!(is_forwardable(libc::SIGWINCH));
    }
}
