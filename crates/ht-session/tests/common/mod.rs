//! Test doubles shared by the session integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use ht_core::traits::{
    exit_channel, AttachOptions, Attached, ExitNotification, ExitReporter, ExitSubscription,
    LocalTerminal, RemoteEngine, WaitCondition,
};
use ht_core::{
    Connection, EngineError, TargetId, TargetKind, TerminalError, TerminalSize,
};
use ht_protocol::{StreamFrame, StreamFrameCodec, StreamType};
use tokio::io::{duplex, DuplexStream};
use tokio::sync::mpsc;
use tokio_util::codec::Encoder;

/// Scriptable engine recording every request it receives
#[derive(Default)]
pub struct FakeEngine {
    remotes: Mutex<Option<mpsc::UnboundedSender<DuplexStream>>>,
    reporter: Mutex<Option<ExitReporter>>,
    pub wait_condition: Mutex<Option<WaitCondition>>,
    pub attach_count: AtomicUsize,
    pub start_count: AtomicUsize,
    pub resizes: Mutex<Vec<(TerminalSize, TargetKind)>>,
    pub signals: Mutex<Vec<String>>,
    resize_failures: AtomicUsize,
    fail_start: AtomicBool,
    early_close: Mutex<Option<String>>,
}

impl FakeEngine {
    /// Engine plus the receiving end for attached connections
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<DuplexStream>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let engine = Self {
            remotes: Mutex::new(Some(tx)),
            ..Default::default()
        };
        (Arc::new(engine), rx)
    }

    /// Fail the next `n` resize requests
    pub fn fail_resizes(&self, n: usize) {
        self.resize_failures.store(n, Ordering::SeqCst);
    }

    /// Make `start` fail
    pub fn fail_start(&self) {
        self.fail_start.store(true, Ordering::SeqCst);
    }

    /// Report an early close on the next attach
    pub fn close_early(&self, message: &str) {
        *self.early_close.lock().unwrap() = Some(message.to_string());
    }

    /// Deliver an exit report to the pending subscription
    pub fn report_exit(&self, result: Result<ExitNotification, EngineError>) {
        let reporter = self
            .reporter
            .lock()
            .unwrap()
            .take()
            .expect("no exit subscription");
        reporter.report(result);
    }

    pub fn resize_sizes(&self) -> Vec<TerminalSize> {
        self.resizes.lock().unwrap().iter().map(|(s, _)| *s).collect()
    }

    pub fn signal_names(&self) -> Vec<String> {
        self.signals.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteEngine for FakeEngine {
    async fn attach(
        &self,
        _target: &TargetId,
        _options: &AttachOptions,
    ) -> Result<Attached, EngineError> {
        self.attach_count.fetch_add(1, Ordering::SeqCst);
        let (local, remote) = duplex(64 * 1024);
        if let Some(tx) = self.remotes.lock().unwrap().as_ref() {
            let _ = tx.send(remote);
        }
        Ok(Attached {
            connection: Connection::from_stream(local),
            early_close: self.early_close.lock().unwrap().take(),
        })
    }

    async fn start(&self, target: &TargetId) -> Result<(), EngineError> {
        self.start_count.fetch_add(1, Ordering::SeqCst);
        if !self.fail_start.load(Ordering::SeqCst) {
            return Ok(());
        }

        // An auto-removed target disappears right after a failed start
        if *self.wait_condition.lock().unwrap() == Some(WaitCondition::Removed) {
            if let Some(reporter) = self.reporter.lock().unwrap().take() {
                reporter.report(Ok(ExitNotification::status(127)));
            }
        }
        Err(EngineError::Request(format!(
            "executable file not found for {}",
            target
        )))
    }

    async fn resize(
        &self,
        _target: &TargetId,
        size: TerminalSize,
        kind: TargetKind,
    ) -> Result<(), EngineError> {
        self.resizes.lock().unwrap().push((size, kind));
        let failing = self
            .resize_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(EngineError::Request("tty not ready".to_string()));
        }
        Ok(())
    }

    async fn send_signal(&self, _target: &TargetId, signal: &str) -> Result<(), EngineError> {
        self.signals.lock().unwrap().push(signal.to_string());
        Ok(())
    }

    async fn wait_for_exit(
        &self,
        _target: &TargetId,
        condition: WaitCondition,
    ) -> Result<ExitSubscription, EngineError> {
        let (reporter, subscription) = exit_channel();
        *self.reporter.lock().unwrap() = Some(reporter);
        *self.wait_condition.lock().unwrap() = Some(condition);
        Ok(subscription)
    }
}

/// Terminal double with an adjustable size and call counters
pub struct FakeTerminal {
    pub tty: bool,
    pub size: Mutex<TerminalSize>,
    pub raw_calls: AtomicUsize,
    pub restore_calls: AtomicUsize,
}

impl FakeTerminal {
    pub fn new(size: TerminalSize) -> Arc<Self> {
        Arc::new(Self {
            tty: true,
            size: Mutex::new(size),
            raw_calls: AtomicUsize::new(0),
            restore_calls: AtomicUsize::new(0),
        })
    }

    pub fn not_a_tty() -> Arc<Self> {
        Arc::new(Self {
            tty: false,
            size: Mutex::new(TerminalSize::default()),
            raw_calls: AtomicUsize::new(0),
            restore_calls: AtomicUsize::new(0),
        })
    }

    pub fn set_size(&self, size: TerminalSize) {
        *self.size.lock().unwrap() = size;
    }

    pub fn restores(&self) -> usize {
        self.restore_calls.load(Ordering::SeqCst)
    }
}

impl LocalTerminal for FakeTerminal {
    fn is_terminal(&self) -> bool {
        self.tty
    }

    fn size(&self) -> Result<TerminalSize, TerminalError> {
        Ok(*self.size.lock().unwrap())
    }

    fn set_raw_mode(&self) -> Result<(), TerminalError> {
        self.raw_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn restore_mode(&self) -> Result<(), TerminalError> {
        self.restore_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Encode one multiplexed frame
pub fn frame(stream: StreamType, payload: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    StreamFrameCodec::new()
        .encode(StreamFrame::new(stream, payload.to_vec()), &mut buf)
        .unwrap();
    buf.to_vec()
}

/// Poll `check` until it holds or a second passes
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
