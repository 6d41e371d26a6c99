//! Bidirectional stream relay
//!
//! Two tasks move bytes: input copies local input to the connection (through
//! the detach filter in TTY mode), output copies the connection to local
//! output (verbatim in TTY mode, demultiplexed by frame header otherwise).
//! The relay resolves on the first decisive event: a detach, the end of
//! output, a failure or cancellation.

use std::borrow::Cow;
use std::io;
use std::sync::Arc;

use futures::StreamExt;
use ht_core::traits::LocalTerminal;
use ht_core::{
    Connection, ConnectionError, ConnectionReader, ConnectionWriter, DetachKeys, TerminalError,
};
use ht_protocol::{StreamFrameCodec, StreamType};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::codec::FramedRead;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info};

use crate::detach::DetachSequenceFilter;
use crate::terminal::TerminalModeGuard;

const COPY_BUFFER_SIZE: usize = 32 * 1024;

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Local side of a session: optional streams plus the terminal behind them
#[derive(Default)]
pub struct LocalStdio {
    /// Local input
    pub input: Option<BoxedReader>,
    /// Local standard output
    pub output: Option<BoxedWriter>,
    /// Local standard error
    pub error: Option<BoxedWriter>,
    /// Terminal owning the input, used for raw mode and sizing
    pub terminal: Option<Arc<dyn LocalTerminal>>,
}

impl LocalStdio {
    /// No streams attached
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach local input
    pub fn with_input(mut self, input: impl AsyncRead + Send + Unpin + 'static) -> Self {
        self.input = Some(Box::new(input));
        self
    }

    /// Attach local standard output
    pub fn with_output(mut self, output: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        self.output = Some(Box::new(output));
        self
    }

    /// Attach local standard error
    pub fn with_error(mut self, error: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        self.error = Some(Box::new(error));
        self
    }

    /// Use `terminal` as the local terminal
    pub fn with_terminal(mut self, terminal: Arc<dyn LocalTerminal>) -> Self {
        self.terminal = Some(terminal);
        self
    }

    /// Drop streams the session did not ask to attach
    pub fn restrict(mut self, stdin: bool, stdout: bool, stderr: bool) -> Self {
        if !stdin {
            self.input = None;
        }
        if !stdout {
            self.output = None;
        }
        if !stderr {
            self.error = None;
        }
        self
    }
}

/// How a relay ended
#[derive(Debug)]
pub enum RelayOutcome {
    /// Output reached end of stream, or there was nothing to relay
    Completed,
    /// The user typed the detach sequence
    Detached,
    /// A copy direction failed
    Failed(ConnectionError),
    /// The relay was cancelled from outside
    Cancelled,
}

/// Copies bytes between local stdio and a connection
pub struct StreamRelay {
    tty: bool,
    detach_keys: DetachKeys,
    stdio: LocalStdio,
}

/// A relay whose copy tasks are running
pub struct RunningRelay {
    input: Option<JoinHandle<InputEnd>>,
    output: Option<JoinHandle<Result<(), ConnectionError>>>,
    restore: RestoreHandle,
    cancel: CancellationToken,
    _stop_tasks: DropGuard,
}

#[derive(Debug)]
enum InputEnd {
    Drained,
    Detached,
    Cancelled,
    Failed(io::Error),
}

#[derive(Clone)]
struct RestoreHandle(Option<Arc<TerminalModeGuard>>);

impl RestoreHandle {
    fn restore(&self) {
        if let Some(guard) = &self.0 {
            guard.restore();
        }
    }
}

impl StreamRelay {
    /// Create a relay
    ///
    /// In TTY mode with local input attached the terminal is put into raw
    /// mode when the relay starts, and local input is scanned for
    /// `detach_keys`.
    pub fn new(tty: bool, detach_keys: DetachKeys, stdio: LocalStdio) -> Self {
        Self {
            tty,
            detach_keys,
            stdio,
        }
    }

    /// Run to completion
    pub async fn run(
        self,
        connection: Connection,
        cancel: CancellationToken,
    ) -> Result<RelayOutcome, TerminalError> {
        Ok(self.start(connection, cancel).await?.outcome().await)
    }

    /// Prepare the terminal and spawn the copy tasks
    ///
    /// If raw mode cannot be entered the connection is closed and nothing
    /// is spawned.
    pub async fn start(
        self,
        connection: Connection,
        cancel: CancellationToken,
    ) -> Result<RunningRelay, TerminalError> {
        let StreamRelay {
            tty,
            detach_keys,
            stdio,
        } = self;
        let LocalStdio {
            input,
            output,
            error,
            terminal,
        } = stdio;

        let guard = match (input.is_some(), terminal) {
            (true, Some(terminal)) if tty => match TerminalModeGuard::enter(terminal) {
                Ok(guard) => Some(Arc::new(guard)),
                Err(e) => {
                    if let Err(close_err) = connection.close().await {
                        debug!("Error closing connection: {}", close_err);
                    }
                    return Err(e);
                }
            },
            _ => None,
        };
        let restore = RestoreHandle(guard);

        let tasks = cancel.child_token();
        let (reader, writer) = connection.into_split();

        let output = if output.is_some() || error.is_some() {
            Some(tokio::spawn(copy_output(
                reader,
                output,
                error,
                tty,
                restore.clone(),
                tasks.clone(),
            )))
        } else {
            None
        };

        let input = input.map(|input| {
            let filter = tty.then(|| DetachSequenceFilter::new(&detach_keys));
            tokio::spawn(copy_input(
                input,
                writer,
                filter,
                restore.clone(),
                tasks.clone(),
            ))
        });

        Ok(RunningRelay {
            input,
            output,
            restore,
            cancel: tasks.clone(),
            _stop_tasks: tasks.drop_guard(),
        })
    }
}

impl RunningRelay {
    /// Wait for the relay to resolve
    ///
    /// Both copy tasks are stopped and the terminal restored before this
    /// returns.
    pub async fn outcome(mut self) -> RelayOutcome {
        let outcome = self.resolve().await;
        self.cancel.cancel();
        self.restore.restore();
        debug!("Stream relay finished: {:?}", outcome);
        outcome
    }

    async fn resolve(&mut self) -> RelayOutcome {
        if self.input.is_none() && self.output.is_none() {
            return RelayOutcome::Completed;
        }

        tokio::select! {
            biased;

            end = join_opt(&mut self.input) => {
                match flatten_input(end) {
                    InputEnd::Detached => RelayOutcome::Detached,
                    InputEnd::Cancelled => self.acknowledge_cancel().await,
                    InputEnd::Drained | InputEnd::Failed(_) => match self.output.as_mut() {
                        // Output still decides the outcome once input is done
                        Some(output) => tokio::select! {
                            res = output => output_outcome(res),
                            _ = self.cancel.cancelled() => self.acknowledge_cancel().await,
                        },
                        None => RelayOutcome::Completed,
                    },
                }
            }
            res = join_opt(&mut self.output) => output_outcome(res),
            _ = self.cancel.cancelled() => self.acknowledge_cancel().await,
        }
    }

    async fn acknowledge_cancel(&mut self) -> RelayOutcome {
        self.cancel.cancel();
        if let Some(output) = self.output.as_mut() {
            let _ = output.await;
        }
        RelayOutcome::Cancelled
    }
}

async fn join_opt<T>(task: &mut Option<JoinHandle<T>>) -> Result<T, JoinError> {
    match task {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

fn flatten_input(end: Result<InputEnd, JoinError>) -> InputEnd {
    match end {
        Ok(InputEnd::Failed(e)) => {
            debug!("Error forwarding local input: {}", e);
            InputEnd::Failed(e)
        }
        Ok(end) => end,
        Err(e) => {
            debug!("Input task ended abnormally: {}", e);
            InputEnd::Failed(io::Error::new(io::ErrorKind::Other, e.to_string()))
        }
    }
}

fn output_outcome(res: Result<Result<(), ConnectionError>, JoinError>) -> RelayOutcome {
    match res {
        Ok(Ok(())) => RelayOutcome::Completed,
        Ok(Err(e)) => RelayOutcome::Failed(e),
        Err(e) => RelayOutcome::Failed(ConnectionError::Io(io::Error::new(
            io::ErrorKind::Other,
            format!("output task ended abnormally: {}", e),
        ))),
    }
}

async fn copy_input(
    mut input: BoxedReader,
    mut writer: ConnectionWriter,
    mut filter: Option<DetachSequenceFilter>,
    restore: RestoreHandle,
    cancel: CancellationToken,
) -> InputEnd {
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    let mut written = 0usize;

    let end = loop {
        let read = tokio::select! {
            _ = cancel.cancelled() => return InputEnd::Cancelled,
            read = input.read(&mut buf) => read,
        };

        let n = match read {
            Ok(0) => {
                let held = filter.as_mut().map(|f| f.finish()).unwrap_or_default();
                if !held.is_empty() {
                    if let Err(e) = writer.send(&held).await {
                        break InputEnd::Failed(e);
                    }
                }
                break InputEnd::Drained;
            }
            Ok(n) => n,
            Err(e) => break InputEnd::Failed(e),
        };

        let (data, detached) = match filter.as_mut() {
            Some(filter) => {
                let step = filter.feed(&buf[..n]);
                (Cow::Owned(step.forward), step.detached)
            }
            None => (Cow::Borrowed(&buf[..n]), false),
        };

        if !data.is_empty() {
            if let Err(e) = writer.send(&data).await {
                break InputEnd::Failed(e);
            }
            written += data.len();
        }

        if detached {
            debug!("Detach sequence received");
            restore.restore();
            return InputEnd::Detached;
        }
    };

    restore.restore();

    if let InputEnd::Failed(e) = &end {
        if written == 0 && is_remote_closed(e) {
            info!("Remote closed the connection before any input was sent");
            return InputEnd::Drained;
        }
    }

    if let Err(e) = writer.close_write().await {
        debug!("Couldn't send EOF: {}", e);
    }
    end
}

fn is_remote_closed(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
    )
}

async fn copy_output(
    reader: ConnectionReader,
    output: Option<BoxedWriter>,
    error: Option<BoxedWriter>,
    tty: bool,
    restore: RestoreHandle,
    cancel: CancellationToken,
) -> Result<(), ConnectionError> {
    let result = if tty {
        // A terminal merges both streams into one
        copy_raw(reader, output.or(error), &cancel).await
    } else {
        demux(reader, output, error, &cancel).await
    };
    restore.restore();
    result
}

async fn copy_raw(
    mut reader: ConnectionReader,
    mut output: Option<BoxedWriter>,
    cancel: &CancellationToken,
) -> Result<(), ConnectionError> {
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    loop {
        let n = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            read = reader.read(&mut buf) => read?,
        };
        if n == 0 {
            debug!("Remote output reached EOF");
            return Ok(());
        }
        if let Some(out) = output.as_mut() {
            out.write_all(&buf[..n]).await?;
            out.flush().await?;
        }
    }
}

async fn demux(
    reader: ConnectionReader,
    mut output: Option<BoxedWriter>,
    mut error: Option<BoxedWriter>,
    cancel: &CancellationToken,
) -> Result<(), ConnectionError> {
    let mut frames = FramedRead::new(reader, StreamFrameCodec::new());
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            frame = frames.next() => frame,
        };

        let frame = match frame {
            Some(frame) => frame?,
            None => {
                debug!("Remote output reached EOF");
                return Ok(());
            }
        };

        let sink = match frame.stream {
            StreamType::Stdout => output.as_mut(),
            StreamType::Stderr => error.as_mut(),
            StreamType::Stdin => None,
            StreamType::SystemErr => {
                return Err(ConnectionError::Remote(
                    String::from_utf8_lossy(&frame.payload).into_owned(),
                ));
            }
        };
        if let Some(sink) = sink {
            sink.write_all(&frame.payload).await?;
            sink.flush().await?;
        }
    }
}
