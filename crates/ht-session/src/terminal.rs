//! Local terminal handling
//!
//! [`TerminalModeGuard`] puts the terminal into raw mode for the duration of
//! a TTY session and restores it exactly once, whichever of the relay tasks
//! or the drop path gets there first. [`CrosstermTerminal`] is the real
//! terminal; [`LocalStdin`] turns blocking process stdin into an async
//! reader whose input can be released on restore.

use std::io::{self, Read};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use bytes::{Buf, Bytes};
use crossterm::tty::IsTty;
use futures::task::AtomicWaker;
use ht_core::traits::LocalTerminal;
use ht_core::{TerminalError, TerminalSize};
use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::mpsc;
use tracing::debug;

/// Raw mode for the lifetime of a session, restored once
pub struct TerminalModeGuard {
    terminal: Arc<dyn LocalTerminal>,
    restored: AtomicBool,
}

impl TerminalModeGuard {
    /// Switch `terminal` into raw mode
    pub fn enter(terminal: Arc<dyn LocalTerminal>) -> Result<Self, TerminalError> {
        if !terminal.is_terminal() {
            return Err(TerminalError::NotATerminal);
        }
        terminal.set_raw_mode()?;
        debug!("Entered raw terminal mode");

        Ok(Self {
            terminal,
            restored: AtomicBool::new(false),
        })
    }

    /// Restore the original mode and release local input
    ///
    /// Only the first call has any effect. Failures are logged, never
    /// returned: restoration runs on exit paths that have nothing better
    /// to do with an error.
    pub fn restore(&self) {
        if self.restored.swap(true, Ordering::SeqCst) {
            return;
        }

        match self.terminal.restore_mode() {
            Ok(()) => debug!("Restored terminal mode"),
            Err(e) => debug!("Error restoring terminal mode: {}", e),
        }

        if self.terminal.input_close_may_block() {
            debug!("Leaving local input open, closing it may block");
        } else if let Err(e) = self.terminal.close_input() {
            debug!("Error closing local input: {}", e);
        }
    }

    /// Whether [`restore`](Self::restore) has run
    pub fn is_restored(&self) -> bool {
        self.restored.load(Ordering::SeqCst)
    }
}

impl Drop for TerminalModeGuard {
    fn drop(&mut self) {
        self.restore();
    }
}

/// The process's own terminal, driven through crossterm
#[derive(Default)]
pub struct CrosstermTerminal {
    stdin: Option<StdinHandle>,
}

impl CrosstermTerminal {
    /// Terminal without a managed input handle
    pub fn new() -> Self {
        Self::default()
    }

    /// Terminal whose `close_input` releases the given stdin reader
    pub fn with_stdin(stdin: StdinHandle) -> Self {
        Self { stdin: Some(stdin) }
    }
}

impl LocalTerminal for CrosstermTerminal {
    // Only input decides: output may be redirected to a file
    fn is_terminal(&self) -> bool {
        io::stdin().is_tty()
    }

    fn size(&self) -> Result<TerminalSize, TerminalError> {
        let (cols, rows) = crossterm::terminal::size().map_err(TerminalError::Size)?;
        Ok(TerminalSize::new(rows, cols))
    }

    fn set_raw_mode(&self) -> Result<(), TerminalError> {
        crossterm::terminal::enable_raw_mode().map_err(TerminalError::RawMode)
    }

    fn restore_mode(&self) -> Result<(), TerminalError> {
        crossterm::terminal::disable_raw_mode().map_err(TerminalError::RawMode)
    }

    fn close_input(&self) -> Result<(), TerminalError> {
        if let Some(stdin) = &self.stdin {
            stdin.close();
        }
        Ok(())
    }
}

struct StdinShared {
    closed: AtomicBool,
    waker: AtomicWaker,
}

/// Handle that releases a [`LocalStdin`]
#[derive(Clone)]
pub struct StdinHandle {
    shared: Arc<StdinShared>,
}

impl StdinHandle {
    /// Make the reader report end of input from now on
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        self.shared.waker.wake();
    }
}

/// Async reader over blocking local input
///
/// A dedicated thread performs the blocking reads. The thread cannot be
/// interrupted mid-read, so closing the handle only detaches the reader;
/// the thread exits on its next read or with the process.
pub struct LocalStdin {
    rx: mpsc::UnboundedReceiver<io::Result<Bytes>>,
    pending: Bytes,
    shared: Arc<StdinShared>,
}

impl LocalStdin {
    /// Read the process's standard input
    pub fn spawn() -> (Self, StdinHandle) {
        Self::from_reader(io::stdin())
    }

    /// Read any blocking source on a dedicated thread
    pub fn from_reader<R>(mut reader: R) -> (Self, StdinHandle)
    where
        R: Read + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(StdinShared {
            closed: AtomicBool::new(false),
            waker: AtomicWaker::new(),
        });
        let thread_shared = shared.clone();

        std::thread::spawn(move || {
            let mut buf = [0u8; 4096];
            loop {
                if thread_shared.closed.load(Ordering::SeqCst) {
                    break;
                }
                match reader.read(&mut buf) {
                    Ok(0) => {
                        debug!("Local input reached EOF");
                        break;
                    }
                    Ok(n) => {
                        if tx.send(Ok(Bytes::copy_from_slice(&buf[..n]))).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        let _ = tx.send(Err(e));
                        break;
                    }
                }
            }
            debug!("Local input thread exiting");
        });

        let handle = StdinHandle {
            shared: shared.clone(),
        };
        let stdin = Self {
            rx,
            pending: Bytes::new(),
            shared,
        };
        (stdin, handle)
    }
}

impl AsyncRead for LocalStdin {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;
        loop {
            this.shared.waker.register(cx.waker());
            if this.shared.closed.load(Ordering::SeqCst) {
                return Poll::Ready(Ok(()));
            }

            if !this.pending.is_empty() {
                let n = this.pending.len().min(buf.remaining());
                buf.put_slice(&this.pending[..n]);
                this.pending.advance(n);
                return Poll::Ready(Ok(()));
            }

            match ready!(this.rx.poll_recv(cx)) {
                Some(Ok(chunk)) => this.pending = chunk,
                Some(Err(e)) => return Poll::Ready(Err(e)),
                None => return Poll::Ready(Ok(())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::io::AsyncReadExt;

    #[derive(Default)]
    struct CountingTerminal {
        not_a_tty: bool,
        raw: AtomicUsize,
        restores: AtomicUsize,
        closes: AtomicUsize,
        blocking_close: bool,
    }

    impl LocalTerminal for CountingTerminal {
        fn is_terminal(&self) -> bool {
            !self.not_a_tty
        }

        fn size(&self) -> Result<TerminalSize, TerminalError> {
            Ok(TerminalSize::default())
        }

        fn set_raw_mode(&self) -> Result<(), TerminalError> {
            self.raw.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn restore_mode(&self) -> Result<(), TerminalError> {
            self.restores.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn close_input(&self) -> Result<(), TerminalError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn input_close_may_block(&self) -> bool {
            self.blocking_close
        }
    }

    #[test]
    fn test_restore_runs_once() {
        let terminal = Arc::new(CountingTerminal::default());
        let guard = TerminalModeGuard::enter(terminal.clone()).unwrap();
        assert_eq!(terminal.raw.load(Ordering::SeqCst), 1);

        guard.restore();
        guard.restore();
        assert!(guard.is_restored());
        drop(guard);

        assert_eq!(terminal.restores.load(Ordering::SeqCst), 1);
        assert_eq!(terminal.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_restore_on_drop() {
        let terminal = Arc::new(CountingTerminal::default());
        drop(TerminalModeGuard::enter(terminal.clone()).unwrap());
        assert_eq!(terminal.restores.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_restore() {
        let terminal = Arc::new(CountingTerminal::default());
        let guard = Arc::new(TerminalModeGuard::enter(terminal.clone()).unwrap());

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let guard = guard.clone();
                std::thread::spawn(move || guard.restore())
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        drop(guard);

        assert_eq!(terminal.restores.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_skips_close_when_it_may_block() {
        let terminal = Arc::new(CountingTerminal {
            blocking_close: true,
            ..Default::default()
        });
        TerminalModeGuard::enter(terminal.clone()).unwrap().restore();
        assert_eq!(terminal.restores.load(Ordering::SeqCst), 1);
        assert_eq!(terminal.closes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_enter_requires_terminal() {
        let terminal = Arc::new(CountingTerminal {
            not_a_tty: true,
            ..Default::default()
        });
        let err = TerminalModeGuard::enter(terminal.clone()).err().unwrap();
        assert!(matches!(err, TerminalError::NotATerminal));
        assert_eq!(terminal.raw.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_crossterm_terminal_follows_stdin_only() {
        assert_eq!(CrosstermTerminal::new().is_terminal(), io::stdin().is_tty());
    }

    #[tokio::test]
    async fn test_local_stdin_reads_source() {
        let (mut stdin, _handle) = LocalStdin::from_reader(io::Cursor::new(b"hello".to_vec()));
        let mut out = Vec::new();
        stdin.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"hello");
    }

    #[tokio::test]
    async fn test_closed_stdin_reports_eof() {
        struct Endless;
        impl Read for Endless {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                std::thread::sleep(std::time::Duration::from_millis(5));
                buf[0] = b'y';
                Ok(1)
            }
        }

        let (mut stdin, handle) = LocalStdin::from_reader(Endless);
        let mut buf = [0u8; 1];
        stdin.read_exact(&mut buf).await.unwrap();

        handle.close();
        assert_eq!(stdin.read(&mut buf).await.unwrap(), 0);
    }
}
