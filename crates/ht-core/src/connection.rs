//! Duplex connection to a remote target
//!
//! A hijacked connection is a raw byte stream in both directions. The read
//! side carries the remote process output; the write side carries local
//! input and can be half-closed to signal end of input while reads continue.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Established duplex byte stream to a remote target
pub struct Connection {
    reader: ConnectionReader,
    writer: ConnectionWriter,
}

impl Connection {
    /// Build a connection from separate read and write halves
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            reader: ConnectionReader {
                inner: Box::new(reader),
            },
            writer: ConnectionWriter {
                inner: Box::new(writer),
                write_closed: false,
            },
        }
    }

    /// Build a connection from a single bidirectional stream
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        Self::new(reader, writer)
    }

    /// Split into independently owned halves
    pub fn into_split(self) -> (ConnectionReader, ConnectionWriter) {
        (self.reader, self.writer)
    }

    /// Close both directions
    pub async fn close(self) -> io::Result<()> {
        let (reader, mut writer) = self.into_split();
        drop(reader);
        writer.close_write().await
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("write_closed", &self.writer.write_closed)
            .finish()
    }
}

/// Output side of a connection
pub struct ConnectionReader {
    inner: BoxedReader,
}

impl AsyncRead for ConnectionReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

/// Input side of a connection
pub struct ConnectionWriter {
    inner: BoxedWriter,
    write_closed: bool,
}

impl ConnectionWriter {
    /// Write and flush a chunk of input
    pub async fn send(&mut self, data: &[u8]) -> io::Result<()> {
        if self.write_closed {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "write side already closed",
            ));
        }
        self.inner.write_all(data).await?;
        self.inner.flush().await
    }

    /// Half-close: signal end of input while the read side stays open
    ///
    /// Only the first call reaches the underlying stream.
    pub async fn close_write(&mut self) -> io::Result<()> {
        if self.write_closed {
            return Ok(());
        }
        self.write_closed = true;
        self.inner.shutdown().await
    }

    /// Whether the write side has been half-closed
    pub fn is_write_closed(&self) -> bool {
        self.write_closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_half_close_keeps_reads_open() {
        let (local, remote) = tokio::io::duplex(64);
        let (mut reader, mut writer) = Connection::from_stream(local).into_split();
        let (mut remote_read, mut remote_write) = tokio::io::split(remote);

        writer.send(b"ping").await.unwrap();
        writer.close_write().await.unwrap();

        let mut received = Vec::new();
        remote_read.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"ping");

        remote_write.write_all(b"pong").await.unwrap();
        drop(remote_write);
        drop(remote_read);

        let mut buf = [0u8; 4];
        reader.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong");
    }

    #[tokio::test]
    async fn test_close_write_is_idempotent() {
        let (local, _remote) = tokio::io::duplex(64);
        let (_reader, mut writer) = Connection::from_stream(local).into_split();

        writer.close_write().await.unwrap();
        writer.close_write().await.unwrap();
        assert!(writer.is_write_closed());

        let err = writer.send(b"late").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
