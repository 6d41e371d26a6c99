//! Targets running with piped standard streams
//!
//! Output and error are multiplexed onto the attach connection as frames so
//! the client can tell them apart; input is copied through unframed.

use std::process::{ExitStatus, Stdio};

use futures::{FutureExt, SinkExt};
use ht_core::traits::{AttachOptions, ExitNotification};
use ht_core::EngineError;
use ht_protocol::{StreamFrame, StreamFrameCodec, StreamType};
use tokio::io::{AsyncRead, AsyncReadExt, DuplexStream, WriteHalf};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::codec::FramedWrite;
use tracing::debug;

use crate::engine::{LaunchSpec, Process, Spawned};

const READ_BUFFER_SIZE: usize = 8192;

pub(crate) fn spawn(
    spec: &LaunchSpec,
    stream: Option<DuplexStream>,
    attach: &AttachOptions,
) -> Result<Spawned, EngineError> {
    let (remote_read, remote_write) = match stream {
        Some(stream) => {
            let (read, write) = tokio::io::split(stream);
            (Some(read), Some(write))
        }
        None => (None, None),
    };
    let wants_stdin = attach.stdin && remote_read.is_some();

    let program = &spec.command[0];
    let mut child = Command::new(program)
        .args(&spec.command[1..])
        .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(if wants_stdin {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| EngineError::Request(format!("{}: {}", program, e)))?;

    let pid = child.id();
    debug!("Spawned {} with PID {:?}", program, pid);

    let (tx, rx) = mpsc::channel::<StreamFrame>(64);
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(forward_stream(stdout, StreamType::Stdout, attach.stdout, tx.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(forward_stream(stderr, StreamType::Stderr, attach.stderr, tx.clone()));
    }
    drop(tx);
    tokio::spawn(write_frames(rx, remote_write));

    if let (Some(mut stdin), Some(mut remote)) = (child.stdin.take(), remote_read) {
        tokio::spawn(async move {
            if let Err(e) = tokio::io::copy(&mut remote, &mut stdin).await {
                debug!("Input copy ended: {}", e);
            }
            // Dropping stdin delivers EOF to the process
        });
    }

    let exited = async move {
        match child.wait().await {
            Ok(status) => ExitNotification::status(exit_code(status)),
            Err(e) => ExitNotification {
                status_code: 1,
                error: Some(format!("failed to wait for process: {}", e)),
            },
        }
    }
    .boxed();

    Ok(Spawned {
        process: Process { pid, master: None },
        exited,
    })
}

async fn forward_stream<R>(
    mut reader: R,
    stream: StreamType,
    attached: bool,
    tx: mpsc::Sender<StreamFrame>,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                debug!("Error reading {:?}: {}", stream, e);
                break;
            }
        };
        // Unattached streams are still drained so the process never blocks
        if attached
            && tx
                .send(StreamFrame::new(stream, buf[..n].to_vec()))
                .await
                .is_err()
        {
            break;
        }
    }
}

async fn write_frames(
    mut rx: mpsc::Receiver<StreamFrame>,
    remote: Option<WriteHalf<DuplexStream>>,
) {
    let mut framed = remote.map(|remote| FramedWrite::new(remote, StreamFrameCodec::new()));

    // Keep receiving after the connection is gone so the process never
    // blocks on a full pipe
    while let Some(frame) = rx.recv().await {
        let Some(writer) = framed.as_mut() else {
            continue;
        };
        if let Err(e) = writer.send(frame).await {
            debug!("Attach connection closed: {}", e);
            framed = None;
        }
    }

    if let Some(mut framed) = framed {
        let _ = framed.close().await;
    }
}

fn exit_code(status: ExitStatus) -> i64 {
    if let Some(code) = status.code() {
        return i64::from(code);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + i64::from(signal);
        }
    }
    1
}
