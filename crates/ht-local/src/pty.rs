//! Targets running on a pseudo-terminal
//!
//! The terminal merges both output streams, so the attach connection
//! carries raw bytes in both directions. portable-pty handles are blocking;
//! each direction gets a dedicated thread bridged to async through a
//! channel.

use std::io::{self, Read, Write};

use futures::FutureExt;
use ht_core::traits::{AttachOptions, ExitNotification};
use ht_core::EngineError;
use portable_pty::{native_pty_system, CommandBuilder};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tracing::debug;

use crate::engine::{pty_size, request_error, LaunchSpec, Process, Spawned};

const READ_BUFFER_SIZE: usize = 4096;

pub(crate) fn spawn(
    spec: &LaunchSpec,
    stream: Option<DuplexStream>,
    attach: &AttachOptions,
) -> Result<Spawned, EngineError> {
    let pair = native_pty_system()
        .openpty(pty_size(spec.size))
        .map_err(request_error("Failed to open PTY"))?;

    let program = &spec.command[0];
    let mut cmd = CommandBuilder::new(program);
    cmd.args(&spec.command[1..]);
    cmd.env("TERM", "xterm-256color");
    for (key, value) in &spec.env {
        cmd.env(key, value);
    }
    if let Ok(cwd) = std::env::current_dir() {
        cmd.cwd(cwd);
    }

    let mut child = pair
        .slave
        .spawn_command(cmd)
        .map_err(|e| EngineError::Request(format!("{}: {}", program, e)))?;
    // Output only reaches EOF once every slave handle is closed
    drop(pair.slave);

    let pid = child.process_id();
    debug!("Spawned {} on a PTY with PID {:?}", program, pid);

    let reader = pair
        .master
        .try_clone_reader()
        .map_err(request_error("Failed to clone PTY reader"))?;
    let writer = pair
        .master
        .take_writer()
        .map_err(request_error("Failed to take PTY writer"))?;

    let (remote_read, remote_write) = match stream {
        Some(stream) => {
            let (read, write) = tokio::io::split(stream);
            (Some(read), Some(write))
        }
        None => (None, None),
    };

    let output = if attach.stdout || attach.stderr {
        remote_write
    } else {
        None
    };
    pump_output(reader, output);

    match remote_read {
        Some(remote) if attach.stdin => pump_input(remote, writer),
        _ => drop(writer),
    }

    let exited = async move {
        match tokio::task::spawn_blocking(move || child.wait()).await {
            Ok(Ok(status)) => ExitNotification::status(i64::from(status.exit_code())),
            Ok(Err(e)) => ExitNotification {
                status_code: 1,
                error: Some(format!("failed to wait for process: {}", e)),
            },
            Err(e) => ExitNotification {
                status_code: 1,
                error: Some(format!("wait task failed: {}", e)),
            },
        }
    }
    .boxed();

    Ok(Spawned {
        process: Process {
            pid,
            master: Some(pair.master),
        },
        exited,
    })
}

/// Copy terminal output to the connection, or drain it when unattached
fn pump_output(mut reader: Box<dyn Read + Send>, mut sink: Option<WriteHalf<DuplexStream>>) {
    let (tx, mut rx) = mpsc::channel::<Vec<u8>>(64);

    std::thread::spawn(move || {
        let mut buf = [0u8; READ_BUFFER_SIZE];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.blocking_send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                // EIO once the child side is gone
                Err(e) => {
                    debug!("PTY output ended: {}", e);
                    break;
                }
            }
        }
    });

    tokio::spawn(async move {
        while let Some(chunk) = rx.recv().await {
            if let Some(out) = sink.as_mut() {
                if let Err(e) = out.write_all(&chunk).await {
                    debug!("Attach connection closed: {}", e);
                    sink = None;
                }
            }
        }
        if let Some(mut out) = sink {
            let _ = out.shutdown().await;
        }
    });
}

/// Copy connection input into the terminal
fn pump_input(mut remote: ReadHalf<DuplexStream>, mut writer: Box<dyn Write + Send>) {
    let (tx, rx) = std::sync::mpsc::channel::<Vec<u8>>();

    std::thread::spawn(move || {
        while let Ok(chunk) = rx.recv() {
            if let Err(e) = writer.write_all(&chunk).and_then(|_| writer.flush()) {
                debug!("PTY input closed: {}", e);
                break;
            }
        }
    });

    tokio::spawn(async move {
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        loop {
            match remote.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if tx.send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
            }
        }
    });
}
