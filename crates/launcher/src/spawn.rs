// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Child process plumbing: spawn, stream capture, exit watching, and
//! tree signalling.
//!
//! Children are placed in their own process group so one signal to
//! `-pid` reaches the whole child tree, grandchildren included.
//! Captured stdout/stderr goes to tracing at debug level — children
//! are expected to whisper through the store, not talk on their pipes.

use std::process::Stdio;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::error::{LauncherError, Result};
use crate::pool::ProcessKind;

/// Everything needed to start one child.
#[derive(Debug, Clone)]
pub struct ChildSpec {
    pub id: String,
    pub kind: ProcessKind,
    pub command: Vec<String>,
    pub env: Vec<(String, String)>,
    pub role: Option<String>,
    pub worktree: Option<String>,
}

/// Lifecycle notifications from the exit watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildEvent {
    Exited { id: String, code: Option<i32>, signal: Option<i32> },
}

/// Spawn a child in its own process group and watch it. Returns the
/// OS pid; the exit lands on `events` exactly once.
pub fn spawn_child(spec: &ChildSpec, events: mpsc::Sender<ChildEvent>) -> Result<u32> {
    let Some((program, args)) = spec.command.split_first() else {
        return Err(LauncherError::SpawnFailed {
            id: spec.id.clone(),
            reason: "empty command".to_owned(),
        });
    };

    let mut command = tokio::process::Command::new(program);
    command
        .args(args)
        .envs(spec.env.iter().cloned())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    command.process_group(0);

    let mut child = command.spawn().map_err(|e| LauncherError::SpawnFailed {
        id: spec.id.clone(),
        reason: e.to_string(),
    })?;
    let Some(pid) = child.id() else {
        return Err(LauncherError::SpawnFailed {
            id: spec.id.clone(),
            reason: "child exited before pid could be read".to_owned(),
        });
    };

    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(drain_stream(spec.id.clone(), "stdout", stdout));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(drain_stream(spec.id.clone(), "stderr", stderr));
    }

    let id = spec.id.clone();
    tokio::spawn(async move {
        let (code, signal) = match child.wait().await {
            Ok(status) => (status.code(), exit_signal(&status)),
            Err(e) => {
                debug!("wait for {id} failed: {e}");
                (None, None)
            }
        };
        let _ = events.send(ChildEvent::Exited { id, code, signal }).await;
    });

    Ok(pid)
}

/// Forward a captured byte stream into tracing, line by line.
async fn drain_stream(
    id: String,
    stream: &'static str,
    source: impl tokio::io::AsyncRead + Unpin,
) {
    let mut lines = BufReader::new(source).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        trace!(target: "asf::child", "{id} {stream}: {line}");
    }
}

#[cfg(unix)]
fn exit_signal(status: &std::process::ExitStatus) -> Option<i32> {
    std::os::unix::process::ExitStatusExt::signal(status)
}

#[cfg(not(unix))]
fn exit_signal(_status: &std::process::ExitStatus) -> Option<i32> {
    None
}

/// Signal an entire child process tree via its process group. A gone
/// target is success — the tree is already down.
pub fn signal_tree(pid: u32, signal: Signal) -> Result<()> {
    let Ok(pid_i32) = i32::try_from(pid) else {
        return Ok(());
    };
    match kill(Pid::from_raw(-pid_i32), signal) {
        Ok(()) => Ok(()),
        Err(nix::errno::Errno::ESRCH) => {
            // Group already gone; try the bare pid in case the child
            // never made it into its own group.
            match kill(Pid::from_raw(pid_i32), signal) {
                Ok(()) | Err(nix::errno::Errno::ESRCH) => Ok(()),
                Err(errno) => Err(LauncherError::SignalFailure { pid, errno }),
            }
        }
        Err(errno) => Err(LauncherError::SignalFailure { pid, errno }),
    }
}

#[cfg(test)]
#[path = "spawn_tests.rs"]
mod tests;
