// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

/// Typed failures surfaced by the launcher.
#[derive(Debug, thiserror::Error)]
pub enum LauncherError {
    /// Configuration failed schema or cross-field validation.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// The PID-file names a live launcher.
    #[error("launcher already running (pid {pid})")]
    AlreadyRunning { pid: u32 },

    /// PID-file I/O failed.
    #[error("pid file {path}: {reason}")]
    PidFile { path: PathBuf, reason: String },

    /// The OS refused to spawn a child.
    #[error("failed to spawn {id}: {reason}")]
    SpawnFailed { id: String, reason: String },

    /// Signal delivery failed for a reason other than the target being
    /// gone (a gone target is success — the process is already down).
    #[error("signal delivery to pid {pid} failed: {errno}")]
    SignalFailure { pid: u32, errno: nix::Error },
}

pub type Result<T> = std::result::Result<T, LauncherError>;
