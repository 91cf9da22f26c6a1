// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-terminal single-instance lock.
//!
//! A JSON PID-file names the live launcher and its pool snapshot.
//! Liveness is decided by a zero-signal existence probe; a dead
//! `launcherPid` means the file is stale and may be deleted.

use std::path::{Path, PathBuf};

use nix::sys::signal;
use nix::unistd::Pid;
use serde::{Deserialize, Serialize};

use crate::error::{LauncherError, Result};
use crate::pool::ManagedProcess;

/// Checks whether a process with the given PID is alive.
pub fn is_process_alive(pid: u32) -> bool {
    let Ok(pid_i32) = i32::try_from(pid) else {
        return false;
    };
    signal::kill(Pid::from_raw(pid_i32), None).is_ok()
}

/// The PID-file payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PidFilePayload {
    pub launcher_pid: u32,
    pub started_at: u64,
    pub processes: Vec<ManagedProcess>,
}

/// Handle on the PID-file at a fixed path.
#[derive(Debug, Clone)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read and parse the file. `None` when absent; an unparsable file
    /// is reported, not silently dropped.
    pub fn read(&self) -> Result<Option<PidFilePayload>> {
        let text = match std::fs::read_to_string(&self.path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(LauncherError::PidFile {
                    path: self.path.clone(),
                    reason: e.to_string(),
                })
            }
            Ok(text) => text,
        };
        let payload = serde_json::from_str(&text).map_err(|e| LauncherError::PidFile {
            path: self.path.clone(),
            reason: format!("malformed: {e}"),
        })?;
        Ok(Some(payload))
    }

    /// Resolve the single-instance lock: fail if the recorded launcher
    /// is alive, delete the file when stale.
    pub fn acquire(&self) -> Result<()> {
        if let Some(payload) = self.read()? {
            if is_process_alive(payload.launcher_pid) {
                return Err(LauncherError::AlreadyRunning { pid: payload.launcher_pid });
            }
            self.remove()?;
        }
        Ok(())
    }

    /// Write (or rewrite) the payload, creating the directory on
    /// demand.
    pub fn write(&self, payload: &PidFilePayload) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| LauncherError::PidFile {
                    path: self.path.clone(),
                    reason: e.to_string(),
                })?;
            }
        }
        let text = serde_json::to_string_pretty(payload).map_err(|e| LauncherError::PidFile {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        std::fs::write(&self.path, text).map_err(|e| LauncherError::PidFile {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    /// Delete the file. Absence is fine.
    pub fn remove(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                Err(LauncherError::PidFile { path: self.path.clone(), reason: e.to_string() })
            }
        }
    }
}

#[cfg(test)]
#[path = "pidfile_tests.rs"]
mod tests;
