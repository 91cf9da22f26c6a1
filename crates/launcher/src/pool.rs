// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Insertion-ordered registry of managed child processes.
//!
//! Shutdown iterates the pool in insertion order, so the container
//! must preserve it — `IndexMap` keyed by logical id.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// What kind of child a pool entry is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessKind {
    Dashboard,
    Agent,
}

impl ProcessKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dashboard => "dashboard",
            Self::Agent => "agent",
        }
    }
}

/// Lifecycle state of a managed child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessStatus {
    Starting,
    Running,
    Stopping,
    Stopped,
    Crashed,
}

impl ProcessStatus {
    /// Terminal states count as stopped for shutdown purposes.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Crashed)
    }
}

/// One tracked child process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedProcess {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ProcessKind,
    pub pid: u32,
    pub status: ProcessStatus,
    pub started_at: u64,
    pub restart_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worktree: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

/// The process registry. Not synchronized — the supervisor serializes
/// access on its own task (or behind its own lock).
#[derive(Debug, Default)]
pub struct ProcessPool {
    processes: IndexMap<String, ManagedProcess>,
}

impl ProcessPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a process. A re-used id replaces the old entry in
    /// place, keeping its original position (restart path).
    pub fn add(&mut self, process: ManagedProcess) {
        self.processes.insert(process.id.clone(), process);
    }

    /// Remove by id, preserving the order of the remaining entries.
    pub fn remove(&mut self, id: &str) -> Option<ManagedProcess> {
        self.processes.shift_remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&ManagedProcess> {
        self.processes.get(id)
    }

    pub fn get_by_pid(&self, pid: u32) -> Option<&ManagedProcess> {
        self.processes.values().find(|p| p.pid == pid)
    }

    pub fn get_by_type(&self, kind: ProcessKind) -> Vec<&ManagedProcess> {
        self.processes.values().filter(|p| p.kind == kind).collect()
    }

    /// Update status (and exit code when provided). Returns false for
    /// an unknown id.
    pub fn update_status(
        &mut self,
        id: &str,
        status: ProcessStatus,
        exit_code: Option<i32>,
    ) -> bool {
        let Some(process) = self.processes.get_mut(id) else {
            return false;
        };
        process.status = status;
        if exit_code.is_some() {
            process.exit_code = exit_code;
        }
        true
    }

    /// Record the new pid after a restart.
    pub fn update_pid(&mut self, id: &str, pid: u32, started_at: u64) -> bool {
        let Some(process) = self.processes.get_mut(id) else {
            return false;
        };
        process.pid = pid;
        process.started_at = started_at;
        true
    }

    /// Bump and return the restart count.
    pub fn increment_restart_count(&mut self, id: &str) -> Option<u32> {
        let process = self.processes.get_mut(id)?;
        process.restart_count += 1;
        Some(process.restart_count)
    }

    /// True when the pool is empty or every process is Stopped/Crashed.
    pub fn all_stopped(&self) -> bool {
        self.processes.values().all(|p| p.status.is_terminal())
    }

    /// Insertion-ordered iteration.
    pub fn iter(&self) -> impl Iterator<Item = &ManagedProcess> {
        self.processes.values()
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    /// Snapshot for the PID-file.
    pub fn snapshot(&self) -> Vec<ManagedProcess> {
        self.processes.values().cloned().collect()
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
