// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read side of the telemetry store.
//!
//! The adapter never writes. It derives the view-only agent status
//! (Dead is computed from heartbeat age, never stored) and inherits
//! task progress onto each agent. Individual reads are snapshot-
//! consistent; the polling driver composes them into one logical tick.

use std::collections::HashMap;
use std::path::Path;

use parking_lot::Mutex;

use asf_telemetry::error::Result;
use asf_telemetry::schema::{
    epoch_ms, AgentRow, AgentStatus, AggregatedMetrics, LogRow, TaskRow,
};
use asf_telemetry::store::Store;

/// Default log fetch depth for the whisper panel.
pub const DEFAULT_LOG_LIMIT: usize = 100;

/// View-only agent status: the stored status plus the derived `Dead`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivedStatus {
    Idle,
    Busy,
    Error,
    Dead,
}

impl DerivedStatus {
    /// Wire-ish label, upper-cased to the fixed card width elsewhere.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Busy => "busy",
            Self::Error => "error",
            Self::Dead => "dead",
        }
    }
}

impl From<AgentStatus> for DerivedStatus {
    fn from(status: AgentStatus) -> Self {
        match status {
            AgentStatus::Idle => Self::Idle,
            AgentStatus::Busy => Self::Busy,
            AgentStatus::Error => Self::Error,
        }
    }
}

/// An agent row extended with derived view fields.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedAgent {
    pub agent: AgentRow,
    pub status: DerivedStatus,
    /// Progress of the agent's current task, 0 when none.
    pub progress: u8,
}

impl DerivedAgent {
    pub fn id(&self) -> &str {
        &self.agent.id
    }
}

/// Derive the view status for one agent at time `now`.
pub fn derive_status(agent: &AgentRow, now: u64, dead_after_ms: u64) -> DerivedStatus {
    if now.saturating_sub(agent.last_seen) > dead_after_ms {
        DerivedStatus::Dead
    } else {
        agent.status.into()
    }
}

/// Read-only adapter over the shared store.
///
/// The SQLite handle is single-threaded; the mutex lets the poll task
/// and on-demand reads share it. No lock is held across an await.
pub struct StoreAdapter {
    store: Mutex<Store>,
    dead_after_ms: u64,
}

impl std::fmt::Debug for StoreAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreAdapter").field("dead_after_ms", &self.dead_after_ms).finish()
    }
}

impl StoreAdapter {
    /// Open the store read side. An unreachable store is fatal here —
    /// the dashboard refuses to start without its data source.
    pub fn open(path: impl AsRef<Path>, dead_after_ms: u64) -> Result<Self> {
        let store = Store::open(path)?;
        Ok(Self { store: Mutex::new(store), dead_after_ms })
    }

    /// Active agents in stable fleet order with derived status and
    /// inherited task progress.
    pub fn agents(&self) -> Result<Vec<DerivedAgent>> {
        let store = self.store.lock();
        let now = epoch_ms();
        let tasks: HashMap<String, u8> =
            store.tasks()?.into_iter().map(|t| (t.id, t.progress_percent)).collect();

        let derived = store
            .agents()?
            .into_iter()
            .map(|agent| {
                let status = derive_status(&agent, now, self.dead_after_ms);
                let progress = agent
                    .current_task_id
                    .as_deref()
                    .and_then(|id| tasks.get(id).copied())
                    .unwrap_or(0);
                DerivedAgent { agent, status, progress }
            })
            .collect();
        Ok(derived)
    }

    /// All tasks, as stored.
    pub fn tasks(&self) -> Result<Vec<TaskRow>> {
        self.store.lock().tasks()
    }

    /// Newest-first whisper log entries for one agent.
    pub fn logs_for_agent(&self, agent_id: &str, limit: usize) -> Result<Vec<LogRow>> {
        self.store.lock().logs_for_agent(agent_id, limit)
    }

    /// Fleet totals summed across all stored samples.
    pub fn aggregated_metrics(&self) -> Result<AggregatedMetrics> {
        self.store.lock().aggregated_metrics(epoch_ms(), self.dead_after_ms)
    }
}

#[cfg(test)]
#[path = "adapter_tests.rs"]
mod tests;
