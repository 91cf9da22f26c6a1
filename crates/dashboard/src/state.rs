// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory dashboard state with field-targeted change detection.
//!
//! The store holds exactly one [`DashboardState`]. Each poll composes
//! a [`StatePatch`]; the diff is shallow and compares only the fields
//! a re-render cares about, so a tick with no visible change costs no
//! redraw. Logs are treated as always-changed — deep-comparing log
//! vectors every tick would cost more than the redraw it avoids.

use std::collections::HashMap;

use parking_lot::RwLock;
use tokio::sync::broadcast;

use asf_telemetry::schema::{AggregatedMetrics, LogRow, TaskRow};

use crate::adapter::DerivedAgent;

/// What changed, carried on the `change` broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Polled data changed.
    Data,
    /// The selected agent changed.
    Selection,
}

/// The single source of truth for the renderer.
#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    pub agents: Vec<DerivedAgent>,
    pub tasks: Vec<TaskRow>,
    /// Logs for the selected agent only; empty when nothing is selected.
    pub logs: HashMap<String, Vec<LogRow>>,
    pub metrics: AggregatedMetrics,
    pub selected_agent_id: Option<String>,
    pub last_poll_time: u64,
}

/// A partial update produced by one poll tick.
#[derive(Debug, Clone, Default)]
pub struct StatePatch {
    pub agents: Option<Vec<DerivedAgent>>,
    pub tasks: Option<Vec<TaskRow>>,
    pub logs: Option<HashMap<String, Vec<LogRow>>>,
    pub metrics: Option<AggregatedMetrics>,
    pub last_poll_time: Option<u64>,
}

/// Shared state store with change broadcast.
pub struct StateStore {
    state: RwLock<DashboardState>,
    change_tx: broadcast::Sender<ChangeKind>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    pub fn new() -> Self {
        let (change_tx, _) = broadcast::channel(64);
        Self { state: RwLock::new(DashboardState::default()), change_tx }
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeKind> {
        self.change_tx.subscribe()
    }

    /// Clone the current state.
    pub fn get_state(&self) -> DashboardState {
        self.state.read().clone()
    }

    /// Would applying `patch` change anything a render cares about?
    ///
    /// `last_poll_time` never counts; a logs refresh always counts.
    pub fn has_changed(&self, patch: &StatePatch) -> bool {
        let state = self.state.read();

        if let Some(ref agents) = patch.agents {
            if agents.len() != state.agents.len() {
                return true;
            }
            let differs = agents.iter().zip(&state.agents).any(|(new, old)| {
                new.agent.id != old.agent.id
                    || new.status != old.status
                    || new.progress != old.progress
                    || new.agent.last_seen != old.agent.last_seen
            });
            if differs {
                return true;
            }
        }

        if let Some(ref tasks) = patch.tasks {
            if tasks.len() != state.tasks.len() {
                return true;
            }
            let differs = tasks.iter().zip(&state.tasks).any(|(new, old)| {
                new.id != old.id
                    || new.status != old.status
                    || new.progress_percent != old.progress_percent
            });
            if differs {
                return true;
            }
        }

        if let Some(ref metrics) = patch.metrics {
            let old = &state.metrics;
            if metrics.total_tokens != old.total_tokens
                || metrics.total_cost != old.total_cost
                || metrics.active_agents != old.active_agents
                || metrics.total_agents != old.total_agents
            {
                return true;
            }
        }

        patch.logs.is_some()
    }

    /// Apply a patch. Returns whether it counted as a change (and
    /// broadcast one). The patch is applied even when unchanged so
    /// `last_poll_time` stays current.
    pub fn set_state(&self, patch: StatePatch) -> bool {
        let changed = self.has_changed(&patch);
        {
            let mut state = self.state.write();
            if let Some(agents) = patch.agents {
                state.agents = agents;
            }
            if let Some(tasks) = patch.tasks {
                state.tasks = tasks;
            }
            if let Some(logs) = patch.logs {
                state.logs = logs;
            }
            if let Some(metrics) = patch.metrics {
                state.metrics = metrics;
            }
            if let Some(t) = patch.last_poll_time {
                state.last_poll_time = t;
            }
        }
        if changed {
            let _ = self.change_tx.send(ChangeKind::Data);
        }
        changed
    }

    /// Select an agent (or clear with `None`). Reselecting the current
    /// id is a no-op and emits nothing.
    pub fn select_agent(&self, agent_id: Option<String>) {
        {
            let mut state = self.state.write();
            if state.selected_agent_id == agent_id {
                return;
            }
            state.selected_agent_id = agent_id;
        }
        let _ = self.change_tx.send(ChangeKind::Selection);
    }

    /// Clear the selection.
    pub fn clear_selection(&self) {
        self.select_agent(None);
    }

    /// Id of the selected agent, if any.
    pub fn selected_agent_id(&self) -> Option<String> {
        self.state.read().selected_agent_id.clone()
    }

    /// The selected agent's derived row, if it is still in the fleet.
    pub fn get_selected_agent(&self) -> Option<DerivedAgent> {
        let state = self.state.read();
        let id = state.selected_agent_id.as_deref()?;
        state.agents.iter().find(|a| a.agent.id == id).cloned()
    }

    /// Drop back to the empty state.
    pub fn reset(&self) {
        *self.state.write() = DashboardState::default();
        let _ = self.change_tx.send(ChangeKind::Data);
    }
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("StateStore")
            .field("agents", &state.agents.len())
            .field("tasks", &state.tasks.len())
            .field("selected", &state.selected_agent_id)
            .finish()
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
