// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Polling driver: the read-derive-diff-emit tick loop.
//!
//! One tick reads agents, tasks, and metrics (plus the selected
//! agent's logs) through the adapter, composes a candidate state, and
//! applies it. The patch lands unconditionally so `last_poll_time`
//! stays fresh; an `update` event fires only when the diff says a
//! render is due. Read errors become `error` events and never stop the
//! schedule.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use asf_telemetry::schema::epoch_ms;

use crate::adapter::{StoreAdapter, DEFAULT_LOG_LIMIT};
use crate::config::clamp_poll_interval;
use crate::state::{StatePatch, StateStore};

/// Events emitted by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A tick produced a visible change.
    Update,
    /// A tick failed to read the store. The schedule continues.
    Error(String),
}

/// Timer-driven poll loop over the store adapter.
pub struct PollingDriver {
    adapter: Arc<StoreAdapter>,
    state: Arc<StateStore>,
    interval_ms: Arc<AtomicU64>,
    event_tx: broadcast::Sender<EngineEvent>,
    cancel: Mutex<Option<CancellationToken>>,
}

impl std::fmt::Debug for PollingDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingDriver")
            .field("interval_ms", &self.interval_ms.load(Ordering::Relaxed))
            .field("running", &self.is_running())
            .finish()
    }
}

impl PollingDriver {
    /// Build a stopped driver. `interval_ms` is clamped into range.
    pub fn new(adapter: Arc<StoreAdapter>, state: Arc<StateStore>, interval_ms: u64) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            adapter,
            state,
            interval_ms: Arc::new(AtomicU64::new(clamp_poll_interval(interval_ms))),
            event_tx,
            cancel: Mutex::new(None),
        }
    }

    /// Subscribe to `update` / `error` events.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.event_tx.subscribe()
    }

    /// Whether the tick loop is scheduled.
    pub fn is_running(&self) -> bool {
        self.cancel.lock().is_some()
    }

    /// Current interval in milliseconds.
    pub fn interval_ms(&self) -> u64 {
        self.interval_ms.load(Ordering::Relaxed)
    }

    /// Replace the tick interval in place (clamped). Takes effect from
    /// the next scheduled sleep.
    pub fn set_interval(&self, ms: u64) -> u64 {
        let clamped = clamp_poll_interval(ms);
        self.interval_ms.store(clamped, Ordering::Relaxed);
        clamped
    }

    /// Start polling: an immediate tick, then one per interval.
    /// Starting a running driver is a no-op.
    pub fn start(&self) {
        let mut cancel = self.cancel.lock();
        if cancel.is_some() {
            return;
        }
        let token = CancellationToken::new();
        *cancel = Some(token.clone());

        let adapter = Arc::clone(&self.adapter);
        let state = Arc::clone(&self.state);
        let interval_ms = Arc::clone(&self.interval_ms);
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            tick(&adapter, &state, &event_tx);
            loop {
                let sleep_for = Duration::from_millis(interval_ms.load(Ordering::Relaxed));
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(sleep_for) => {}
                }
                tick(&adapter, &state, &event_tx);
            }
            debug!("poll loop stopped");
        });
    }

    /// Stop the schedule. Idempotent; an in-flight tick finishes and
    /// its event may still fire — consumers treat late events as
    /// benign.
    pub fn stop(&self) {
        if let Some(token) = self.cancel.lock().take() {
            token.cancel();
        }
    }

    /// Execute one tick on demand, running or not.
    pub fn force_poll(&self) {
        tick(&self.adapter, &self.state, &self.event_tx);
    }
}

impl Drop for PollingDriver {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One read-derive-diff-emit cycle.
fn tick(adapter: &StoreAdapter, state: &StateStore, event_tx: &broadcast::Sender<EngineEvent>) {
    match compose(adapter, state) {
        Ok(patch) => {
            if state.set_state(patch) {
                let _ = event_tx.send(EngineEvent::Update);
            }
        }
        Err(e) => {
            let _ = event_tx.send(EngineEvent::Error(e.to_string()));
        }
    }
}

/// Compose one logical snapshot. The reads are independent; skew is
/// bounded by a single tick.
fn compose(
    adapter: &StoreAdapter,
    state: &StateStore,
) -> asf_telemetry::error::Result<StatePatch> {
    let agents = adapter.agents()?;
    let tasks = adapter.tasks()?;
    let metrics = adapter.aggregated_metrics()?;

    // Selection observed before this tick decides whose logs we fetch.
    // With no selection the logs map drains once and then stays out of
    // the patch, so an idle dashboard diffs clean between ticks.
    let logs = match state.selected_agent_id() {
        Some(id) => {
            let mut map = HashMap::new();
            map.insert(id.clone(), adapter.logs_for_agent(&id, DEFAULT_LOG_LIMIT)?);
            Some(map)
        }
        None if !state.get_state().logs.is_empty() => Some(HashMap::new()),
        None => None,
    };

    Ok(StatePatch {
        agents: Some(agents),
        tasks: Some(tasks),
        logs,
        metrics: Some(metrics),
        last_poll_time: Some(epoch_ms()),
    })
}

#[cfg(test)]
#[path = "poller_tests.rs"]
mod tests;
