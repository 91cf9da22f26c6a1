// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-local telemetry client embedded by each agent.
//!
//! One client per hosting process, constructed once at startup and
//! passed explicitly — never a global, so tests can run independent
//! clients against separate store paths. Registration starts a
//! detached background heartbeat ticker; the ticker holds no runtime
//! guarantee and does not keep the process alive.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::{Result, TelemetryError};
use crate::schema::{epoch_ms, AgentRow, AgentStatus, LogLevel};
use crate::store::Store;

/// Recognized client options.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Path of the shared store file.
    pub db_path: PathBuf,
    /// Interval between automatic heartbeats.
    pub heartbeat_interval: Duration,
    /// Per-agent whisper log cap.
    pub max_log_entries: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(".asf/swarm_state.db"),
            heartbeat_interval: Duration::from_millis(5000),
            max_log_entries: 1000,
        }
    }
}

/// Live registration state: the agent row id plus the ticker guard.
struct Registration {
    agent_id: String,
    ticker: CancellationToken,
}

/// Telemetry client for one agent process.
///
/// Every operation is a structured-error write to the store; nothing
/// is ever printed. Failures during shutdown are swallowed.
pub struct TelemetryClient {
    store: Arc<Mutex<Store>>,
    config: ClientConfig,
    registration: Mutex<Option<Registration>>,
}

impl std::fmt::Debug for TelemetryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryClient")
            .field("db_path", &self.config.db_path)
            .field("agent_id", &self.agent_id())
            .finish()
    }
}

impl TelemetryClient {
    /// Open the store and build an unregistered client.
    pub fn open(config: ClientConfig) -> Result<Self> {
        let store = Store::open(&config.db_path)?;
        Ok(Self { store: Arc::new(Mutex::new(store)), config, registration: Mutex::new(None) })
    }

    /// Id of the live registration, if any.
    pub fn agent_id(&self) -> Option<String> {
        self.registration.lock().as_ref().map(|r| r.agent_id.clone())
    }

    /// Register this process as an agent and start the heartbeat
    /// ticker. Returns the generated agent id.
    ///
    /// Must be called from within a tokio runtime (the ticker is a
    /// spawned task).
    pub fn register_agent(&self, role: &str, worktree_path: Option<&str>) -> Result<String> {
        let mut registration = self.registration.lock();
        if registration.is_some() {
            return Err(TelemetryError::AlreadyRegistered);
        }

        let now = epoch_ms();
        let agent_id = format!("agent-{}-{now}", std::process::id());
        let row = AgentRow {
            id: agent_id.clone(),
            pid: std::process::id(),
            role: role.to_owned(),
            status: AgentStatus::Idle,
            current_task_id: None,
            last_seen: now,
            worktree_path: worktree_path.map(str::to_owned),
            created_at: now,
            is_active: true,
        };
        self.store.lock().insert_agent(&row)?;

        let ticker = CancellationToken::new();
        tokio::spawn(heartbeat_loop(
            Arc::clone(&self.store),
            agent_id.clone(),
            self.config.heartbeat_interval,
            ticker.clone(),
        ));

        *registration = Some(Registration { agent_id: agent_id.clone(), ticker });
        Ok(agent_id)
    }

    /// Stop the heartbeat ticker and soft-delete the agent row.
    pub fn deregister_agent(&self) -> Result<()> {
        let mut registration = self.registration.lock();
        let Some(reg) = registration.take() else {
            return Err(TelemetryError::NotRegistered);
        };
        reg.ticker.cancel();
        self.store.lock().deactivate_agent(&reg.agent_id)
    }

    /// Set `last_seen = now`. A no-op when not registered so the
    /// background ticker cannot race shutdown into an error.
    pub fn heartbeat(&self) -> Result<()> {
        let Some(agent_id) = self.agent_id() else {
            return Ok(());
        };
        self.store.lock().touch_agent(&agent_id, epoch_ms())
    }

    /// Update this agent's reported status.
    pub fn set_status(&self, status: AgentStatus) -> Result<()> {
        let agent_id = self.agent_id().ok_or(TelemetryError::NotRegistered)?;
        self.store.lock().set_agent_status(&agent_id, status)
    }

    /// Report task progress, creating the task on first report.
    ///
    /// `percent` is clamped to 100; downgrades are permitted and demote
    /// a Complete task back to InProgress. The reported task becomes
    /// this agent's current task.
    pub fn progress(&self, task_id: &str, percent: u8, title: Option<&str>) -> Result<()> {
        let agent_id = self.agent_id().ok_or(TelemetryError::NotRegistered)?;
        self.store.lock().upsert_task_progress(task_id, &agent_id, percent, title, epoch_ms())
    }

    /// Whisper a log line into the store, evicting past the cap.
    pub fn capture(&self, message: &str, level: LogLevel) -> Result<()> {
        let agent_id = self.agent_id().ok_or(TelemetryError::NotRegistered)?;
        self.store.lock().insert_log(
            &agent_id,
            level,
            message,
            epoch_ms(),
            self.config.max_log_entries,
        )
    }

    /// Record a token-count sample.
    pub fn report_tokens(&self, tokens: u64) -> Result<()> {
        let agent_id = self.agent_id().ok_or(TelemetryError::NotRegistered)?;
        self.store.lock().insert_metric(&agent_id, tokens, 0.0, epoch_ms())
    }

    /// Record an estimated-cost sample.
    pub fn report_cost(&self, usd: f64) -> Result<()> {
        let agent_id = self.agent_id().ok_or(TelemetryError::NotRegistered)?;
        self.store.lock().insert_metric(&agent_id, 0, usd, epoch_ms())
    }

    /// Idempotent teardown: stop the ticker and soft-delete the row if
    /// still registered. Errors are swallowed — shutdown paths must
    /// not fail.
    pub fn shutdown(&self) {
        let mut registration = self.registration.lock();
        if let Some(reg) = registration.take() {
            reg.ticker.cancel();
            if let Err(e) = self.store.lock().deactivate_agent(&reg.agent_id) {
                trace!("shutdown deactivate failed: {e}");
            }
        }
    }
}

impl Drop for TelemetryClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Background heartbeat: touch `last_seen` every `interval` until the
/// token is cancelled. Write errors are traced and swallowed — a dying
/// store must not crash the hosting agent.
async fn heartbeat_loop(
    store: Arc<Mutex<Store>>,
    agent_id: String,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut tick = tokio::time::interval(interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // interval fires immediately; the registration write just set
    // last_seen, so skip the first tick.
    tick.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tick.tick() => {}
        }
        if let Err(e) = store.lock().touch_agent(&agent_id, epoch_ms()) {
            trace!("heartbeat write failed: {e}");
        }
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
