// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor: owns the child tree and the single-instance lock.
//!
//! Start brings up the dashboard first (agents may whisper before the
//! dashboard reads, but the operator wants the screen early), then the
//! agents with a fixed stagger. Stop is graceful-then-forceful:
//! SIGTERM the trees, poll the pool through the grace window, SIGKILL
//! the survivors.

use std::sync::Arc;
use std::time::Duration;

use nix::sys::signal::Signal;
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use asf_telemetry::schema::epoch_ms;

use crate::config::LauncherConfig;
use crate::error::{LauncherError, Result};
use crate::pidfile::{PidFile, PidFilePayload};
use crate::pool::{ManagedProcess, ProcessKind, ProcessPool, ProcessStatus};
use crate::spawn::{signal_tree, spawn_child, ChildEvent, ChildSpec};

/// Default PID-file location.
pub const DEFAULT_PIDFILE: &str = ".asf/launcher.pid";

/// Lifecycle events broadcast to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LauncherEvent {
    ProcessStart { id: String, pid: u32 },
    Ready,
    ProcessStop { id: String, code: Option<i32> },
    ProcessCrash { id: String, code: Option<i32>, will_restart: bool },
    Shutdown,
}

/// Supervisor lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LauncherState {
    Idle,
    Starting,
    Running,
    Stopping,
    Stopped,
}

/// Sequencing delays. Tests compress these; production keeps the
/// defaults.
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    /// Wait after the dashboard spawn before agents come up.
    pub readiness_delay: Duration,
    /// Gap between consecutive agent spawns.
    pub stagger: Duration,
    /// Pool poll cadence during the grace window.
    pub stop_poll: Duration,
    /// Bounded wait for exit events after a force kill.
    pub force_wait: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            readiness_delay: Duration::from_millis(1000),
            stagger: Duration::from_millis(100),
            stop_poll: Duration::from_millis(100),
            force_wait: Duration::from_millis(2000),
        }
    }
}

struct Inner {
    config: LauncherConfig,
    pool: Mutex<ProcessPool>,
    state: Mutex<LauncherState>,
    event_tx: broadcast::Sender<LauncherEvent>,
    child_tx: mpsc::Sender<ChildEvent>,
    pidfile: PidFile,
    timing: Timing,
}

/// The process supervisor.
pub struct Launcher {
    inner: Arc<Inner>,
    child_rx: Mutex<Option<mpsc::Receiver<ChildEvent>>>,
}

impl Launcher {
    pub fn new(config: LauncherConfig) -> Self {
        Self::with_pidfile(config, PidFile::new(DEFAULT_PIDFILE))
    }

    pub fn with_pidfile(config: LauncherConfig, pidfile: PidFile) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        let (child_tx, child_rx) = mpsc::channel(256);
        let inner = Arc::new(Inner {
            config,
            pool: Mutex::new(ProcessPool::new()),
            state: Mutex::new(LauncherState::Idle),
            event_tx,
            child_tx,
            pidfile,
            timing: Timing::default(),
        });
        Self { inner, child_rx: Mutex::new(Some(child_rx)) }
    }

    /// Replace the sequencing delays (tests).
    pub fn with_timing(self, timing: Timing) -> Self {
        // Arc is still uniquely held before start().
        match Arc::try_unwrap(self.inner) {
            Ok(mut inner) => {
                inner.timing = timing;
                Self { inner: Arc::new(inner), child_rx: self.child_rx }
            }
            Err(inner) => Self { inner, child_rx: self.child_rx },
        }
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<LauncherEvent> {
        self.inner.event_tx.subscribe()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LauncherState {
        *self.inner.state.lock()
    }

    /// Snapshot of the process pool.
    pub fn pool_snapshot(&self) -> Vec<ManagedProcess> {
        self.inner.pool.lock().snapshot()
    }

    /// Path of the single-instance lock.
    pub fn pidfile(&self) -> &PidFile {
        &self.inner.pidfile
    }

    /// Start sequence: lock, dashboard, staggered agents, PID-file,
    /// `Ready`. Any failure triggers a best-effort forced stop and
    /// propagates.
    pub async fn start(&self) -> Result<()> {
        {
            let mut state = self.inner.state.lock();
            if !matches!(*state, LauncherState::Idle | LauncherState::Stopped) {
                return Err(LauncherError::AlreadyRunning { pid: std::process::id() });
            }
            *state = LauncherState::Starting;
        }

        // Lock first: losing it must not roll back (and delete) the
        // pid file of the launcher that owns it.
        if let Err(e) = self.inner.pidfile.acquire() {
            *self.inner.state.lock() = LauncherState::Stopped;
            return Err(e);
        }

        match self.start_sequence().await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!("start failed, rolling back: {e}");
                let _ = self.stop(true).await;
                Err(e)
            }
        }
    }

    async fn start_sequence(&self) -> Result<()> {
        let inner = &self.inner;

        // The event pump owns the child receiver for the lifetime of
        // this launcher.
        if let Some(rx) = self.child_rx.lock().take() {
            tokio::spawn(pump(Arc::clone(inner), rx));
        }

        if inner.config.dashboard.enabled {
            inner.spawn_managed(inner.dashboard_spec())?;
            tokio::time::sleep(inner.timing.readiness_delay).await;
        }

        for index in 1..=inner.config.agents.count {
            inner.spawn_managed(inner.agent_spec(index))?;
            tokio::time::sleep(inner.timing.stagger).await;
        }

        inner.write_pidfile()?;
        *inner.state.lock() = LauncherState::Running;
        inner.emit(LauncherEvent::Ready);
        info!("launcher ready ({} children)", inner.pool.lock().len());
        Ok(())
    }

    /// Stop sequence: signal agents then dashboard, wait out the grace
    /// window (skipped under `force`), escalate, drop the lock, emit
    /// `Shutdown`. Calling it on a stopped launcher is a no-op.
    pub async fn stop(&self, force: bool) -> Result<()> {
        {
            let mut state = self.inner.state.lock();
            if matches!(*state, LauncherState::Stopped | LauncherState::Idle) {
                return Ok(());
            }
            *state = LauncherState::Stopping;
        }
        let inner = &self.inner;
        let signal = if force { Signal::SIGKILL } else { Signal::SIGTERM };
        let mut signal_err = None;

        // Agents first (concurrently — the signals are non-blocking),
        // dashboard last so the screen outlives its fleet.
        let mut targets: Vec<(String, u32)> = Vec::new();
        {
            let mut pool = inner.pool.lock();
            let agents: Vec<String> = pool
                .iter()
                .filter(|p| p.kind == ProcessKind::Agent && !p.status.is_terminal())
                .map(|p| p.id.clone())
                .collect();
            let dashboards: Vec<String> = pool
                .iter()
                .filter(|p| p.kind == ProcessKind::Dashboard && !p.status.is_terminal())
                .map(|p| p.id.clone())
                .collect();
            for id in agents.into_iter().chain(dashboards) {
                if let Some(p) = pool.get(&id) {
                    targets.push((id.clone(), p.pid));
                }
                pool.update_status(&id, ProcessStatus::Stopping, None);
            }
        }
        for (id, pid) in &targets {
            debug!("sending {signal:?} to {id} (pid {pid})");
            if let Err(e) = signal_tree(*pid, signal) {
                warn!("{e}");
                signal_err.get_or_insert(e);
            }
        }

        if force {
            self.await_all_stopped(inner.timing.force_wait).await;
        } else {
            let waited = self.await_all_stopped(Duration::from_millis(
                inner.config.shutdown.grace_period,
            ))
            .await;
            if !waited {
                warn!("grace period exceeded, escalating to SIGKILL");
                let survivors: Vec<(String, u32)> = inner
                    .pool
                    .lock()
                    .iter()
                    .filter(|p| !p.status.is_terminal())
                    .map(|p| (p.id.clone(), p.pid))
                    .collect();
                for (id, pid) in survivors {
                    debug!("SIGKILL {id} (pid {pid})");
                    if let Err(e) = signal_tree(pid, Signal::SIGKILL) {
                        warn!("{e}");
                        signal_err.get_or_insert(e);
                    }
                }
                self.await_all_stopped(inner.timing.force_wait).await;
            }
        }

        // Anything still untracked gets closed out in the pool so the
        // shutdown invariant (all terminal) holds for observers.
        {
            let mut pool = inner.pool.lock();
            let leftover: Vec<String> = pool
                .iter()
                .filter(|p| !p.status.is_terminal())
                .map(|p| p.id.clone())
                .collect();
            for id in leftover {
                pool.update_status(&id, ProcessStatus::Stopped, None);
            }
        }

        inner.pidfile.remove()?;
        *inner.state.lock() = LauncherState::Stopped;
        inner.emit(LauncherEvent::Shutdown);
        info!("launcher stopped");

        match signal_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Poll the pool until every process is terminal or the deadline
    /// passes. Returns whether everything stopped in time.
    async fn await_all_stopped(&self, window: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + window;
        loop {
            if self.inner.pool.lock().all_stopped() {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(self.inner.timing.stop_poll).await;
        }
    }

    /// Register SIGINT/SIGTERM/SIGHUP handlers. The first signal
    /// starts a graceful stop; a second one during shutdown exits the
    /// process with a non-zero code immediately.
    #[cfg(unix)]
    pub fn install_signal_handlers(self: &Arc<Self>) -> std::io::Result<()> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;
        let mut hangup = signal(SignalKind::hangup())?;
        let launcher = Arc::clone(self);

        tokio::spawn(async move {
            let mut received = 0u32;
            loop {
                tokio::select! {
                    _ = interrupt.recv() => {}
                    _ = terminate.recv() => {}
                    _ = hangup.recv() => {}
                }
                received += 1;
                if received == 1 {
                    info!("shutdown signal received");
                    let launcher = Arc::clone(&launcher);
                    tokio::spawn(async move {
                        let _ = launcher.stop(false).await;
                    });
                } else {
                    warn!("second shutdown signal, exiting now");
                    std::process::exit(1);
                }
            }
        });
        Ok(())
    }
}

impl Inner {
    fn emit(&self, event: LauncherEvent) {
        let _ = self.event_tx.send(event);
    }

    fn dashboard_spec(&self) -> ChildSpec {
        ChildSpec {
            id: "dashboard".to_owned(),
            kind: ProcessKind::Dashboard,
            command: self.config.dashboard.command.clone(),
            env: vec![
                ("ASF_DB_PATH".to_owned(), self.config.dashboard.db_path.display().to_string()),
                ("ASF_POLL_INTERVAL".to_owned(), self.config.dashboard.poll_interval.to_string()),
            ],
            role: None,
            worktree: None,
        }
    }

    fn agent_spec(&self, index: u32) -> ChildSpec {
        let id = format!("agent-{index:02}");
        let worktree = self.config.worktrees.get(index as usize - 1).cloned();
        self.agent_respawn_spec(&id, worktree)
    }

    /// Spec for an agent by id — also the restart path, which must
    /// reproduce the original id/role/env exactly.
    fn agent_respawn_spec(&self, id: &str, worktree: Option<String>) -> ChildSpec {
        ChildSpec {
            id: id.to_owned(),
            kind: ProcessKind::Agent,
            command: self.config.agents.command.clone(),
            env: vec![
                ("ASF_AGENT_ID".to_owned(), id.to_owned()),
                ("ASF_QUIET_MODE".to_owned(), self.config.agents.quiet_mode.to_string()),
                ("ASF_DB_PATH".to_owned(), self.config.dashboard.db_path.display().to_string()),
            ],
            role: Some(self.config.agents.default_role.clone()),
            worktree,
        }
    }

    /// Spawn, register in the pool as Running, emit `ProcessStart`.
    fn spawn_managed(&self, spec: ChildSpec) -> Result<u32> {
        let pid = spawn_child(&spec, self.child_tx.clone())?;
        self.pool.lock().add(ManagedProcess {
            id: spec.id.clone(),
            kind: spec.kind,
            pid,
            status: ProcessStatus::Running,
            started_at: epoch_ms(),
            restart_count: 0,
            worktree: spec.worktree.clone(),
            role: spec.role.clone(),
            exit_code: None,
        });
        self.emit(LauncherEvent::ProcessStart { id: spec.id, pid });
        Ok(pid)
    }

    fn write_pidfile(&self) -> Result<()> {
        let payload = PidFilePayload {
            launcher_pid: std::process::id(),
            started_at: epoch_ms(),
            processes: self.pool.lock().snapshot(),
        };
        self.pidfile.write(&payload)
    }

    /// One child exit: classify as stop or crash, apply the
    /// auto-restart budget for agents.
    async fn handle_exit(self: &Arc<Self>, id: String, code: Option<i32>, exit_signal: Option<i32>) {
        let running = *self.state.lock() == LauncherState::Running;
        let clean = code == Some(0);
        debug!("{id} exited (code={code:?}, signal={exit_signal:?})");

        if !running || clean {
            let mut pool = self.pool.lock();
            if pool.get(&id).is_some_and(|p| p.status.is_terminal()) {
                // Already closed out by the stop path.
                pool.update_status(&id, ProcessStatus::Stopped, code);
                return;
            }
            pool.update_status(&id, ProcessStatus::Stopped, code);
            drop(pool);
            self.emit(LauncherEvent::ProcessStop { id, code });
            return;
        }

        // Crash while running.
        let (is_agent, worktree, restarts) = {
            let mut pool = self.pool.lock();
            pool.update_status(&id, ProcessStatus::Crashed, code);
            let is_agent = pool.get(&id).is_some_and(|p| p.kind == ProcessKind::Agent);
            let worktree = pool.get(&id).and_then(|p| p.worktree.clone());
            let restarts =
                if is_agent { pool.increment_restart_count(&id).unwrap_or(u32::MAX) } else { 0 };
            (is_agent, worktree, restarts)
        };

        // The dashboard is never auto-restarted.
        let will_restart =
            is_agent && self.config.agents.auto_restart && restarts <= self.config.agents.max_restarts;
        self.emit(LauncherEvent::ProcessCrash { id: id.clone(), code, will_restart });

        if !will_restart {
            return;
        }

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(inner.config.agents.restart_delay)).await;
            if *inner.state.lock() != LauncherState::Running {
                return;
            }
            let spec = inner.agent_respawn_spec(&id, worktree);
            match spawn_child(&spec, inner.child_tx.clone()) {
                Ok(pid) => {
                    {
                        let mut pool = inner.pool.lock();
                        pool.update_pid(&id, pid, epoch_ms());
                        pool.update_status(&id, ProcessStatus::Running, None);
                    }
                    inner.emit(LauncherEvent::ProcessStart { id, pid });
                    if let Err(e) = inner.write_pidfile() {
                        warn!("pid file refresh failed: {e}");
                    }
                }
                Err(e) => {
                    warn!("restart of {id} failed: {e}");
                    inner.emit(LauncherEvent::ProcessCrash {
                        id,
                        code: None,
                        will_restart: false,
                    });
                }
            }
        });
    }
}

/// Event pump: drains child exits for the lifetime of the launcher.
async fn pump(inner: Arc<Inner>, mut rx: mpsc::Receiver<ChildEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            ChildEvent::Exited { id, code, signal } => inner.handle_exit(id, code, signal).await,
        }
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
