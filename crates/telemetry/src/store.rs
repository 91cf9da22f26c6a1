// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Embedded SQLite store shared by every agent process and the
//! dashboard.
//!
//! The store runs in WAL mode so 15+ writer processes and a polling
//! reader can overlap without deadlocking. Every statement goes
//! through the prepared-statement cache with bound parameters; no SQL
//! is ever assembled from row data.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use crate::error::{Result, TelemetryError};
use crate::schema::{
    AgentRow, AgentStatus, AggregatedMetrics, LogLevel, LogRow, MetricRow, TaskRow, TaskStatus,
};

/// How long a writer waits on a locked database before giving up.
/// Heartbeats must stay under 50 ms p99; five seconds is the outer
/// bound for pathological contention, not the expected case.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS agents (
    id              TEXT PRIMARY KEY,
    pid             INTEGER NOT NULL,
    role            TEXT NOT NULL,
    status          TEXT NOT NULL,
    current_task_id TEXT,
    last_seen       INTEGER NOT NULL,
    worktree_path   TEXT,
    created_at      INTEGER NOT NULL,
    is_active       INTEGER NOT NULL DEFAULT 1
);
CREATE TABLE IF NOT EXISTS tasks (
    id               TEXT PRIMARY KEY,
    title            TEXT NOT NULL,
    status           TEXT NOT NULL,
    assigned_agent_id TEXT,
    progress_percent INTEGER NOT NULL DEFAULT 0,
    dependencies     TEXT NOT NULL DEFAULT '',
    created_at       INTEGER NOT NULL,
    started_at       INTEGER,
    completed_at     INTEGER
);
CREATE TABLE IF NOT EXISTS logs (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    agent_id  TEXT NOT NULL,
    level     TEXT NOT NULL,
    message   TEXT NOT NULL,
    timestamp INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS metrics (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    agent_id       TEXT NOT NULL,
    tokens_used    INTEGER NOT NULL DEFAULT 0,
    estimated_cost REAL NOT NULL DEFAULT 0,
    timestamp      INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_agents_status    ON agents (status);
CREATE INDEX IF NOT EXISTS idx_agents_last_seen ON agents (last_seen);
CREATE INDEX IF NOT EXISTS idx_tasks_status     ON tasks (status);
CREATE INDEX IF NOT EXISTS idx_logs_agent       ON logs (agent_id);
CREATE INDEX IF NOT EXISTS idx_metrics_agent    ON metrics (agent_id);
";

/// Handle on the embedded swarm database.
///
/// Each process opens its own `Store`; cross-process coordination is
/// entirely SQLite's. The handle itself is single-threaded — share it
/// behind a mutex when a background task also writes.
pub struct Store {
    conn: Connection,
    path: PathBuf,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").field("path", &self.path).finish()
    }
}

impl Store {
    /// Open (and if needed create) the database at `path`.
    ///
    /// Parent directory creation is idempotent. The connection is put
    /// in WAL mode with a busy timeout so concurrent writers queue
    /// instead of erroring.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| TelemetryError::StoreUnavailable {
                    path: path.clone(),
                    reason: e.to_string(),
                })?;
            }
        }

        let conn = Connection::open(&path).map_err(|e| TelemetryError::StoreUnavailable {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        // journal_mode is a query pragma — it answers with the active mode.
        let _mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        conn.execute_batch("PRAGMA synchronous=NORMAL;")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self { conn, path })
    }

    /// Filesystem path of the underlying database.
    pub fn path(&self) -> &Path {
        &self.path
    }

    // -- Agent writes --------------------------------------------------------

    /// Insert a freshly registered agent row.
    pub fn insert_agent(&self, row: &AgentRow) -> Result<()> {
        self.conn
            .prepare_cached(
                "INSERT INTO agents
                     (id, pid, role, status, current_task_id, last_seen,
                      worktree_path, created_at, is_active)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?
            .execute(params![
                row.id,
                row.pid,
                row.role,
                row.status.as_str(),
                row.current_task_id,
                row.last_seen,
                row.worktree_path,
                row.created_at,
                row.is_active,
            ])?;
        Ok(())
    }

    /// Heartbeat: set `last_seen` to `now`.
    pub fn touch_agent(&self, agent_id: &str, now: u64) -> Result<()> {
        self.conn
            .prepare_cached("UPDATE agents SET last_seen = ?2 WHERE id = ?1")?
            .execute(params![agent_id, now])?;
        Ok(())
    }

    /// Update an agent's reported status.
    pub fn set_agent_status(&self, agent_id: &str, status: AgentStatus) -> Result<()> {
        self.conn
            .prepare_cached("UPDATE agents SET status = ?2 WHERE id = ?1")?
            .execute(params![agent_id, status.as_str()])?;
        Ok(())
    }

    /// Soft-delete: drop the agent from the live fleet view.
    pub fn deactivate_agent(&self, agent_id: &str) -> Result<()> {
        self.conn
            .prepare_cached("UPDATE agents SET is_active = 0 WHERE id = ?1")?
            .execute(params![agent_id])?;
        Ok(())
    }

    // -- Task writes ---------------------------------------------------------

    /// Create or update a task from a progress report.
    ///
    /// A missing task is created assigned to `agent_id` with
    /// `title ?? task_id`. An existing task gets its percent and status
    /// recomputed; `started_at` is set once, `completed_at` exactly
    /// while the task sits at 100. Reporting below 100 on a Complete
    /// task demotes it back to InProgress and clears `completed_at`.
    /// The reporting agent's `current_task_id` is updated either way.
    pub fn upsert_task_progress(
        &mut self,
        task_id: &str,
        agent_id: &str,
        percent: u8,
        title: Option<&str>,
        now: u64,
    ) -> Result<()> {
        let percent = percent.min(100);
        let status = if percent == 100 { TaskStatus::Complete } else { TaskStatus::InProgress };
        let completed_at = (percent == 100).then_some(now);

        let tx = self.conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let started_at: Option<Option<u64>> = tx
            .prepare_cached("SELECT started_at FROM tasks WHERE id = ?1")?
            .query_row(params![task_id], |row| row.get(0))
            .optional()?;

        match started_at {
            None => {
                tx.prepare_cached(
                    "INSERT INTO tasks
                         (id, title, status, assigned_agent_id, progress_percent,
                          dependencies, created_at, started_at, completed_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, '', ?6, ?6, ?7)",
                )?
                .execute(params![
                    task_id,
                    title.unwrap_or(task_id),
                    status.as_str(),
                    agent_id,
                    percent,
                    now,
                    completed_at,
                ])?;
            }
            Some(existing_started) => {
                // assigned_agent_id is creation-only: a later reporter
                // does not steal the task.
                tx.prepare_cached(
                    "UPDATE tasks
                        SET progress_percent = ?2,
                            status = ?3,
                            started_at = ?4,
                            completed_at = ?5
                      WHERE id = ?1",
                )?
                .execute(params![
                    task_id,
                    percent,
                    status.as_str(),
                    existing_started.unwrap_or(now),
                    completed_at,
                ])?;
            }
        }

        tx.prepare_cached("UPDATE agents SET current_task_id = ?2 WHERE id = ?1")?
            .execute(params![agent_id, task_id])?;

        tx.commit()?;
        Ok(())
    }

    // -- Log writes ----------------------------------------------------------

    /// Append a whisper log line, then evict this agent's oldest rows
    /// past `cap`. Eviction is strictly oldest-first by autoincrement
    /// id.
    pub fn insert_log(
        &self,
        agent_id: &str,
        level: LogLevel,
        message: &str,
        now: u64,
        cap: usize,
    ) -> Result<()> {
        self.conn
            .prepare_cached(
                "INSERT INTO logs (agent_id, level, message, timestamp)
                 VALUES (?1, ?2, ?3, ?4)",
            )?
            .execute(params![agent_id, level.as_str(), message, now])?;
        self.conn
            .prepare_cached(
                "DELETE FROM logs
                  WHERE agent_id = ?1
                    AND id NOT IN (SELECT id FROM logs
                                    WHERE agent_id = ?1
                                    ORDER BY id DESC
                                    LIMIT ?2)",
            )?
            .execute(params![agent_id, cap as i64])?;
        Ok(())
    }

    // -- Metric writes -------------------------------------------------------

    /// Record a token/cost sample.
    pub fn insert_metric(
        &self,
        agent_id: &str,
        tokens_used: u64,
        estimated_cost: f64,
        now: u64,
    ) -> Result<()> {
        self.conn
            .prepare_cached(
                "INSERT INTO metrics (agent_id, tokens_used, estimated_cost, timestamp)
                 VALUES (?1, ?2, ?3, ?4)",
            )?
            .execute(params![agent_id, tokens_used, estimated_cost, now])?;
        Ok(())
    }

    // -- Reads ---------------------------------------------------------------

    /// All active agents in stable fleet order (`created_at` ascending,
    /// id as tie-break).
    pub fn agents(&self) -> Result<Vec<AgentRow>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, pid, role, status, current_task_id, last_seen,
                    worktree_path, created_at, is_active
               FROM agents
              WHERE is_active = 1
              ORDER BY created_at ASC, id ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(AgentRow {
                    id: row.get(0)?,
                    pid: row.get(1)?,
                    role: row.get(2)?,
                    status: AgentStatus::parse(&row.get::<_, String>(3)?),
                    current_task_id: row.get(4)?,
                    last_seen: row.get(5)?,
                    worktree_path: row.get(6)?,
                    created_at: row.get(7)?,
                    is_active: row.get(8)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// One agent row by id, active or not.
    pub fn agent(&self, agent_id: &str) -> Result<Option<AgentRow>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, pid, role, status, current_task_id, last_seen,
                    worktree_path, created_at, is_active
               FROM agents
              WHERE id = ?1",
        )?;
        let row = stmt
            .query_row(params![agent_id], |row| {
                Ok(AgentRow {
                    id: row.get(0)?,
                    pid: row.get(1)?,
                    role: row.get(2)?,
                    status: AgentStatus::parse(&row.get::<_, String>(3)?),
                    current_task_id: row.get(4)?,
                    last_seen: row.get(5)?,
                    worktree_path: row.get(6)?,
                    created_at: row.get(7)?,
                    is_active: row.get(8)?,
                })
            })
            .optional()?;
        Ok(row)
    }

    /// All tasks, oldest first.
    pub fn tasks(&self) -> Result<Vec<TaskRow>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, title, status, assigned_agent_id, progress_percent,
                    dependencies, created_at, started_at, completed_at
               FROM tasks
              ORDER BY created_at ASC, id ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(TaskRow {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    status: TaskStatus::parse(&row.get::<_, String>(2)?),
                    assigned_agent_id: row.get(3)?,
                    progress_percent: row.get::<_, i64>(4)?.clamp(0, 100) as u8,
                    dependencies: row.get(5)?,
                    created_at: row.get(6)?,
                    started_at: row.get(7)?,
                    completed_at: row.get(8)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// One task row by id.
    pub fn task(&self, task_id: &str) -> Result<Option<TaskRow>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, title, status, assigned_agent_id, progress_percent,
                    dependencies, created_at, started_at, completed_at
               FROM tasks
              WHERE id = ?1",
        )?;
        let row = stmt
            .query_row(params![task_id], |row| {
                Ok(TaskRow {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    status: TaskStatus::parse(&row.get::<_, String>(2)?),
                    assigned_agent_id: row.get(3)?,
                    progress_percent: row.get::<_, i64>(4)?.clamp(0, 100) as u8,
                    dependencies: row.get(5)?,
                    created_at: row.get(6)?,
                    started_at: row.get(7)?,
                    completed_at: row.get(8)?,
                })
            })
            .optional()?;
        Ok(row)
    }

    /// Newest-first whisper log entries for one agent.
    pub fn logs_for_agent(&self, agent_id: &str, limit: usize) -> Result<Vec<LogRow>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, agent_id, level, message, timestamp
               FROM logs
              WHERE agent_id = ?1
              ORDER BY id DESC
              LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![agent_id, limit as i64], |row| {
                Ok(LogRow {
                    id: row.get(0)?,
                    agent_id: row.get(1)?,
                    level: LogLevel::parse(&row.get::<_, String>(2)?),
                    message: row.get(3)?,
                    timestamp: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Stored log row count for one agent.
    pub fn log_count(&self, agent_id: &str) -> Result<usize> {
        let count: i64 = self
            .conn
            .prepare_cached("SELECT COUNT(*) FROM logs WHERE agent_id = ?1")?
            .query_row(params![agent_id], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// All metric samples for one agent, oldest first.
    pub fn metrics_for_agent(&self, agent_id: &str) -> Result<Vec<MetricRow>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, agent_id, tokens_used, estimated_cost, timestamp
               FROM metrics
              WHERE agent_id = ?1
              ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map(params![agent_id], |row| {
                Ok(MetricRow {
                    id: row.get(0)?,
                    agent_id: row.get(1)?,
                    tokens_used: row.get::<_, i64>(2)?.max(0) as u64,
                    estimated_cost: row.get(3)?,
                    timestamp: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Fleet totals: token and cost sums across all samples, plus agent
    /// counts. An agent is counted active when it is flagged live and
    /// its `last_seen` is within `dead_after_ms` of `now`.
    pub fn aggregated_metrics(&self, now: u64, dead_after_ms: u64) -> Result<AggregatedMetrics> {
        let (total_tokens, total_cost): (i64, f64) = self
            .conn
            .prepare_cached(
                "SELECT COALESCE(SUM(tokens_used), 0), COALESCE(SUM(estimated_cost), 0.0)
                   FROM metrics",
            )?
            .query_row([], |row| Ok((row.get(0)?, row.get(1)?)))?;

        let total_agents: i64 = self
            .conn
            .prepare_cached("SELECT COUNT(*) FROM agents WHERE is_active = 1")?
            .query_row([], |row| row.get(0))?;

        let cutoff = now.saturating_sub(dead_after_ms);
        let active_agents: i64 = self
            .conn
            .prepare_cached(
                "SELECT COUNT(*) FROM agents WHERE is_active = 1 AND last_seen >= ?1",
            )?
            .query_row(params![cutoff], |row| row.get(0))?;

        Ok(AggregatedMetrics {
            total_tokens: total_tokens.max(0) as u64,
            total_cost,
            active_agents: active_agents as usize,
            total_agents: total_agents as usize,
        })
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
