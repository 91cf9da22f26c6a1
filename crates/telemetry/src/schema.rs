// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Row types and wire enums shared by the store and its readers.
//!
//! Status and level enums are stored as lowercase strings. Parsing is
//! total: unknown values fall back to a neutral default so a malformed
//! row can never take down a reader.

use serde::{Deserialize, Serialize};

/// Reported status of a registered agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    #[default]
    Idle,
    Busy,
    Error,
}

impl AgentStatus {
    /// Wire-format string for this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Busy => "busy",
            Self::Error => "error",
        }
    }

    /// Parse a stored status string. Unknown values fall back to `Idle`.
    pub fn parse(s: &str) -> Self {
        match s {
            "busy" => Self::Busy,
            "error" => Self::Error,
            _ => Self::Idle,
        }
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a reported task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Complete,
    Failed,
}

impl TaskStatus {
    /// Wire-format string for this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }

    /// Parse a stored status string. Unknown values fall back to `Pending`.
    pub fn parse(s: &str) -> Self {
        match s {
            "in_progress" => Self::InProgress,
            "complete" => Self::Complete,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }

    /// Render priority: in-progress work sorts above the queue, finished
    /// and failed work sinks to the bottom.
    pub fn priority(&self) -> u8 {
        match self {
            Self::InProgress => 0,
            Self::Pending => 1,
            Self::Complete => 2,
            Self::Failed => 3,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of a whisper log entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Wire-format string for this level.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Parse a stored level string. Unknown values fall back to `Info`.
    pub fn parse(s: &str) -> Self {
        match s {
            "warn" => Self::Warn,
            "error" => Self::Error,
            _ => Self::Info,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One registered worker process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRow {
    pub id: String,
    pub pid: u32,
    pub role: String,
    pub status: AgentStatus,
    pub current_task_id: Option<String>,
    pub last_seen: u64,
    pub worktree_path: Option<String>,
    pub created_at: u64,
    pub is_active: bool,
}

/// One unit of work reported by an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRow {
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
    pub assigned_agent_id: Option<String>,
    pub progress_percent: u8,
    /// Opaque dependency descriptor; the store does not interpret it.
    pub dependencies: String,
    pub created_at: u64,
    pub started_at: Option<u64>,
    pub completed_at: Option<u64>,
}

/// One whisper log line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRow {
    /// Autoincrement id — the eviction and ordering key. Timestamps are
    /// not monotonic across writer processes; this is.
    pub id: i64,
    pub agent_id: String,
    pub level: LogLevel,
    pub message: String,
    pub timestamp: u64,
}

/// One token/cost sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    pub id: i64,
    pub agent_id: String,
    pub tokens_used: u64,
    pub estimated_cost: f64,
    pub timestamp: u64,
}

/// Fleet-wide metric totals summed across all stored samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregatedMetrics {
    pub total_tokens: u64,
    pub total_cost: f64,
    /// Active (non-dead) agents still flagged `is_active`.
    pub active_agents: usize,
    /// All agents flagged `is_active`.
    pub total_agents: usize,
}

/// Return current epoch millis.
pub fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
