// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

/// Typed failures surfaced by the telemetry store and client.
///
/// Errors are returned, never printed — the whisper contract forbids
/// any client output on stdout or stderr.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// `register_agent` while a prior registration is still live.
    #[error("agent is already registered")]
    AlreadyRegistered,

    /// A registration-scoped operation with no live registration.
    #[error("no agent registration is active")]
    NotRegistered,

    /// The store file or its directory cannot be created or opened.
    /// Fatal for the dashboard at startup, fatal-at-use for agents.
    #[error("telemetry store unavailable at {path}: {reason}")]
    StoreUnavailable { path: PathBuf, reason: String },

    /// An individual store operation failed.
    #[error("telemetry store operation failed: {0}")]
    Store(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, TelemetryError>;
