// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Zero-token-overhead telemetry for a swarm of coding agents.
//!
//! Agents embed a [`client::TelemetryClient`] that records status,
//! progress, whisper logs, and usage into a shared SQLite file. The
//! client never writes to stdout or stderr — everything an agent wants
//! observed goes through the store, where the dashboard reads it.

pub mod client;
pub mod error;
pub mod schema;
pub mod store;

pub use client::{ClientConfig, TelemetryClient};
pub use error::TelemetryError;
pub use schema::{epoch_ms, AgentStatus, LogLevel, TaskStatus};
pub use store::Store;
