// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! War-room dashboard for a swarm of coding agents.
//!
//! A polling engine reads the shared telemetry store, derives a view
//! state (dead-agent detection, task progress, fleet totals), diffs it
//! against the previous tick, and drives an incremental ratatui
//! renderer. The dashboard only ever reads — agents stay untouched and
//! spend zero tokens on being observed.

pub mod adapter;
pub mod app;
pub mod config;
pub mod format;
pub mod keys;
pub mod poller;
pub mod state;
pub mod test_support;
pub mod widgets;

pub use adapter::{DerivedAgent, DerivedStatus, StoreAdapter};
pub use config::Config;
pub use poller::{EngineEvent, PollingDriver};
pub use state::{DashboardState, StatePatch, StateStore};
