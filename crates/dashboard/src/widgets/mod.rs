// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The four widget regions and the screen layout contract.
//!
//! Header across the top, agent grid over task queue on the left
//! half, whisper log on the right half. Layout is recomputed from the
//! terminal size on every draw, so resize events cost nothing extra.

pub mod grid;
pub mod header;
pub mod logs;
pub mod tasks;

use ratatui::layout::{Constraint, Layout, Rect};

/// Screen regions for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Regions {
    pub header: Rect,
    pub grid: Rect,
    pub tasks: Rect,
    pub logs: Rect,
}

/// Split the terminal area into the four regions.
pub fn split(area: Rect) -> Regions {
    let [header, body] =
        Layout::vertical([Constraint::Length(1), Constraint::Min(0)]).areas(area);
    let [left, logs] =
        Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)]).areas(body);
    let [grid, tasks] =
        Layout::vertical([Constraint::Percentage(50), Constraint::Percentage(50)]).areas(left);
    Regions { header, grid, tasks, logs }
}

#[cfg(test)]
#[path = "layout_tests.rs"]
mod tests;
