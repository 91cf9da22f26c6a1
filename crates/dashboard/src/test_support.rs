// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for widget rendering tests against a `TestBackend`.

use ratatui::buffer::Buffer;

/// The rendered text of one buffer row, trailing spaces trimmed.
pub fn row_text(buffer: &Buffer, y: u16) -> String {
    let mut row = String::new();
    for x in buffer.area.x..buffer.area.right() {
        if let Some(cell) = buffer.cell((x, y)) {
            row.push_str(cell.symbol());
        }
    }
    row.trim_end().to_owned()
}

/// Every rendered row, top to bottom.
pub fn rows(buffer: &Buffer) -> Vec<String> {
    (buffer.area.y..buffer.area.bottom()).map(|y| row_text(buffer, y)).collect()
}

/// Whether any row contains `needle`.
pub fn buffer_contains(buffer: &Buffer, needle: &str) -> bool {
    rows(buffer).iter().any(|row| row.contains(needle))
}
