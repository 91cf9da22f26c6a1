// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Paragraph};
use ratatui::Frame;

use crate::adapter::{DerivedAgent, DerivedStatus};
use crate::format::{short_id, status_indicator, status_token};

/// Advisory status colors; unknown rows never reach here because the
/// schema parser is total.
pub fn status_color(status: DerivedStatus) -> Color {
    match status {
        DerivedStatus::Idle => Color::Cyan,
        DerivedStatus::Busy => Color::Green,
        DerivedStatus::Error => Color::Yellow,
        DerivedStatus::Dead => Color::Red,
    }
}

/// The fixed `rows × cols` fleet grid. Agents fill slots in fleet
/// order; spare slots render a dimmed placeholder. The selected card
/// gets a bold frame.
pub fn render(
    frame: &mut Frame,
    area: Rect,
    agents: &[DerivedAgent],
    selected: Option<&str>,
    rows: u16,
    cols: u16,
) {
    if rows == 0 || cols == 0 || area.width < cols || area.height < rows {
        return;
    }
    let cell_w = area.width / cols;
    let cell_h = (area.height / rows).max(1);

    for row in 0..rows {
        for col in 0..cols {
            let slot = usize::from(row) * usize::from(cols) + usize::from(col);
            let cell = Rect {
                x: area.x + col * cell_w,
                y: area.y + row * cell_h,
                width: cell_w,
                height: cell_h,
            };
            match agents.get(slot) {
                Some(agent) => render_card(frame, cell, agent, selected == Some(agent.id())),
                None => render_placeholder(frame, cell),
            }
        }
    }
}

fn render_card(frame: &mut Frame, cell: Rect, agent: &DerivedAgent, selected: bool) {
    let color = status_color(agent.status);
    let mut block = Block::bordered().border_style(Style::new().fg(color));
    if selected {
        block = block.border_style(Style::new().fg(color).add_modifier(Modifier::BOLD));
    }
    let text = Line::from(format!(
        "{} {} {}",
        short_id(agent.id()),
        status_token(agent.status),
        status_indicator(agent.status, agent.progress),
    ))
    .style(Style::new().fg(color));
    frame.render_widget(Paragraph::new(text).block(block), cell);
}

fn render_placeholder(frame: &mut Frame, cell: Rect) {
    let block = Block::bordered().border_style(Style::new().fg(Color::DarkGray));
    let text = Line::from("·").style(Style::new().fg(Color::DarkGray));
    frame.render_widget(Paragraph::new(text).block(block), cell);
}

#[cfg(test)]
#[path = "grid_tests.rs"]
mod tests;
