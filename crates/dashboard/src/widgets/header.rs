// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use ratatui::layout::Rect;
use ratatui::style::{Style, Stylize};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use asf_telemetry::schema::AggregatedMetrics;

use crate::format::{format_cost, format_tokens};

/// One-row fleet summary across the full width.
pub fn render(frame: &mut Frame, area: Rect, metrics: &AggregatedMetrics) {
    let line = Line::from(vec![
        Span::styled("ASF Whisper Dashboard", Style::new().bold()),
        Span::raw("   "),
        Span::raw(format!("Agents: {}/{}", metrics.active_agents, metrics.total_agents)),
        Span::raw("   "),
        Span::raw(format!("Cost: {}", format_cost(metrics.total_cost))),
        Span::raw("   "),
        Span::raw(format!("Tokens: {}", format_tokens(metrics.total_tokens))),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

#[cfg(test)]
#[path = "header_tests.rs"]
mod tests;
