use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Padding, Paragraph, Widget},
};

use crate::theme::ThemeColors;

/// A single keybinding entry for display.
struct KeyEntry {
    key: &'static str,
    description: &'static str,
}

/// A category of keybindings.
struct KeyCategory {
    name: &'static str,
    entries: &'static [KeyEntry],
    /// Keys are tree markers, styled as the tree draws them.
    legend: bool,
}

const NAVIGATION_KEYS: &[KeyEntry] = &[
    KeyEntry {
        key: "j / ↓",
        description: "Move down",
    },
    KeyEntry {
        key: "k / ↑",
        description: "Move up",
    },
    KeyEntry {
        key: "g / Home",
        description: "Jump to first item",
    },
    KeyEntry {
        key: "G / End",
        description: "Jump to last item",
    },
    KeyEntry {
        key: "Enter / l / →",
        description: "Expand directory (loads on first open)",
    },
    KeyEntry {
        key: "Backspace / h / ←",
        description: "Collapse directory or jump to parent",
    },
    KeyEntry {
        key: "r",
        description: "Reload base directories",
    },
];

const SELECTION_KEYS: &[KeyEntry] = &[
    KeyEntry {
        key: "Space",
        description: "Select / deselect (cascades to children)",
    },
    KeyEntry {
        key: "c",
        description: "Clear selection",
    },
    KeyEntry {
        key: "d",
        description: "Write download request",
    },
];

const FILTER_KEYS: &[KeyEntry] = &[
    KeyEntry {
        key: "/",
        description: "Start inline filter",
    },
    KeyEntry {
        key: "Enter",
        description: "Accept filter",
    },
    KeyEntry {
        key: "Esc",
        description: "Clear filter",
    },
    KeyEntry {
        key: "m",
        description: "Cycle match mode (substring / fuzzy)",
    },
];

const GENERAL_KEYS: &[KeyEntry] = &[
    KeyEntry {
        key: "?",
        description: "Toggle this help overlay",
    },
    KeyEntry {
        key: "q / Ctrl+C",
        description: "Quit",
    },
];

const MARKER_LEGEND: &[KeyEntry] = &[
    KeyEntry {
        key: "[x] / [-] / [ ]",
        description: "Selected / partly selected / not selected",
    },
    KeyEntry {
        key: "[·]",
        description: "Not verified, cannot be downloaded",
    },
    KeyEntry {
        key: "…",
        description: "Children loading",
    },
    KeyEntry {
        key: "!",
        description: "Last load failed, expand to retry",
    },
];

const CATEGORIES: &[KeyCategory] = &[
    KeyCategory {
        name: "Navigation",
        entries: NAVIGATION_KEYS,
        legend: false,
    },
    KeyCategory {
        name: "Selection & Download",
        entries: SELECTION_KEYS,
        legend: false,
    },
    KeyCategory {
        name: "Filter",
        entries: FILTER_KEYS,
        legend: false,
    },
    KeyCategory {
        name: "Markers",
        entries: MARKER_LEGEND,
        legend: true,
    },
    KeyCategory {
        name: "General",
        entries: GENERAL_KEYS,
        legend: false,
    },
];

/// Width of the key column: the longest key plus a gap.
fn key_column_width() -> usize {
    CATEGORIES
        .iter()
        .flat_map(|c| c.entries.iter())
        .map(|e| e.key.chars().count())
        .max()
        .unwrap_or(0)
        + 3
}

/// Scrollable help overlay listing keys and the tree's row markers.
pub struct HelpOverlay<'a> {
    theme: &'a ThemeColors,
    scroll_offset: usize,
}

impl<'a> HelpOverlay<'a> {
    pub fn new(theme: &'a ThemeColors, scroll_offset: usize) -> Self {
        Self {
            theme,
            scroll_offset,
        }
    }

    /// Legend keys take the color the tree uses for that marker.
    fn key_style(&self, category: &KeyCategory, key: &str) -> Style {
        if !category.legend {
            return Style::default()
                .fg(self.theme.warning_fg)
                .add_modifier(Modifier::BOLD);
        }
        let fg = match key {
            "[·]" => self.theme.tree_unverified_fg,
            "!" => self.theme.error_fg,
            "…" => self.theme.dim_fg,
            _ => self.theme.tree_selected_fg,
        };
        Style::default().fg(fg)
    }

    fn build_content_lines(&self) -> Vec<Line<'static>> {
        let width = key_column_width();
        let header = Style::default()
            .fg(self.theme.accent_fg)
            .add_modifier(Modifier::BOLD);
        let text = Style::default().fg(self.theme.tree_file_fg);

        let mut lines = Vec::with_capacity(Self::total_lines());
        for category in CATEGORIES {
            lines.push(Line::from(Span::styled(category.name.to_uppercase(), header)));
            lines.extend(category.entries.iter().map(|entry| {
                Line::from(vec![
                    Span::styled(
                        format!("  {:<width$}", entry.key, width = width),
                        self.key_style(category, entry.key),
                    ),
                    Span::styled(entry.description, text),
                ])
            }));
            lines.push(Line::default());
        }
        lines.push(Line::from(Span::styled(
            "j/k scroll  ? or Esc close",
            Style::default().fg(self.theme.dim_fg),
        )));
        lines
    }

    /// Number of content lines, used to bound scrolling.
    pub fn total_lines() -> usize {
        CATEGORIES
            .iter()
            .map(|c| c.entries.len() + 2)
            .sum::<usize>()
            + 1
    }
}

impl<'a> Widget for HelpOverlay<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let width = (area.width.saturating_mul(7) / 10).min(80);
        let height = (area.height.saturating_mul(4) / 5).min(50);
        let overlay = Rect::new(
            area.x + area.width.saturating_sub(width) / 2,
            area.y + area.height.saturating_sub(height) / 2,
            width,
            height,
        );

        let total = Self::total_lines();
        let mut block = Block::default()
            .title(" Help ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.theme.border_focused_fg))
            .style(Style::default().bg(self.theme.dialog_bg));
        if total > overlay.height.saturating_sub(2) as usize {
            block = block.title_bottom(
                Line::from(format!(" {}/{} ", (self.scroll_offset + 1).min(total), total))
                    .right_aligned(),
            );
        }

        Clear.render(overlay, buf);
        Paragraph::new(self.build_content_lines())
            .block(block.padding(Padding::horizontal(1)))
            .scroll((self.scroll_offset.min(u16::MAX as usize) as u16, 0))
            .render(overlay, buf);
    }
}
