use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Widget,
};

use crate::theme::ThemeColors;

/// One-line filter prompt shown above the status bar.
pub struct FilterBarWidget<'a> {
    query: &'a str,
    cursor_position: usize,
    editing: bool,
    match_count: usize,
    mode_label: &'a str,
    theme: &'a ThemeColors,
}

impl<'a> FilterBarWidget<'a> {
    pub fn new(query: &'a str, cursor_position: usize, theme: &'a ThemeColors) -> Self {
        Self {
            query,
            cursor_position,
            editing: true,
            match_count: 0,
            mode_label: "substring",
            theme,
        }
    }

    /// Whether the prompt has focus. An unfocused bar shows no cursor.
    pub fn editing(mut self, editing: bool) -> Self {
        self.editing = editing;
        self
    }

    pub fn match_count(mut self, count: usize) -> Self {
        self.match_count = count;
        self
    }

    pub fn mode_label(mut self, label: &'a str) -> Self {
        self.mode_label = label;
        self
    }
}

impl<'a> Widget for FilterBarWidget<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 || area.width == 0 {
            return;
        }

        let pos = self.cursor_position.min(self.query.len());
        let (before, rest) = self.query.split_at(pos);
        let mut rest_chars = rest.chars();
        let cursor_char = rest_chars
            .next()
            .map(|c| c.to_string())
            .unwrap_or_else(|| " ".to_string());
        let after: String = rest_chars.collect();

        let prompt_style = Style::default()
            .fg(self.theme.accent_fg)
            .add_modifier(Modifier::BOLD);
        let input_style = Style::default().fg(self.theme.tree_fg);
        let cursor_style = if self.editing {
            Style::default()
                .bg(self.theme.tree_fg)
                .fg(self.theme.status_bg)
        } else {
            input_style
        };

        let count = if self.query.is_empty() {
            String::new()
        } else {
            format!(
                "  {} match{}",
                self.match_count,
                if self.match_count == 1 { "" } else { "es" }
            )
        };

        let line = Line::from(vec![
            Span::styled("/ ", prompt_style),
            Span::styled(before, input_style),
            Span::styled(cursor_char, cursor_style),
            Span::styled(after, input_style),
            Span::styled(count, Style::default().fg(self.theme.info_fg)),
            Span::styled(
                format!("  [{}]", self.mode_label),
                Style::default().fg(self.theme.dim_fg),
            ),
        ]);
        buf.set_line(area.x, area.y, &line, area.width);
    }
}
