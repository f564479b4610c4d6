use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Widget,
};

use crate::theme::ThemeColors;

const KEY_HINTS: &str = " /:filter  space:select  d:export  ?:help ";

/// Truncate to at most `width` characters.
fn clip(s: &str, width: usize) -> String {
    s.chars().take(width).collect()
}

/// Status bar: current path, selection summary, key hints, or a transient message.
pub struct StatusBarWidget<'a> {
    path_str: &'a str,
    selection_info: &'a str,
    theme: &'a ThemeColors,
    status_message: Option<&'a str>,
    is_error: bool,
    loading: bool,
}

impl<'a> StatusBarWidget<'a> {
    pub fn new(path_str: &'a str, selection_info: &'a str, theme: &'a ThemeColors) -> Self {
        Self {
            path_str,
            selection_info,
            theme,
            status_message: None,
            is_error: false,
            loading: false,
        }
    }

    pub fn status_message(mut self, msg: &'a str, is_error: bool) -> Self {
        self.status_message = Some(msg);
        self.is_error = is_error;
        self
    }

    pub fn loading(mut self, loading: bool) -> Self {
        self.loading = loading;
        self
    }
}

impl<'a> Widget for StatusBarWidget<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 || area.width == 0 {
            return;
        }

        let width = area.width as usize;

        if let Some(msg) = self.status_message {
            let style = if self.is_error {
                Style::default()
                    .bg(self.theme.error_fg)
                    .fg(self.theme.status_fg)
            } else {
                Style::default().fg(self.theme.success_fg)
            };
            let display = format!("{:<width$}", clip(msg, width), width = width);
            buf.set_line(area.x, area.y, &Line::from(Span::styled(display, style)), area.width);
            return;
        }

        // [path] ... [loading] [selection] [hints]
        let hints_len = KEY_HINTS.chars().count();
        let loading = if self.loading { " loading… " } else { "" };
        let info_len = self.selection_info.chars().count() + loading.chars().count();
        let path_budget = width
            .saturating_sub(hints_len)
            .saturating_sub(info_len)
            .saturating_sub(1);

        let path_len = self.path_str.chars().count();
        let path_display = if path_len > path_budget {
            if path_budget > 3 {
                let tail: String = self
                    .path_str
                    .chars()
                    .skip(path_len - (path_budget - 3))
                    .collect();
                format!("...{}", tail)
            } else {
                clip(self.path_str, path_budget)
            }
        } else {
            self.path_str.to_string()
        };

        let gap = width
            .saturating_sub(hints_len)
            .saturating_sub(info_len)
            .saturating_sub(path_display.chars().count());

        let spans = vec![
            Span::styled(path_display, Style::default().fg(self.theme.status_fg)),
            Span::raw(" ".repeat(gap)),
            Span::styled(
                loading,
                Style::default()
                    .fg(self.theme.warning_fg)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                self.selection_info,
                Style::default()
                    .fg(self.theme.accent_fg)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                KEY_HINTS,
                Style::default()
                    .fg(self.theme.dim_fg)
                    .add_modifier(Modifier::DIM),
            ),
        ];

        buf.set_style(area, Style::default().bg(self.theme.status_bg));
        buf.set_line(area.x, area.y, &Line::from(spans), area.width);
    }
}
