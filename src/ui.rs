use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::Style,
    widgets::{Block, Borders},
    Frame,
};

use crate::app::{App, AppMode};
use crate::components::filter_bar::FilterBarWidget;
use crate::components::help::HelpOverlay;
use crate::components::status_bar::StatusBarWidget;
use crate::components::tree::TreeWidget;
use crate::export::format_size;

/// Render the application UI.
pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();
    let show_filter = app.mode == AppMode::Filter || app.controller.is_filtering();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),
            Constraint::Length(u16::from(show_filter)),
            Constraint::Length(1),
        ])
        .split(area);

    // Keep the cursor row visible inside the bordered panel.
    app.update_scroll(chunks[0].height.saturating_sub(2) as usize);

    let mut title = format!(" {} ", app.dataset());
    if app.controller.is_filtering() {
        title.push_str("[filtered] ");
    }
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(app.theme.border_fg));

    let tree = TreeWidget::new(&app.flat_items, &app.theme, app.use_icons)
        .cursor(app.cursor)
        .scroll_offset(app.scroll_offset)
        .block(block);
    frame.render_widget(tree, chunks[0]);

    if show_filter {
        let filter_text = if app.mode == AppMode::Filter {
            app.filter_input.input.as_str()
        } else {
            app.controller.filter_text()
        };
        let bar = FilterBarWidget::new(filter_text, app.filter_input.cursor_position, &app.theme)
            .editing(app.mode == AppMode::Filter)
            .match_count(app.controller.match_count())
            .mode_label(app.match_mode.label());
        frame.render_widget(bar, chunks[1]);
    }

    let path = app
        .current_item()
        .map(|item| item.path.clone())
        .unwrap_or_default();
    let selected = app.controller.selected_items();
    let selection_info = if selected.is_empty() {
        String::new()
    } else {
        let bytes: u64 = selected.iter().filter_map(|n| n.size()).sum();
        format!(
            "{} selected ({}) ",
            app.controller.selected_count(),
            format_size(bytes)
        )
    };

    let mut status = StatusBarWidget::new(&path, &selection_info, &app.theme)
        .loading(app.controller.is_loading_roots());
    if let Some(msg) = &app.status_message {
        status = status.status_message(&msg.text, msg.is_error);
    }
    frame.render_widget(status, chunks[2]);

    if app.mode == AppMode::Help {
        frame.render_widget(HelpOverlay::new(&app.theme, app.help_scroll), area);
    }
}
