use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};

use crate::app::{App, AppMode};
use crate::components::help::HelpOverlay;

/// Handle a key event.
pub fn handle_key_event(app: &mut App, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.quit();
        return;
    }

    match app.mode {
        AppMode::Normal => handle_normal(app, key),
        AppMode::Filter => handle_filter(app, key),
        AppMode::Help => handle_help(app, key),
    }
}

fn handle_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.quit(),
        KeyCode::Char('j') | KeyCode::Down => app.select_next(),
        KeyCode::Char('k') | KeyCode::Up => app.select_previous(),
        KeyCode::Char('g') | KeyCode::Home => app.select_first(),
        KeyCode::Char('G') | KeyCode::End => app.select_last(),
        KeyCode::Char('l') | KeyCode::Right | KeyCode::Enter => app.expand_selected(),
        KeyCode::Char('h') | KeyCode::Left | KeyCode::Backspace => app.collapse_selected(),
        KeyCode::Char(' ') => app.toggle_selection(),
        KeyCode::Char('c') => app.clear_selection(),
        KeyCode::Char('/') => app.start_filter(),
        KeyCode::Esc if app.controller.is_filtering() => app.clear_filter(),
        KeyCode::Char('m') => app.cycle_match_mode(),
        KeyCode::Char('d') => app.export_selection(),
        KeyCode::Char('r') => app.request_roots(),
        KeyCode::Char('?') => app.toggle_help(),
        _ => {}
    }
}

fn handle_filter(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.clear_filter(),
        KeyCode::Enter => app.accept_filter(),
        KeyCode::Backspace => app.filter_delete_char(),
        KeyCode::Left => app.filter_cursor_left(),
        KeyCode::Right => app.filter_cursor_right(),
        KeyCode::Down => app.select_next(),
        KeyCode::Up => app.select_previous(),
        KeyCode::Char(c) => app.filter_input_char(c),
        _ => {}
    }
}

fn handle_help(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('?') | KeyCode::Esc | KeyCode::Char('q') => app.toggle_help(),
        KeyCode::Char('j') | KeyCode::Down => {
            let max = HelpOverlay::total_lines().saturating_sub(1);
            app.help_scroll = (app.help_scroll + 1).min(max);
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.help_scroll = app.help_scroll.saturating_sub(1);
        }
        _ => {}
    }
}

/// Mouse wheel moves the cursor.
pub fn handle_mouse_event(app: &mut App, mouse: MouseEvent) {
    if app.mode != AppMode::Normal {
        return;
    }
    match mouse.kind {
        MouseEventKind::ScrollDown => app.select_next(),
        MouseEventKind::ScrollUp => app.select_previous(),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::source::manifest::ManifestSource;
    use crossterm::event::{KeyEventKind, KeyEventState};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    async fn app() -> App {
        let json = r#"{ "dataset": "ds", "entries": [
            { "name": "a", "children": [] },
            { "name": "b.txt" },
            { "name": "c.txt" }
        ]}"#;
        let source = Arc::new(ManifestSource::from_json(json, true).unwrap());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut app = App::new(source, &AppConfig::default(), tx);
        app.request_roots();
        if let Some(crate::event::Event::RootsLoaded { request, result }) = rx.recv().await {
            app.handle_roots_loaded(request, result);
        }
        app
    }

    #[tokio::test]
    async fn movement_keys() {
        let mut app = app().await;
        handle_key_event(&mut app, key(KeyCode::Char('j')));
        assert_eq!(app.cursor, 1);
        handle_key_event(&mut app, key(KeyCode::Char('G')));
        assert_eq!(app.cursor, 2);
        handle_key_event(&mut app, key(KeyCode::Up));
        assert_eq!(app.cursor, 1);
        handle_key_event(&mut app, key(KeyCode::Char('g')));
        assert_eq!(app.cursor, 0);
    }

    #[tokio::test]
    async fn slash_enters_filter_and_typing_filters() {
        let mut app = app().await;
        handle_key_event(&mut app, key(KeyCode::Char('/')));
        assert_eq!(app.mode, AppMode::Filter);
        // 'q' is text here, not quit
        handle_key_event(&mut app, key(KeyCode::Char('q')));
        assert!(!app.should_quit);
        handle_key_event(&mut app, key(KeyCode::Backspace));
        handle_key_event(&mut app, key(KeyCode::Char('b')));
        assert_eq!(app.flat_items.len(), 1);
        handle_key_event(&mut app, key(KeyCode::Enter));
        assert_eq!(app.mode, AppMode::Normal);
        assert!(app.controller.is_filtering());
    }

    #[tokio::test]
    async fn space_selects_current_row() {
        let mut app = app().await;
        handle_key_event(&mut app, key(KeyCode::Char('j')));
        handle_key_event(&mut app, key(KeyCode::Char(' ')));
        assert_eq!(app.controller.selected_count(), 1);
        handle_key_event(&mut app, key(KeyCode::Char('c')));
        assert_eq!(app.controller.selected_count(), 0);
    }

    #[tokio::test]
    async fn help_swallows_keys() {
        let mut app = app().await;
        handle_key_event(&mut app, key(KeyCode::Char('?')));
        assert_eq!(app.mode, AppMode::Help);
        handle_key_event(&mut app, key(KeyCode::Char('j')));
        assert_eq!(app.cursor, 0);
        assert_eq!(app.help_scroll, 1);
        handle_key_event(&mut app, key(KeyCode::Esc));
        assert_eq!(app.mode, AppMode::Normal);
    }

    #[tokio::test]
    async fn quit_keys() {
        let mut plain = app().await;
        handle_key_event(&mut plain, key(KeyCode::Char('q')));
        assert!(plain.should_quit);

        let mut ctrl = app().await;
        handle_key_event(
            &mut ctrl,
            KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL),
        );
        assert!(ctrl.should_quit);
    }

    #[tokio::test]
    async fn m_cycles_match_mode() {
        let mut app = app().await;
        handle_key_event(&mut app, key(KeyCode::Char('m')));
        assert_eq!(app.match_mode, crate::tree::filter::MatchMode::Fuzzy);
    }
}
