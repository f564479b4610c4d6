use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::error::FetchError;
use crate::event::Event;
use crate::export::{format_size, DownloadRequest};
use crate::source::DirectorySource;
use crate::theme::{resolve_theme, ThemeColors};
use crate::tree::filter::MatchMode;
use crate::tree::flat::{flatten, FlatItem};
use crate::tree::loader::{ChildRequest, Completion, RootsRequest, ToggleOutcome, TreeController};
use crate::tree::node::{NodeId, TreeNode};

/// Application mode.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    #[default]
    Normal,
    /// Typing into the filter prompt; the tree filters live.
    Filter,
    Help,
}

/// Text input state for the filter prompt.
#[derive(Debug, Default)]
pub struct FilterInput {
    pub input: String,
    pub cursor_position: usize,
}

impl FilterInput {
    fn set(&mut self, text: &str) {
        self.input = text.to_string();
        self.cursor_position = self.input.len();
    }

    fn insert(&mut self, c: char) {
        self.input.insert(self.cursor_position, c);
        self.cursor_position += c.len_utf8();
    }

    fn delete_before(&mut self) -> bool {
        let Some(prev) = self.input[..self.cursor_position].chars().next_back() else {
            return false;
        };
        self.cursor_position -= prev.len_utf8();
        self.input.remove(self.cursor_position);
        true
    }

    fn left(&mut self) {
        if let Some(prev) = self.input[..self.cursor_position].chars().next_back() {
            self.cursor_position -= prev.len_utf8();
        }
    }

    fn right(&mut self) {
        if let Some(next) = self.input[self.cursor_position..].chars().next() {
            self.cursor_position += next.len_utf8();
        }
    }
}

#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub text: String,
    pub is_error: bool,
    pub created: Instant,
}

/// Main application state.
pub struct App {
    pub controller: TreeController,
    source: Arc<dyn DirectorySource>,
    event_tx: UnboundedSender<Event>,
    pub flat_items: Vec<FlatItem>,
    pub cursor: usize,
    pub scroll_offset: usize,
    pub mode: AppMode,
    pub filter_input: FilterInput,
    pub match_mode: MatchMode,
    pub status_message: Option<StatusMessage>,
    pub help_scroll: usize,
    pub export_path: PathBuf,
    pub use_icons: bool,
    pub mouse_enabled: bool,
    pub theme: ThemeColors,
    pub should_quit: bool,
}

impl App {
    pub fn new(
        source: Arc<dyn DirectorySource>,
        config: &AppConfig,
        event_tx: UnboundedSender<Event>,
    ) -> Self {
        let match_mode = config.match_mode();
        Self {
            controller: TreeController::new(match_mode.matcher(), config.refetch_on_clear()),
            source,
            event_tx,
            flat_items: Vec::new(),
            cursor: 0,
            scroll_offset: 0,
            mode: AppMode::Normal,
            filter_input: FilterInput::default(),
            match_mode,
            status_message: None,
            help_scroll: 0,
            export_path: config.export_path(),
            use_icons: config.use_icons(),
            mouse_enabled: config.mouse_enabled(),
            theme: resolve_theme(&config.theme),
            should_quit: false,
        }
    }

    pub fn dataset(&self) -> &str {
        self.source.dataset()
    }

    pub fn current_item(&self) -> Option<&FlatItem> {
        self.flat_items.get(self.cursor)
    }

    /// Rebuild the visible rows, keeping the cursor on the same node if it survived.
    pub fn refresh(&mut self) {
        let current = self.current_item().map(|item| item.id.clone());
        let controller = &self.controller;
        self.flat_items = flatten(controller.displayed(), |id| controller.is_pending(id));

        let found = current.and_then(|id| self.flat_items.iter().position(|item| item.id == id));
        self.cursor = match found {
            Some(index) => index,
            None => self.cursor.min(self.flat_items.len().saturating_sub(1)),
        };
    }

    // ── Fetching ─────────────────────────────────────────────────────────

    /// Load (or reload) the base directories on a background task.
    pub fn request_roots(&mut self) {
        let request = self.controller.begin_load_roots();
        self.spawn_roots(request);
    }

    fn spawn_roots(&self, request: RootsRequest) {
        let source = Arc::clone(&self.source);
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let result = source.base_directories().await;
            let _ = tx.send(Event::RootsLoaded { request, result });
        });
    }

    fn spawn_children(&self, request: ChildRequest) {
        let source = Arc::clone(&self.source);
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let result = source.child_directories(&request.path).await;
            let _ = tx.send(Event::ChildrenLoaded { request, result });
        });
    }

    pub fn handle_roots_loaded(
        &mut self,
        request: RootsRequest,
        result: Result<Vec<TreeNode>, FetchError>,
    ) {
        match self.controller.finish_load_roots(request, result) {
            Ok(Completion::Applied) => self.refresh(),
            Ok(Completion::Stale) => {}
            Err(e) => self.set_status_message(format!("Load failed: {}", e), true),
        }
    }

    pub fn handle_children_loaded(
        &mut self,
        request: ChildRequest,
        result: Result<Vec<TreeNode>, FetchError>,
    ) {
        match self.controller.finish_children(&request, result) {
            Ok(Completion::Applied) => {}
            Ok(Completion::Stale) => return,
            Err(e) => self.set_status_message(format!("Load failed: {}", e), true),
        }
        self.refresh();
    }

    // ── Navigation ───────────────────────────────────────────────────────

    pub fn select_next(&mut self) {
        let len = self.flat_items.len();
        if len > 0 && self.cursor < len - 1 {
            self.cursor += 1;
        }
    }

    pub fn select_previous(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
        }
    }

    pub fn select_first(&mut self) {
        self.cursor = 0;
    }

    pub fn select_last(&mut self) {
        self.cursor = self.flat_items.len().saturating_sub(1);
    }

    /// Keep the cursor inside a viewport of `visible_height` rows.
    pub fn update_scroll(&mut self, visible_height: usize) {
        if visible_height == 0 {
            return;
        }
        if self.cursor < self.scroll_offset {
            self.scroll_offset = self.cursor;
        } else if self.cursor >= self.scroll_offset + visible_height {
            self.scroll_offset = self.cursor + 1 - visible_height;
        }
    }

    /// Expand the directory under the cursor, fetching its children if needed.
    /// On a file this only makes it the active node.
    pub fn expand_selected(&mut self) {
        let Some(id) = self.current_item().map(|item| item.id.clone()) else {
            return;
        };
        match self.controller.toggle(&id, true) {
            Ok(ToggleOutcome::Fetch(request)) => {
                debug!(node = %id, "spawning child fetch");
                self.spawn_children(request);
            }
            Ok(_) => {}
            Err(e) => self.set_status_message(e.to_string(), true),
        }
        self.refresh();
    }

    /// Collapse an expanded directory, otherwise jump to the parent row.
    pub fn collapse_selected(&mut self) {
        let Some(item) = self.current_item() else {
            return;
        };
        let id = item.id.clone();
        let depth = item.depth;
        let expanded_dir = item.is_dir && (item.is_expanded || self.controller.is_pending(&id));

        if expanded_dir {
            if let Err(e) = self.controller.toggle(&id, false) {
                self.set_status_message(e.to_string(), true);
            }
            self.refresh();
            return;
        }
        if depth == 0 {
            return;
        }
        if let Some(parent) = (0..self.cursor)
            .rev()
            .find(|&i| self.flat_items[i].depth < depth)
        {
            self.cursor = parent;
        }
    }

    // ── Selection ────────────────────────────────────────────────────────

    pub fn toggle_selection(&mut self) {
        let Some(item) = self.current_item() else {
            return;
        };
        let id = item.id.clone();
        let blocked = !item.verified && (!item.is_dir || !self.has_loaded_children(&id));
        match self.controller.toggle_selection(&id) {
            Ok(_) if blocked => {
                self.set_status_message(format!("{} is not available for download", id), true)
            }
            Ok(_) => {}
            Err(e) => self.set_status_message(e.to_string(), true),
        }
        self.refresh();
    }

    fn has_loaded_children(&self, id: &NodeId) -> bool {
        self.controller
            .displayed()
            .find(id)
            .map(|node| node.has_children())
            .unwrap_or(false)
    }

    pub fn clear_selection(&mut self) {
        self.controller.clear_selection();
        self.refresh();
    }

    /// Write the selection as a download request document.
    pub fn export_selection(&mut self) {
        let request =
            DownloadRequest::from_selection(self.source.dataset(), &self.controller.selected_items());
        if request.is_empty() {
            self.set_status_message("Nothing selected".to_string(), true);
            return;
        }
        match request.write_to(&self.export_path) {
            Ok(()) => self.set_status_message(
                format!(
                    "Wrote {} item(s), {} to {}",
                    request.items.len(),
                    format_size(request.total_bytes),
                    self.export_path.display()
                ),
                false,
            ),
            Err(e) => self.set_status_message(e.to_string(), true),
        }
    }

    // ── Filtering ────────────────────────────────────────────────────────

    pub fn start_filter(&mut self) {
        let current = self.controller.filter_text().to_string();
        self.filter_input.set(&current);
        self.mode = AppMode::Filter;
    }

    pub fn filter_input_char(&mut self, c: char) {
        self.filter_input.insert(c);
        self.apply_filter();
    }

    pub fn filter_delete_char(&mut self) {
        if self.filter_input.delete_before() {
            self.apply_filter();
        }
    }

    pub fn filter_cursor_left(&mut self) {
        self.filter_input.left();
    }

    pub fn filter_cursor_right(&mut self) {
        self.filter_input.right();
    }

    /// Leave the prompt, keeping the filter applied.
    pub fn accept_filter(&mut self) {
        self.mode = AppMode::Normal;
    }

    /// Drop the filter and return to the full tree.
    pub fn clear_filter(&mut self) {
        self.filter_input = FilterInput::default();
        self.mode = AppMode::Normal;
        self.apply_filter();
    }

    /// Surrounding whitespace is ignored; blank input clears the filter.
    fn apply_filter(&mut self) {
        let text = self.filter_input.input.trim().to_string();
        if let Some(request) = self.controller.set_filter_text(&text) {
            info!("filter cleared, reloading base directories");
            self.spawn_roots(request);
        }
        self.cursor = 0;
        self.scroll_offset = 0;
        self.refresh();
    }

    pub fn cycle_match_mode(&mut self) {
        self.match_mode = self.match_mode.next();
        self.controller.set_matcher(self.match_mode.matcher());
        self.refresh();
        self.set_status_message(format!("Match mode: {}", self.match_mode.label()), false);
    }

    // ── Chrome ───────────────────────────────────────────────────────────

    pub fn toggle_help(&mut self) {
        self.mode = if self.mode == AppMode::Help {
            AppMode::Normal
        } else {
            self.help_scroll = 0;
            AppMode::Help
        };
    }

    pub fn set_status_message(&mut self, text: String, is_error: bool) {
        self.status_message = Some(StatusMessage {
            text,
            is_error,
            created: Instant::now(),
        });
    }

    /// Drop the status message once it has been shown for more than 3 seconds.
    pub fn clear_expired_status(&mut self) {
        if let Some(msg) = &self.status_message {
            if msg.created.elapsed().as_secs() > 3 {
                self.status_message = None;
            }
        }
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }
}
