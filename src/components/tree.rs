use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Widget},
};

use crate::export::format_size;
use crate::theme::ThemeColors;
use crate::tree::flat::{FlatItem, RowLoad};
use crate::tree::select::SelectionState;

/// Tree widget that renders the dataset tree with box-drawing characters.
pub struct TreeWidget<'a> {
    items: &'a [FlatItem],
    theme: &'a ThemeColors,
    use_icons: bool,
    cursor: usize,
    scroll_offset: usize,
    block: Option<Block<'a>>,
}

impl<'a> TreeWidget<'a> {
    pub fn new(items: &'a [FlatItem], theme: &'a ThemeColors, use_icons: bool) -> Self {
        Self {
            items,
            theme,
            use_icons,
            cursor: 0,
            scroll_offset: 0,
            block: None,
        }
    }

    pub fn cursor(mut self, cursor: usize) -> Self {
        self.cursor = cursor;
        self
    }

    pub fn scroll_offset(mut self, offset: usize) -> Self {
        self.scroll_offset = offset;
        self
    }

    pub fn block(mut self, block: Block<'a>) -> Self {
        self.block = Some(block);
        self
    }

    /// Build the indentation prefix. Continuation lines depend on whether each
    /// ancestor was the last of its siblings.
    fn build_prefix(item: &FlatItem, items: &[FlatItem], item_index: usize) -> String {
        if item.depth == 0 {
            return String::new();
        }

        let mut parts: Vec<&str> = Vec::new();
        for d in 1..item.depth {
            let mut ancestor_is_last = false;
            for j in (0..item_index).rev() {
                if items[j].depth == d {
                    ancestor_is_last = items[j].is_last_sibling;
                    break;
                }
                if items[j].depth < d {
                    break;
                }
            }
            parts.push(if ancestor_is_last { "   " } else { "│  " });
        }
        parts.push(if item.is_last_sibling { "└──" } else { "├──" });
        parts.join("")
    }

    /// Leaves that are not verified can never be selected.
    fn is_locked(item: &FlatItem) -> bool {
        !item.verified && !(item.is_dir && item.load == RowLoad::Ready)
    }

    fn selection_marker(item: &FlatItem) -> &'static str {
        if Self::is_locked(item) {
            return "[·] ";
        }
        match item.selection {
            SelectionState::Selected => "[x] ",
            SelectionState::Partial => "[-] ",
            SelectionState::Unselected => "[ ] ",
        }
    }

    fn item_indicator(&self, item: &FlatItem) -> &'static str {
        match (self.use_icons, item.is_dir) {
            (true, true) if item.is_expanded => " ",
            (true, true) => " ",
            (true, false) => Self::file_icon_by_ext(&item.name),
            (false, true) if item.is_expanded => "▾ ",
            (false, true) => "▸ ",
            (false, false) => "  ",
        }
    }

    /// Nerd Font icon for the data formats a dataset usually holds.
    fn file_icon_by_ext(name: &str) -> &'static str {
        let ext = name.rsplit('.').next().unwrap_or("").to_lowercase();
        match ext.as_str() {
            "csv" | "tsv" | "xlsx" | "xls" | "parquet" => " ",
            "json" | "jsonl" => " ",
            "toml" | "yaml" | "yml" | "ini" | "cfg" => " ",
            "md" | "markdown" | "rst" | "txt" => " ",
            "py" | "ipynb" => " ",
            "h5" | "hdf5" | "nc" | "fits" | "sql" | "db" | "sqlite" => " ",
            "png" | "jpg" | "jpeg" | "gif" | "tif" | "tiff" | "svg" => " ",
            "zip" | "tar" | "gz" | "xz" | "bz2" | "7z" => " ",
            "pdf" => " ",
            _ => " ",
        }
    }

    fn suffix(item: &FlatItem) -> String {
        match &item.load {
            RowLoad::Pending => " …".to_string(),
            RowLoad::Failed(_) => " !".to_string(),
            _ => match item.size {
                Some(size) if !item.is_dir => format!("  {}", format_size(size)),
                _ => String::new(),
            },
        }
    }

    fn name_style(&self, item: &FlatItem) -> Style {
        let mut style = if matches!(item.load, RowLoad::Failed(_)) {
            Style::default().fg(self.theme.error_fg)
        } else if Self::is_locked(item) {
            Style::default().fg(self.theme.tree_unverified_fg)
        } else if item.selection == SelectionState::Selected {
            Style::default().fg(self.theme.tree_selected_fg)
        } else if item.is_dir {
            Style::default()
                .fg(self.theme.tree_dir_fg)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(self.theme.tree_file_fg)
        };
        if item.is_active {
            style = style.add_modifier(Modifier::UNDERLINED);
        }
        style
    }
}

impl<'a> Widget for TreeWidget<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let inner_area = if let Some(block) = &self.block {
            let inner = block.inner(area);
            block.clone().render(area, buf);
            inner
        } else {
            area
        };

        let items = self.items;
        let visible_height = inner_area.height as usize;
        if items.is_empty() || visible_height == 0 {
            return;
        }

        let visible = items
            .iter()
            .enumerate()
            .skip(self.scroll_offset)
            .take(visible_height);

        for (i, (idx, item)) in visible.enumerate() {
            let y = inner_area.y + i as u16;

            let prefix = Self::build_prefix(item, items, idx);
            let marker = Self::selection_marker(item);
            let indicator = self.item_indicator(item);
            let suffix = Self::suffix(item);

            let mut name_style = self.name_style(item);
            let mut chrome_style = Style::default().fg(self.theme.dim_fg);
            if idx == self.cursor {
                let row = Style::default()
                    .bg(self.theme.tree_active_bg)
                    .fg(self.theme.tree_active_fg);
                name_style = name_style.bg(self.theme.tree_active_bg).add_modifier(Modifier::BOLD);
                chrome_style = row;
                buf.set_style(Rect::new(inner_area.x, y, inner_area.width, 1), row);
            }

            let line = Line::from(vec![
                Span::styled(prefix, chrome_style),
                Span::styled(marker, chrome_style),
                Span::styled(format!("{}{}", indicator, item.name), name_style),
                Span::styled(suffix, chrome_style),
            ]);
            buf.set_line(inner_area.x, y, &line, inner_area.width);
        }
    }
}
