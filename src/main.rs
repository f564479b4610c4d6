mod app;
mod components;
mod config;
mod error;
mod event;
mod export;
mod handler;
mod logging;
mod source;
mod theme;
mod tree;
mod tui;
mod ui;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

use crate::app::App;
use crate::config::{AppConfig, ExportConfig, FilterConfig, GeneralConfig};
use crate::event::{Event, EventHandler};
use crate::export::DownloadRequest;
use crate::source::local::LocalSource;
use crate::source::manifest::ManifestSource;
use crate::source::DirectorySource;
use crate::tree::filter::Matcher;
use crate::tree::loader::TreeController;
use crate::tree::node::{NodeId, TreeNode};
use crate::tui::{install_panic_hook, Tui};

/// Browse a large dataset's directory tree lazily and pick files to download.
#[derive(Parser, Debug)]
#[command(name = "dtree", version, about)]
struct Cli {
    /// Dataset directory to browse (defaults to config, then current directory)
    dataset: Option<PathBuf>,

    /// Browse a JSON dataset manifest instead of a directory
    #[arg(long, value_name = "FILE", conflicts_with = "dataset")]
    manifest: Option<PathBuf>,

    /// Explicit config file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Initial filter text; together with --export, select every match,
    /// write the download request and exit without opening the UI
    #[arg(long, value_name = "TEXT")]
    filter: Option<String>,

    /// Use fuzzy matching for the filter
    #[arg(long)]
    fuzzy: bool,

    /// Where the download request is written
    #[arg(long, value_name = "FILE")]
    export: Option<PathBuf>,

    /// Disable mouse support
    #[arg(long)]
    no_mouse: bool,

    /// Log level: error, warn, info, debug, trace
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,
}

impl Cli {
    /// Flags expressed as a partial config layered over the files.
    fn overrides(&self) -> AppConfig {
        AppConfig {
            general: GeneralConfig {
                dataset: self
                    .dataset
                    .as_ref()
                    .map(|p| p.to_string_lossy().to_string()),
                mouse: self.no_mouse.then_some(false),
            },
            filter: FilterConfig {
                mode: self.fuzzy.then(|| "fuzzy".to_string()),
            },
            export: ExportConfig {
                path: self
                    .export
                    .as_ref()
                    .map(|p| p.to_string_lossy().to_string()),
            },
            ..Default::default()
        }
    }
}

fn open_source(cli: &Cli, config: &AppConfig) -> error::Result<Arc<dyn DirectorySource>> {
    if let Some(manifest) = &cli.manifest {
        return Ok(Arc::new(ManifestSource::load(manifest, config.dirs_first())?));
    }
    let root = Path::new(config.dataset());
    Ok(Arc::new(LocalSource::new(root, config.dirs_first())?))
}

/// Topmost matching nodes; selecting a directory already covers its subtree.
fn collect_matches(node: &TreeNode, filter: &str, matcher: &dyn Matcher, acc: &mut Vec<NodeId>) {
    if matcher.matches(filter, node) {
        acc.push(node.id.clone());
        return;
    }
    for child in node.children().unwrap_or_default() {
        collect_matches(child, filter, matcher, acc);
    }
}

/// Headless mode: load the roots, expand everything the filter reaches,
/// select the matches and write the download request.
async fn run_headless(
    source: &dyn DirectorySource,
    config: &AppConfig,
    filter: &str,
) -> error::Result<()> {
    let mut controller = TreeController::new(config.match_mode().matcher(), false);
    controller.load_roots(source).await?;

    // Breadth-first materialization so the filter sees the whole dataset.
    let mut frontier: Vec<_> = controller
        .authoritative()
        .roots
        .iter()
        .filter(|n| n.is_dir())
        .map(|n| n.id.clone())
        .collect();
    while let Some(id) = frontier.pop() {
        controller.expand(source, &id).await?;
        if let Some(children) = controller.authoritative().find(&id).and_then(|n| n.children()) {
            frontier.extend(children.iter().filter(|c| c.is_dir()).map(|c| c.id.clone()));
        }
    }

    controller.set_filter_text(filter);
    let matcher = config.match_mode().matcher();
    let mut matched = Vec::new();
    for root in &controller.displayed().roots {
        collect_matches(root, filter, matcher.as_ref(), &mut matched);
    }
    for id in &matched {
        controller.toggle_selection(id)?;
    }

    let request = DownloadRequest::from_selection(source.dataset(), &controller.selected_items());
    let path = config.export_path();
    request.write_to(&path)?;
    println!(
        "{} item(s) matching {:?} written to {}",
        request.items.len(),
        filter,
        path.display()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> error::Result<()> {
    let cli = Cli::parse();
    let _log_guard = logging::init(logging::parse_level(cli.log_level.as_deref()));

    let config = AppConfig::load(cli.config.as_deref(), Some(&cli.overrides()));
    let source = open_source(&cli, &config)?;
    info!(dataset = source.dataset(), "starting dtree");

    if let (Some(filter), Some(_)) = (&cli.filter, &cli.export) {
        return run_headless(source.as_ref(), &config, filter).await;
    }

    install_panic_hook();

    let mut events = EventHandler::new(Duration::from_millis(16));
    let mut app = App::new(source, &config, events.sender());
    let mut tui = Tui::new(app.mouse_enabled)?;

    app.request_roots();
    if let Some(filter) = &cli.filter {
        app.start_filter();
        for c in filter.chars() {
            app.filter_input_char(c);
        }
        app.accept_filter();
    }

    loop {
        tui.terminal_mut().draw(|frame| {
            ui::render(&mut app, frame);
        })?;

        match events.next().await? {
            Event::Key(key) => handler::handle_key_event(&mut app, key),
            Event::Mouse(mouse) => handler::handle_mouse_event(&mut app, mouse),
            Event::Tick => app.clear_expired_status(),
            Event::Resize(_, _) => {}
            Event::RootsLoaded { request, result } => app.handle_roots_loaded(request, result),
            Event::ChildrenLoaded { request, result } => {
                app.handle_children_loaded(request, result)
            }
        }

        if app.should_quit {
            break;
        }
    }

    if let Err(e) = tui.restore() {
        warn!(error = %e, "failed to restore terminal");
    }
    info!("exiting");
    Ok(())
}
