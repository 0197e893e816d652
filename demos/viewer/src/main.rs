//! Morpheo viewer
//!
//! Renders a generated app config as a live terminal UI:
//! 1. The config is normalized and mounted into a `ComponentRuntime`
//! 2. Keys are routed to the focused component (events, inputs, behaviors)
//! 3. Actions dispatched by handlers land in a `Store`
//! 4. `setTimeout` work is scheduled on tokio and fed back into the runtime
//!
//! Keys: Tab/Shift-Tab = focus, Enter/Space = activate, +/- = counter,
//! typing edits the focused input, Esc = quit
//!
//! ```sh
//! cargo run -p morpheo-viewer -- --config app.json --log viewer.log
//! ```

mod viewer;

use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use morpheo::prelude::*;
use morpheo::{FileStorage, PersistOptions, ScheduledWork};
use ratatui::{backend::CrosstermBackend, Terminal};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::viewer::{KeyOutcome, Viewer};

/// Render a generated app config in the terminal
#[derive(Parser, Debug)]
#[command(name = "morpheo-viewer")]
#[command(about = "Render a generated app config as a terminal UI")]
struct Args {
    /// Path to the app config JSON
    #[arg(long, short)]
    config: PathBuf,

    /// Write logs to this file (filtered by RUST_LOG, default "info")
    #[arg(long)]
    log: Option<PathBuf>,

    /// Event poll interval in milliseconds
    #[arg(long, default_value = "16")]
    tick_ms: u64,

    /// Persist dispatched app state in this directory
    #[arg(long)]
    state_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> io::Result<()> {
    let args = Args::parse();
    if let Some(path) = &args.log {
        init_logging(path)?;
    }

    let registry = morpheo::registry().map_err(io::Error::other)?;
    let (viewer, name) = load(registry, &args.config);
    let store = app_store(&name, args.state_dir.as_deref());

    // ===== Terminal setup =====
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, viewer, store, Duration::from_millis(args.tick_ms)).await;

    // ===== Cleanup =====
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

/// The terminal belongs to the UI, so logs go to a file
fn init_logging(path: &std::path::Path) -> io::Result<()> {
    let file = File::create(path)?;
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .init();
    Ok(())
}

/// Read and mount the config; failures become an on-screen message
fn load(registry: Arc<ComponentRegistry>, path: &std::path::Path) -> (Viewer, String) {
    let parsed = std::fs::read_to_string(path)
        .map_err(|e| format!("{}: {e}", path.display()))
        .and_then(|text| serde_json::from_str::<Value>(&text).map_err(|e| e.to_string()));
    match parsed {
        Ok(raw) => {
            let config = AppConfig::from_value(&raw);
            info!(
                app = %config.app.name,
                components = config.components.len(),
                "Loaded app config"
            );
            let name = if config.app.name.is_empty() {
                "app".to_string()
            } else {
                config.app.name.clone()
            };
            (Viewer::new(registry, &config, &raw), name)
        }
        Err(message) => {
            warn!(error = %message, "Failed to load app config");
            (Viewer::failed(registry, &message), "app".to_string())
        }
    }
}

/// Records the latest payload of every action kind
fn record(state: &Value, action: &StateAction) -> Option<Value> {
    let mut next = state.clone();
    let object = next.as_object_mut()?;
    let payload = action.payload_value().cloned().unwrap_or(Value::Null);
    if object.get(&action.kind) == Some(&payload) {
        return None;
    }
    object.insert(action.kind.clone(), payload);
    Some(next)
}

fn app_store(name: &str, state_dir: Option<&std::path::Path>) -> Store<Value> {
    let store = Store::new(json!({}))
        .with_reducer("record", record)
        .with_middleware(LoggingMiddleware::new())
        .with_middleware(ThunkMiddleware);
    match state_dir {
        Some(dir) => store.with_persistence(PersistOptions::new(
            name,
            Arc::new(FileStorage::new(dir)),
        )),
        None => store,
    }
}

async fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    mut viewer: Viewer,
    mut store: Store<Value>,
    tick: Duration,
) -> io::Result<()> {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();
    let (work_tx, mut work_rx) = mpsc::unbounded_channel::<ScheduledWork>();
    let cancel_token = CancellationToken::new();
    let _handle = spawn_event_poller(event_tx, tick, cancel_token.clone());

    let mut should_render = true;

    loop {
        if should_render {
            terminal.draw(|frame| viewer.render(frame, frame.area()))?;
            should_render = false;
        }

        tokio::select! {
            Some(event) = event_rx.recv() => {
                match event {
                    Event::Key(key) if key.kind == event::KeyEventKind::Press => {
                        match viewer.handle_key(key) {
                            KeyOutcome::Quit => break,
                            KeyOutcome::Changed => should_render = true,
                            KeyOutcome::Ignored => {}
                        }
                    }
                    Event::Resize(..) => should_render = true,
                    _ => {}
                }
            }

            Some(work) = work_rx.recv() => {
                debug!(component = %work.component_id, "Running scheduled work");
                viewer.runtime_mut().run_scheduled(work);
                should_render = true;
            }
        }

        for work in viewer.runtime_mut().take_scheduled() {
            let work_tx = work_tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(work.delay).await;
                let _ = work_tx.send(work);
            });
        }
        for action in viewer.runtime_mut().take_dispatched() {
            let kind = action.kind.clone();
            if store.dispatch(action) {
                viewer.set_status(format!("dispatched {kind}"));
                should_render = true;
            }
        }
        if store.process_pending() {
            should_render = true;
        }
    }

    cancel_token.cancel();
    Ok(())
}

/// Forward terminal events until cancelled
fn spawn_event_poller(
    tx: mpsc::UnboundedSender<Event>,
    loop_sleep: Duration,
    cancel_token: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        const MAX_EVENTS_PER_BATCH: usize = 20;

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    while event::poll(Duration::ZERO).unwrap_or(false) {
                        let _ = event::read();
                    }
                    break;
                }
                _ = tokio::time::sleep(loop_sleep) => {
                    let mut processed = 0;
                    while processed < MAX_EVENTS_PER_BATCH
                        && event::poll(Duration::ZERO).unwrap_or(false)
                    {
                        processed += 1;
                        if let Ok(evt) = event::read() {
                            if tx.send(evt).is_err() {
                                debug!("Event channel closed, stopping poller");
                                return;
                            }
                        }
                    }
                }
            }
        }
    })
}
