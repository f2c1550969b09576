//! Saga story-setup wizard.
//!
//! A vim-style terminal interface for building a world, a character and an
//! opening scenario with the story backend, then handing off to the
//! narrative session.
//!
//! # Headless Mode
//!
//! Run with `--headless` for a line-oriented interface suitable for scripts
//! and automated testing:
//!
//! ```bash
//! cargo run -p saga -- --headless --slot 2
//! ```

mod app;
mod events;
mod headless;
mod ui;

use std::io::{self, stdout, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use saga_api::StoryApi;
use saga_core::{spawn_worker, ClientStore, HandOff, WizardConfig, WizardEvent};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use app::{App, SlotAction};
use events::{handle_event, EventResult};
use ui::render::render;

/// Saga - conversational story setup
#[derive(Debug, Parser)]
#[command(name = "saga")]
#[command(about = "Build a world, a character and a story seed, then start the story")]
#[command(version)]
struct Cli {
    /// Open this slot directly instead of showing the slot selector
    #[arg(long)]
    slot: Option<u32>,

    /// Backend base URL (overrides SAGA_API_URL)
    #[arg(long)]
    api_url: Option<String>,

    /// Model to request from the backend (overrides SAGA_MODEL)
    #[arg(long)]
    model: Option<String>,

    /// Directory for the client store and logs (overrides SAGA_DATA_DIR)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Run the line-oriented headless mode instead of the TUI
    #[arg(long)]
    headless: bool,

    /// Log at debug level unless SAGA_LOG is set
    #[arg(long)]
    debug: bool,
}

impl Cli {
    /// Environment configuration with command-line overrides applied.
    fn config(&self) -> Result<WizardConfig> {
        let mut config = WizardConfig::from_env().context("reading SAGA_* configuration")?;
        if let Some(url) = &self.api_url {
            config = config.with_api_base(url.clone());
        }
        if let Some(model) = &self.model {
            config = config.with_model(model.clone());
        }
        if let Some(dir) = &self.data_dir {
            config = config.with_data_dir(dir.clone());
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = cli.config()?;
    let _log_guard = init_tracing(&config, cli.headless, cli.debug);

    let store = ClientStore::open(config.store_path())
        .await
        .with_context(|| format!("opening client store at {}", config.store_path().display()))?;
    let api = Arc::new(StoryApi::new(config.api_base.clone()).context("building API client")?);
    tracing::info!(api = %config.api_base, data_dir = %config.data_dir.display(), "starting saga");

    if let Some(handoff) = recover_bootstrap(&store).await {
        return deliver_handoff(&store, &handoff, &mut stdout()).await;
    }

    if cli.headless {
        let slot = match cli.slot {
            Some(slot) => slot,
            None => store.active_slot().await.unwrap_or(1),
        };
        return headless::run_headless(api, store, &config, slot).await;
    }

    run_tui(api, store, config, cli.slot).await
}

/// Install the global subscriber.
///
/// The TUI owns the terminal, so it logs to a daily file under the data
/// directory; headless mode logs to stderr.
fn init_tracing(config: &WizardConfig, headless: bool, debug: bool) -> Option<WorkerGuard> {
    let default_level = if debug { "saga=debug" } else { "saga=info" };
    let filter =
        EnvFilter::try_from_env("SAGA_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));

    if headless {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(io::stderr))
            .init();
        None
    } else {
        let appender = tracing_appender::rolling::daily(config.log_dir(), "saga.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_ansi(false).with_writer(writer))
            .init();
        Some(guard)
    }
}

/// A session bootstrapped by an earlier run but never delivered.
///
/// Records older than the bootstrap expiry are discarded.
async fn recover_bootstrap(store: &ClientStore) -> Option<HandOff> {
    let record = store.pending_bootstrap().await?;
    if record.is_stale(Utc::now()) {
        tracing::info!(slot = record.slot, "discarding stale pending bootstrap");
        if let Err(e) = store.clear_pending_bootstrap().await {
            tracing::warn!(error = %e, "failed to clear pending bootstrap");
        }
        return None;
    }

    tracing::info!(slot = record.slot, session_id = %record.session_id, "recovering pending bootstrap");
    Some(HandOff {
        slot: record.slot,
        session_id: record.session_id,
    })
}

/// Write the session for the narrative client, then retire the bootstrap
/// record.
///
/// The record outlives everything up to the flushed session id, so a crash
/// or a closed stdout before that point is recovered on the next launch.
async fn deliver_handoff<W: Write>(
    store: &ClientStore,
    handoff: &HandOff,
    out: &mut W,
) -> Result<()> {
    writeln!(out, "Your story is ready.")?;
    writeln!(out, "  Slot:    {}", handoff.slot)?;
    writeln!(out, "  Session: {}", handoff.session_id)?;
    out.flush()?;

    if let Err(e) = store.clear_pending_bootstrap().await {
        tracing::warn!(error = %e, "failed to clear pending bootstrap");
    }
    Ok(())
}

async fn run_tui(
    api: Arc<StoryApi>,
    store: ClientStore,
    config: WizardConfig,
    slot: Option<u32>,
) -> Result<()> {
    let (effect_tx, event_rx) = spawn_worker(api.clone(), store.clone());
    let mut app = App::new(config, effect_tx, event_rx);

    match slot {
        Some(slot) => app.begin_wizard(slot, WizardEvent::ResumeSession),
        None => {
            app.preselect_slot(store.active_slot().await);
            app.queue_slot_action(SlotAction::Refresh);
        }
    }

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app, api.as_ref()).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    result?;

    if let Some(handoff) = app.handoff().cloned() {
        // Let the worker write the bootstrap record before it is consumed.
        app.shutdown().await;
        deliver_handoff(&store, &handoff, &mut io::stdout()).await?;
    }

    Ok(())
}

async fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    api: &StoryApi,
) -> io::Result<()> {
    loop {
        app.drain_worker_events();
        if app.handoff().is_some() || app.should_quit {
            return Ok(());
        }

        terminal.draw(|f| render(f, app))?;

        // Slot list operations happen before the wizard exists, so they run inline
        if let Some(action) = app.take_slot_action() {
            app.set_status("Working...");
            terminal.draw(|f| render(f, app))?;
            run_slot_action(app, api, action).await;
            continue;
        }

        // Poll for events with timeout so the wait screen keeps ticking
        if event::poll(Duration::from_millis(100))? {
            let ev = event::read()?;
            if handle_event(app, ev) == EventResult::Quit {
                return Ok(());
            }
        } else {
            app.tick();
        }
    }
}

async fn run_slot_action(app: &mut App, api: &StoryApi, action: SlotAction) {
    match action {
        SlotAction::Refresh => match api.list_slots().await {
            Ok(slots) => {
                app.set_slots(slots);
                app.clear_status();
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to list slots");
                app.set_status(format!("Could not load slots: {e}"));
            }
        },
        SlotAction::Reset { slot, start_after } => match api.reset_slot(slot).await {
            Ok(()) if start_after => {
                tracing::info!(slot, "slot reset for a new story");
                app.clear_status();
                app.begin_wizard(slot, WizardEvent::StartSession);
            }
            Ok(()) => {
                tracing::info!(slot, "slot reset");
                match api.list_slots().await {
                    Ok(slots) => app.set_slots(slots),
                    Err(e) => tracing::warn!(error = %e, "failed to refresh slots after reset"),
                }
                app.set_status(format!("Slot {slot} reset"));
            }
            Err(e) => {
                tracing::error!(slot, error = %e, "failed to reset slot");
                app.set_status(format!("Reset failed: {e}"));
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use saga_core::PendingBootstrap;

    /// Rejects every write, like a closed pipe.
    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_record_cleared_only_after_delivery() {
        let store = ClientStore::in_memory();
        store
            .set_pending_bootstrap(&PendingBootstrap::new(2, "sess-7"))
            .await
            .unwrap();

        let handoff = recover_bootstrap(&store).await.unwrap();
        assert_eq!(handoff.session_id, "sess-7");
        assert!(store.pending_bootstrap().await.is_some());

        assert!(deliver_handoff(&store, &handoff, &mut ClosedPipe).await.is_err());
        assert!(store.pending_bootstrap().await.is_some());

        let mut out = Vec::new();
        deliver_handoff(&store, &handoff, &mut out).await.unwrap();
        assert!(String::from_utf8(out).unwrap().contains("Session: sess-7"));
        assert!(store.pending_bootstrap().await.is_none());
    }

    #[tokio::test]
    async fn test_stale_record_is_discarded() {
        let store = ClientStore::in_memory();
        let mut record = PendingBootstrap::new(2, "sess-old");
        record.created_at = Utc::now() - chrono::Duration::hours(2);
        store.set_pending_bootstrap(&record).await.unwrap();

        assert!(recover_bootstrap(&store).await.is_none());
        assert!(store.pending_bootstrap().await.is_none());
    }
}
