// src/main.rs

use color_eyre::eyre::{bail, Result, WrapErr};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::prelude::*;
use std::io::stdout;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use vanguard_recon::{logging, MemoryScanStore, ScanOrchestrator, ScanStore, Settings};

mod app;
mod ui;

use app::{target_from_input, App, AppState};

const TICK: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    // `vanguard-recon <domain>` runs one scan without the TUI.
    let target = std::env::args().nth(1);
    logging::initialize_logging(target.is_some()).wrap_err("failed to initialize logging")?;

    let settings = Settings::load_with_env().wrap_err("failed to load configuration")?;
    let store: Arc<dyn ScanStore> = Arc::new(MemoryScanStore::new());
    let orchestrator = Arc::new(ScanOrchestrator::from_settings(store, &settings)?);

    match target {
        Some(raw) => run_headless(&orchestrator, &settings, &raw).await,
        None => run_tui(&orchestrator, &settings).await,
    }
}

/// Runs a single scan and prints the final snapshot as JSON.
async fn run_headless(orchestrator: &Arc<ScanOrchestrator>, settings: &Settings, raw: &str) -> Result<()> {
    let Some(domain) = target_from_input(raw) else {
        bail!("no target domain given");
    };
    info!(target = %domain, "Running headless scan.");

    let (record, handle) = orchestrator.submit(&domain, settings.stages).await?;
    if let Err(e) = handle.await? {
        error!(scan_id = %record.id, error = %e, "Scan ended with a failure.");
    }

    let snapshot = orchestrator.store().snapshot(record.id).await?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

async fn run_tui(orchestrator: &Arc<ScanOrchestrator>, settings: &Settings) -> Result<()> {
    // --- Setup ---
    stdout().execute(EnterAlternateScreen)?;
    stdout().execute(EnableMouseCapture)?;
    enable_raw_mode()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    terminal.clear()?;

    let result = event_loop(&mut terminal, orchestrator, settings).await;

    // --- Restore Terminal ---
    stdout().execute(LeaveAlternateScreen)?;
    stdout().execute(DisableMouseCapture)?;
    disable_raw_mode()?;
    result
}

async fn event_loop<B: Backend>(
    terminal: &mut Terminal<B>,
    orchestrator: &Arc<ScanOrchestrator>,
    settings: &Settings,
) -> Result<()> {
    let mut app = App::new();
    let store = orchestrator.store();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(&mut app, frame))?;

        if event::poll(TICK)? {
            handle_events(&mut app, orchestrator, settings).await?;
        }

        app.on_tick();
        if let (AppState::Scanning, Some(scan_id)) = (app.state, app.scan_id) {
            match store.snapshot(scan_id).await {
                Ok(snapshot) => app.update_snapshot(snapshot),
                Err(e) => error!(scan_id = %scan_id, error = %e, "Could not poll scan."),
            }
        }
    }
    Ok(())
}

async fn handle_events(app: &mut App, orchestrator: &Arc<ScanOrchestrator>, settings: &Settings) -> Result<()> {
    if let Event::Key(key) = event::read()? {
        if key.kind == KeyEventKind::Press {
            match app.state {
                AppState::Disclaimer => match key.code {
                    KeyCode::Enter => app.state = AppState::Idle,
                    KeyCode::Esc | KeyCode::Char('q') => app.quit(),
                    _ => {}
                },
                AppState::Idle => handle_idle_input(app, key.code, orchestrator, settings).await?,
                AppState::Scanning | AppState::Finished => handle_report_input(app, key.code),
            }
        }
    }
    Ok(())
}

/// Typing the target. `q` is a valid character here, so Esc quits.
async fn handle_idle_input(
    app: &mut App,
    key_code: KeyCode,
    orchestrator: &Arc<ScanOrchestrator>,
    settings: &Settings,
) -> Result<()> {
    match key_code {
        KeyCode::Esc => app.quit(),
        KeyCode::Char(c) => app.input.push(c),
        KeyCode::Backspace => {
            app.input.pop();
        }
        KeyCode::Enter => {
            let Some(domain) = target_from_input(&app.input) else {
                return Ok(());
            };
            app.input = domain.clone();
            let (record, _handle) = orchestrator.submit(&domain, settings.stages).await?;
            app.start_scan(record.id);
        }
        _ => {}
    }
    Ok(())
}

fn handle_report_input(app: &mut App, key_code: KeyCode) {
    match key_code {
        KeyCode::Char('q') => app.quit(),
        KeyCode::Char('l') => app.toggle_logs(),
        KeyCode::Left => app.scroll_logs_left(),
        KeyCode::Right => app.scroll_logs_right(),
        KeyCode::Char('n') if app.state == AppState::Finished => app.reset(),
        KeyCode::Up => app.select_previous(),
        KeyCode::Down => app.select_next(),
        _ => {}
    }
}
