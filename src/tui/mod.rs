pub mod app;
pub mod ui;
pub mod widgets;

use crate::config::Config;
use crate::engine::ScanEngine;
use crate::narration::GuideNarrator;
use crate::transport::SourceKind;
use anyhow::Result;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::LevelFilter;
use ratatui::prelude::*;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

pub use app::App;

/// Setup terminal for TUI mode
fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

/// Restore terminal to normal mode
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

/// Run the TUI dashboard over a live scan
pub async fn run_tui(config: Config, source: SourceKind) -> Result<()> {
    // Disable logging to prevent interference with TUI display
    log::set_max_level(LevelFilter::Off);

    let running = Arc::new(AtomicBool::new(true));

    // Advertisement source -> engine -> TUI event channel
    let (advert_tx, advert_rx) = mpsc::channel(256);
    let (event_tx, event_rx) = mpsc::channel(1000);

    let source_handle = source.spawn(&config, advert_tx, running.clone());

    let narrator = GuideNarrator::load(&config.narration.content)?;
    let narration_enabled = config.narration.enabled;
    let reference_power_dbm = config.calibration.reference_power_dbm;
    let path_loss_exponent = config.calibration.path_loss_exponent;

    let engine = ScanEngine::new(config, running.clone());
    let engine_handle = tokio::spawn(async move { engine.run(advert_rx, event_tx).await });

    // Setup panic hook to restore terminal
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        original_hook(panic);
    }));

    let mut app = App::new(
        event_rx,
        narrator,
        narration_enabled,
        reference_power_dbm,
        path_loss_exponent,
    );

    let mut terminal = setup_terminal()?;

    // Run event loop
    let tick_rate = Duration::from_millis(50); // 20 FPS for efficiency
    let result = run_event_loop(&mut terminal, &mut app, tick_rate, running.clone());

    // Cleanup: stop the engine and the source before leaving the screen
    running.store(false, Ordering::SeqCst);
    restore_terminal(&mut terminal)?;

    let _ = engine_handle.await;
    source_handle.abort();

    result
}

fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    tick_rate: Duration,
    running: Arc<AtomicBool>,
) -> Result<()> {
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        let timeout = tick_rate.saturating_sub(last_tick.elapsed());

        if crossterm::event::poll(timeout)? {
            if let Event::Key(key) = crossterm::event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') => {
                            app.running = false;
                        }
                        KeyCode::Char('?') => {
                            app.show_help = !app.show_help;
                        }
                        KeyCode::Up | KeyCode::Char('k') => {
                            app.scroll_up();
                        }
                        KeyCode::Down | KeyCode::Char('j') => {
                            app.scroll_down();
                        }
                        KeyCode::Char('n') => {
                            app.toggle_narration();
                        }
                        KeyCode::Char('r') => {
                            app.repeat_narration();
                        }
                        KeyCode::Esc => {
                            if app.show_help {
                                app.show_help = false;
                            }
                        }
                        _ => {}
                    }
                }
            }
        }

        // Drain engine events published since the last frame
        while let Ok(event) = app.event_rx.try_recv() {
            app.handle_event(event);
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }

        if !app.running {
            running.store(false, Ordering::SeqCst);
            break;
        }
    }

    Ok(())
}
