//! newsfaces-live — a live-updating "people in the news" board for the
//! terminal.
//!
//! ## Architecture overview
//!
//! ```text
//! ┌──────────┐  SyncView  ┌──────────┐  draw()  ┌──────────┐
//! │  sync/   │ ─────────► │  app.rs  │ ───────► │  ui.rs   │
//! │ (thread) │  (watch)   │ (state)  │          │ (render) │
//! └──────────┘            └──────────┘          └──────────┘
//!      ▲ refresh               ▲
//!      │                       │ handle_key_event()
//!      └──── main loop    ┌──────────┐
//!                         │ input.rs │
//!                         └──────────┘
//! ```
//!
//! * **`source/`** — the `CardSource` / `PushSource` traits, the card model,
//!   and the HTTP + server-sent-event implementations.
//! * **`sync/`** — the orchestrator: initial fetch, push channel with
//!   reconnect, polling fallback, health heartbeat, change detection.
//! * **`app`** — owns presentation state (current view, selection, flips).
//! * **`ui`** — pure rendering: reads `App` state and draws widgets.
//! * **`input`** — maps key events to `App` mutations.
//! * **`config`** / **`logging`** — environment settings and the log file.
//! * **`main`** — wires everything together: load config, set up the
//!   terminal, and run the event loop.

mod app;
mod config;
mod error;
mod input;
mod logging;
mod source;
mod sync;
mod ui;

use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing::info;

use app::App;
use config::Config;
use source::{HttpCardSource, HttpPushSource};
use sync::SyncSettings;

// ---------------------------------------------------------------------------
// RAII terminal guard — idiomatic cleanup even on panic
// ---------------------------------------------------------------------------

/// Manages terminal raw-mode and alternate-screen lifetime via [`Drop`].
///
/// Constructing this struct enters raw mode + alternate screen.  When the
/// value is dropped (normally or during stack unwinding) it restores the
/// terminal.
struct TerminalGuard {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
}

impl TerminalGuard {
    fn new() -> Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;
        Ok(Self { terminal })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

/// Restore the terminal before the panic message is printed.
fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(info);
    }));
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    install_panic_hook();

    // -- configuration and logging -------------------------------------------
    let config = Config::load(std::env::args().nth(1))?;
    logging::init(&config.log_file)?;
    info!(api_base = %config.api_base, "newsfaces-live starting");

    // -- data sources --------------------------------------------------------
    let cards = Arc::new(HttpCardSource::new(config.cards_url(), config.request_timeout)?);
    let push = Arc::new(HttpPushSource::new(config.events_url(), config.request_timeout)?);

    // -- start background sync -----------------------------------------------
    let mut handle = sync::spawn(cards, push, SyncSettings::default())?;

    // -- terminal setup (RAII — Drop restores on exit or panic) --------------
    let mut guard = TerminalGuard::new()?;
    let mut app = App::new(handle.poll_view().unwrap_or_else(sync::SyncView::initial));

    // -- main event loop -----------------------------------------------------
    // ~10 fps: take the latest view, render, then wait up to one tick for a key.
    let tick_rate = Duration::from_millis(100);

    loop {
        if let Some(view) = handle.poll_view() {
            app.apply_view(view);
        }
        if std::mem::take(&mut app.refresh_requested) {
            handle.refresh();
        }

        guard.terminal.draw(|f| ui::draw(&mut app, f))?;

        if event::poll(tick_rate)? {
            if let Event::Key(key) = event::read()? {
                input::handle_key_event(&mut app, key);
            }
        }

        if app.quit {
            break;
        }
    }

    drop(guard);
    handle.shutdown()?;
    info!("newsfaces-live exited");
    Ok(())
}
