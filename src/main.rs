use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod app;
mod config;
mod conversation;
mod gemini;
mod handler;
mod playback;
mod prefs;
mod prompt;
mod speech;
mod tui;
mod ui;

use app::App;
use config::Config;
use tui::EventHandler;

#[tokio::main]
async fn main() -> Result<()> {
    // The TUI owns the terminal, so logs go to a file next to the config
    let _log_guard = init_logging();

    let config = Config::load().unwrap_or_else(|_| Config::new());

    let mut events = EventHandler::new();
    let mut app = App::new(&config, events.speech_sender());

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    info!(version = env!("CARGO_PKG_VERSION"), "easyread started");

    let result = run(&mut terminal, &mut app, &mut events).await;

    tui::restore()?;
    result
}

async fn run(
    terminal: &mut tui::Tui,
    app: &mut App,
    events: &mut EventHandler,
) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        if let Some(event) = events.next().await {
            handler::handle_event(app, event).await?;
        }
    }
    Ok(())
}

fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let dir = Config::log_dir().ok()?;
    std::fs::create_dir_all(&dir).ok()?;
    let appender = tracing_appender::rolling::never(dir, "easyread.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("easyread=info")),
        )
        .with_writer(writer)
        .with_ansi(false)
        .init();

    Some(guard)
}
