mod auth;
mod bus;
mod config;
mod controller;
mod error;
mod http;
mod json;
mod logging;
mod model;
mod view;

use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tokio::sync::{Mutex, mpsc};

use auth::TokenManager;
use bus::{NotificationBus, SharedBus};
use controller::{AppController, CommandDispatcher, PlaybackSync};
use error::SessionError;
use http::{ReqwestTransport, RetryPolicy, Session};
use model::{Endpoints, PlayingFlag, UiState};
use view::{AppView, Screen};

/// Depth of the encoder event queue.
const INPUT_QUEUE_DEPTH: usize = 8;

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = logging::init_logging() {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    tracing::info!("=== spotify-remote starting ===");

    let config = config::load_config()?;
    tracing::info!(
        api_base = %config.api_base,
        market = %config.market,
        poll_interval_ms = config.poll_interval_ms,
        retry_ceiling = config.retry_ceiling,
        "Configuration loaded"
    );

    let transport = ReqwestTransport::new(config.request_timeout())?;
    let tokens = TokenManager::new(config.credentials(), config.token_url.clone(), config.token_skew());
    let session = Session::new(
        Box::new(transport),
        tokens,
        RetryPolicy::new(config.retry_ceiling, config.retry_delay()),
        config.body_capacity,
    )
    .shared();

    let bus = NotificationBus::shared();
    let endpoints = Endpoints::new(config.api_base.clone(), config.market.clone());
    let playing = PlayingFlag::default();

    let sync = PlaybackSync::new(
        session.clone(),
        bus.clone(),
        endpoints.clone(),
        playing.clone(),
        config.poll_interval(),
    );
    let dispatcher = CommandDispatcher::new(session, bus.clone(), endpoints, playing)
        .with_delays(config.settle_delay(), config.rotate_debounce())
        .with_playlists(config.playlist_limit, config.object_capacity);

    let (input_tx, input_rx) = mpsc::channel(INPUT_QUEUE_DEPTH);
    let model = Arc::new(Mutex::new(UiState::default()));
    let controller = AppController::new(model.clone(), dispatcher.clone(), input_tx, bus.clone());

    let sync_controller = controller.clone();
    tokio::spawn(async move {
        if let Err(e) = sync.run().await {
            sync_controller.report_fatal(e).await;
        }
    });

    let dispatch_controller = controller.clone();
    tokio::spawn(async move {
        if let Err(e) = dispatcher.run(input_rx).await {
            dispatch_controller.report_fatal(e).await;
        }
    });

    // First poll right away rather than after a full interval.
    bus.wake();

    tracing::info!("Starting TUI...");

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, model, bus, controller).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    match res {
        Ok(Some(fatal)) => {
            tracing::warn!(error = %fatal, "Exiting for restart");
            eprintln!("spotify-remote: {fatal}");
            std::process::exit(1);
        }
        Ok(None) => {}
        Err(err) => tracing::error!(error = ?err, "Application error"),
    }

    tracing::info!("spotify-remote shutting down");
    Ok(())
}

/// Draw and read keys until quit or a fatal session error, which is returned.
async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    model: Arc<Mutex<UiState>>,
    bus: SharedBus,
    controller: AppController,
) -> io::Result<Option<SessionError>> {
    let snapshots = bus.subscribe_snapshot();
    let devices = bus.subscribe_devices();
    let events = bus.subscribe_events();

    loop {
        let ui_state = model.lock().await.clone();
        if let Some(fatal) = ui_state.fatal.clone() {
            return Ok(Some(fatal));
        }
        if ui_state.should_quit {
            return Ok(None);
        }

        let track = snapshots.borrow().clone();
        let device_list = devices.borrow().clone();
        let last_event = events.borrow().clone();
        let polling = bus.polling();

        terminal.draw(|f| {
            let screen = Screen {
                track: &track,
                ui_state: &ui_state,
                devices: device_list.as_deref(),
                last_event: last_event.as_ref(),
                polling,
            };
            AppView::render(f, &screen);
        })?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if let Err(e) = controller.handle_key_event(key).await {
                    tracing::warn!(error = %e, "Key handling failed");
                }
            }
        }
    }
}
