mod action;
mod app;
mod app_state;
mod component;
mod components;
mod core;
mod http;
mod mpv;
mod probe;
mod theme;
mod widgets;

use std::time::Duration;

use tokio::sync::{broadcast, mpsc};

/// What the PlayerCore broadcasts to in-process listeners.
#[derive(Debug, Clone)]
pub enum BroadcastMessage {
    /// The PlayerState has changed; receivers should fetch from StateManager.
    StateUpdated,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let data_dir = cadence_core::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;

    let log_path = data_dir.join("cadence.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // Allow RUST_LOG override; default to debug for app code but suppress noisy
    // connection-level DEBUG from HTTP client internals (hyper_util, reqwest).
    let log_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "debug,hyper_util=warn,reqwest=warn,hyper=warn".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    // The TUI owns the terminal; print the log path before it takes over.
    eprintln!("cadence log: {}", log_path.display());

    tracing::info!("cadence starting…");

    if std::env::var_os("CADENCE_USE_SYSTEM_DEPS").is_some() {
        cadence_core::platform::set_use_system_deps(true);
    }

    // ── Load config ──────────────────────────────────────────────────────────
    let config = match cadence_core::config::Config::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("config unreadable, using defaults: {:#}", e);
            cadence_core::config::Config::default()
        }
    };

    // ── Broadcast channel (PlayerCore → TUI) ────────────────────────────────
    let (broadcast_tx, broadcast_rx) = broadcast::channel::<BroadcastMessage>(1024);

    // ── CoreEvent channel (TUI/HTTP/catalog/mpv → PlayerCore) ───────────────
    let (event_tx, event_rx) = mpsc::channel::<core::CoreEvent>(1024);

    // ── Build PlayerCore ─────────────────────────────────────────────────────
    let player_core = core::PlayerCore::new(config.clone(), broadcast_tx, event_tx.clone());
    let state_manager = player_core.state_manager();

    // ── HTTP server ──────────────────────────────────────────────────────────
    if config.http.enabled {
        http::start_server(
            config.http.bind_address.clone(),
            config.http.port,
            state_manager.clone(),
            event_tx.clone(),
        );
    }

    // ── Spawn PlayerCore event loop ──────────────────────────────────────────
    let core_task = tokio::spawn(async move {
        if let Err(e) = player_core.run(event_rx).await {
            tracing::error!("PlayerCore exited with error: {}", e);
        }
    });

    // ── Run TUI ──────────────────────────────────────────────────────────────
    let app = app::App::new(event_tx, state_manager);
    let result = app.run(broadcast_rx).await;

    // Give the core a moment to stop mpv before the runtime goes away.
    if tokio::time::timeout(Duration::from_secs(3), core_task)
        .await
        .is_err()
    {
        tracing::warn!("PlayerCore did not stop within 3s");
    }

    result
}
