use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use cadence_core::catalog::CatalogStatus;
use cadence_core::protocol::{Command, PlaybackSnapshot};
use cadence_core::state::StateManager;
use cadence_core::track::TrackId;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::core::CoreEvent;

#[derive(Clone)]
struct HttpState {
    state_manager: Arc<StateManager>,
    event_tx: mpsc::Sender<CoreEvent>,
}

#[derive(Serialize)]
struct ApiState {
    rev: u64,
    /// "loading", "ready" or "failed".
    catalog: &'static str,
    catalog_error: Option<String>,
    dropped: usize,
    tracks: Vec<TrackInfo>,
    playback: PlaybackSnapshot,
}

#[derive(Serialize)]
struct TrackInfo {
    id: TrackId,
    name: String,
    artist: String,
    duration: String,
    cover_url: String,
}

pub fn start_server(
    bind_address: String,
    port: u16,
    state_manager: Arc<StateManager>,
    event_tx: mpsc::Sender<CoreEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let addr = format!("{}:{}", bind_address, port);
        let listener = match TcpListener::bind(&addr).await {
            Ok(l) => l,
            Err(e) => {
                error!("Failed to bind HTTP server to {}: {}", addr, e);
                return;
            }
        };
        info!("HTTP API server listening on http://{}", addr);

        if let Err(e) = axum::serve(listener, router(state_manager, event_tx)).await {
            error!("HTTP server error: {}", e);
        }
    })
}

fn router(state_manager: Arc<StateManager>, event_tx: mpsc::Sender<CoreEvent>) -> Router {
    Router::new()
        .route("/api/state", get(get_state))
        .route("/api/select/:id", get(select_track).post(select_track))
        .route("/api/toggle", get(toggle_pause).post(toggle_pause))
        .route("/api/next", get(next_track).post(next_track))
        .route("/api/prev", get(prev_track).post(prev_track))
        .route("/api/mute", get(toggle_mute).post(toggle_mute))
        .route("/api/reload", get(reload).post(reload))
        .with_state(HttpState {
            state_manager,
            event_tx,
        })
}

async fn get_state(State(state): State<HttpState>) -> Json<ApiState> {
    let player = state.state_manager.get_state().await;

    let (catalog, dropped) = match &player.catalog {
        CatalogStatus::Loading => ("loading", 0),
        CatalogStatus::Ready { dropped, .. } => ("ready", *dropped),
        CatalogStatus::Failed(_) => ("failed", 0),
    };
    let tracks = player
        .catalog
        .tracks()
        .iter()
        .map(|t| TrackInfo {
            id: t.id,
            name: t.name.clone(),
            artist: t.artist.clone(),
            duration: t.duration.clone(),
            cover_url: t.cover_url.clone(),
        })
        .collect();

    Json(ApiState {
        rev: player.rev,
        catalog,
        catalog_error: player.catalog.error().map(str::to_string),
        dropped,
        tracks,
        playback: player.playback,
    })
}

async fn forward(state: &HttpState, cmd: Command) -> StatusCode {
    info!("HTTP API: {:?}", cmd);
    if state.event_tx.send(CoreEvent::Command(cmd)).await.is_err() {
        error!("HTTP API: player core is gone");
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    StatusCode::OK
}

async fn select_track(State(state): State<HttpState>, Path(id): Path<u64>) -> StatusCode {
    let track_id = TrackId(id);
    let catalog = state.state_manager.get_state().await.catalog;
    // During a reload the session still plays from the previous catalog,
    // so the core decides.
    if !catalog.is_loading() && !catalog.tracks().iter().any(|t| t.id == track_id) {
        return StatusCode::NOT_FOUND;
    }
    forward(&state, Command::Select { track_id }).await
}

async fn toggle_pause(State(state): State<HttpState>) -> StatusCode {
    forward(&state, Command::TogglePause).await
}

async fn next_track(State(state): State<HttpState>) -> StatusCode {
    forward(&state, Command::Next).await
}

async fn prev_track(State(state): State<HttpState>) -> StatusCode {
    forward(&state, Command::Prev).await
}

async fn toggle_mute(State(state): State<HttpState>) -> StatusCode {
    forward(&state, Command::ToggleMute).await
}

async fn reload(State(state): State<HttpState>) -> StatusCode {
    forward(&state, Command::Reload).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::track::Track;

    async fn serve() -> (String, Arc<StateManager>, mpsc::Receiver<CoreEvent>) {
        let state_manager = Arc::new(StateManager::new());
        let (event_tx, event_rx) = mpsc::channel(8);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(Arc::clone(&state_manager), event_tx);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), state_manager, event_rx)
    }

    fn track(id: u64) -> Track {
        Track {
            id: TrackId(id),
            name: format!("song {}", id),
            artist: "artist".into(),
            cover: "c".into(),
            cover_url: "https://assets.test/c".into(),
            url: "u".into(),
            duration_secs: 61.0,
            duration: "1:01".into(),
        }
    }

    #[tokio::test]
    async fn test_state_reports_catalog() {
        let (base, state_manager, _rx) = serve().await;
        state_manager
            .set_catalog(CatalogStatus::Ready {
                tracks: vec![track(1), track(2)].into(),
                dropped: 1,
            })
            .await;

        let body: serde_json::Value = reqwest::get(format!("{}/api/state", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["catalog"], "ready");
        assert_eq!(body["dropped"], 1);
        assert_eq!(body["tracks"][1]["id"], 2);
        assert_eq!(body["tracks"][0]["duration"], "1:01");
        assert_eq!(body["playback"]["state"], "Empty");
    }

    #[tokio::test]
    async fn test_transport_routes_forward_commands() {
        let (base, _state_manager, mut rx) = serve().await;
        let client = reqwest::Client::new();
        let resp = client
            .post(format!("{}/api/next", base))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        assert!(matches!(
            rx.recv().await,
            Some(CoreEvent::Command(Command::Next))
        ));

        client.get(format!("{}/api/mute", base)).send().await.unwrap();
        assert!(matches!(
            rx.recv().await,
            Some(CoreEvent::Command(Command::ToggleMute))
        ));
    }

    #[tokio::test]
    async fn test_select_unknown_track_is_not_found() {
        let (base, state_manager, mut rx) = serve().await;
        state_manager
            .set_catalog(CatalogStatus::Ready {
                tracks: vec![track(1)].into(),
                dropped: 0,
            })
            .await;
        let resp = reqwest::get(format!("{}/api/select/9", base)).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_select_during_reload_is_forwarded() {
        let (base, state_manager, mut rx) = serve().await;
        state_manager
            .set_catalog(CatalogStatus::Ready {
                tracks: vec![track(1), track(2)].into(),
                dropped: 0,
            })
            .await;
        state_manager.set_catalog(CatalogStatus::Loading).await;

        let resp = reqwest::get(format!("{}/api/select/2", base)).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        assert!(matches!(
            rx.recv().await,
            Some(CoreEvent::Command(Command::Select { track_id: TrackId(2) }))
        ));

        state_manager
            .set_catalog(CatalogStatus::Failed("offline".into()))
            .await;
        let resp = reqwest::get(format!("{}/api/select/2", base)).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
    }
}
