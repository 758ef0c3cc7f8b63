/// PlayerCore: single-owner event loop for all mutable playback state.
///
/// The TUI, the HTTP API, the catalog loader and the mpv reader all feed
/// `CoreEvent`s into one channel. PlayerCore owns the `PlaybackSession`, the
/// `MpvEngine` and the `MpvDriver`; nothing else touches them. After every
/// event that changes the session, the new snapshot is written to the
/// `StateManager` and a `BroadcastMessage::StateUpdated` goes out.
///
/// The 10-second heartbeat only checks mpv liveness. When mpv dies, or was
/// never started, it is (re)spawned and the current track is mounted again.
use std::sync::Arc;

use cadence_core::catalog::{CatalogStatus, CatalogStore};
use cadence_core::config::Config;
use cadence_core::protocol::Command;
use cadence_core::session::{AudioEngine, PlaybackSession};
use cadence_core::state::StateManager;
use cadence_core::track::{Catalog, Track};
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::mpv::{command_pump, MpvDriver, MpvEngine, MpvEvent, MpvHandle};
use crate::probe::FfprobeDuration;
use crate::BroadcastMessage;

/// All inputs into the PlayerCore loop.
#[derive(Debug)]
pub enum CoreEvent {
    /// From the TUI or the HTTP API.
    Command(Command),
    /// A catalog load finished (successfully or not).
    CatalogLoaded(CatalogStatus),
    /// Unsolicited mpv event, forwarded from the reader task.
    Mpv(MpvEvent),
    HeartbeatTick,
    Shutdown,
}

pub struct PlayerCore {
    config: Config,
    state_manager: Arc<StateManager>,
    session: PlaybackSession,
    engine: MpvEngine,
    driver: MpvDriver,
    handle_tx: watch::Sender<Option<MpvHandle>>,
    connected: bool,
    /// Consecutive failed mpv starts; reset on success.
    mpv_failures: u32,
    catalog_loading: bool,
    event_tx: mpsc::Sender<CoreEvent>,
    broadcast_tx: broadcast::Sender<BroadcastMessage>,
}

impl PlayerCore {
    pub fn new(
        config: Config,
        broadcast_tx: broadcast::Sender<BroadcastMessage>,
        event_tx: mpsc::Sender<CoreEvent>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (handle_tx, handle_rx) = watch::channel(None);
        tokio::spawn(command_pump(cmd_rx, handle_rx));

        let driver = MpvDriver::new(config.mpv.default_volume, config.mpv.binary.clone());
        Self {
            config,
            state_manager: Arc::new(StateManager::new()),
            session: PlaybackSession::new(),
            engine: MpvEngine::new(cmd_tx),
            driver,
            handle_tx,
            connected: false,
            mpv_failures: 0,
            catalog_loading: false,
            event_tx,
            broadcast_tx,
        }
    }

    /// Shared read-only view for the TUI and the HTTP server.
    pub fn state_manager(&self) -> Arc<StateManager> {
        Arc::clone(&self.state_manager)
    }

    /// Returns when `Shutdown` arrives or every sender is gone.
    pub async fn run(mut self, mut event_rx: mpsc::Receiver<CoreEvent>) -> anyhow::Result<()> {
        info!("PlayerCore: starting event loop");

        let heartbeat_tx = self.event_tx.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(tokio::time::Duration::from_secs(10)).await;
                if heartbeat_tx.send(CoreEvent::HeartbeatTick).await.is_err() {
                    break;
                }
            }
        });

        self.connect_mpv().await;
        if self.config.mpv.start_muted {
            self.session.toggle_mute(&mut self.engine);
            self.publish().await;
        }
        self.spawn_catalog_load().await;

        while let Some(evt) = event_rx.recv().await {
            if !self.handle_event(evt).await {
                break;
            }
        }

        self.cleanup().await;
        Ok(())
    }

    /// Returns false when the loop should stop.
    async fn handle_event(&mut self, evt: CoreEvent) -> bool {
        match evt {
            CoreEvent::Shutdown => {
                info!("PlayerCore: shutdown requested");
                return false;
            }
            CoreEvent::Command(cmd) => {
                info!("PlayerCore: command {:?}", cmd);
                self.handle_command(cmd).await;
            }
            CoreEvent::CatalogLoaded(status) => self.install_catalog(status).await,
            CoreEvent::Mpv(evt) => self.handle_mpv_event(evt).await,
            CoreEvent::HeartbeatTick => self.heartbeat().await,
        }
        true
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Select { track_id } => {
                if let Err(e) = self.session.select(track_id, &mut self.engine) {
                    warn!("PlayerCore: {}", e);
                    return;
                }
            }
            Command::TogglePause => self.session.play_pause_toggle(&mut self.engine),
            Command::Next => self.session.next(&mut self.engine),
            Command::Prev => self.session.previous(&mut self.engine),
            Command::ToggleMute => self.session.toggle_mute(&mut self.engine),
            Command::Reload => {
                self.spawn_catalog_load().await;
                return;
            }
            Command::GetState => {}
        }
        self.publish().await;
    }

    // ── catalog ───────────────────────────────────────────────────────────────

    async fn spawn_catalog_load(&mut self) {
        if self.catalog_loading {
            debug!("PlayerCore: catalog load already in flight");
            return;
        }
        self.catalog_loading = true;
        self.state_manager.set_catalog(CatalogStatus::Loading).await;
        let _ = self.broadcast_tx.send(BroadcastMessage::StateUpdated);

        let config = self.config.catalog.clone();
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let status = match CatalogStore::new(config, FfprobeDuration::new()) {
                Ok(store) => store.load().await,
                Err(e) => CatalogStatus::Failed(e.to_string()),
            };
            let _ = tx.send(CoreEvent::CatalogLoaded(status)).await;
        });
    }

    async fn install_catalog(&mut self, status: CatalogStatus) {
        self.catalog_loading = false;
        let tracks: Catalog = match &status {
            CatalogStatus::Ready { tracks, .. } => Arc::clone(tracks),
            _ => Arc::from(Vec::<Track>::new()),
        };
        if let CatalogStatus::Failed(reason) = &status {
            error!("PlayerCore: catalog unavailable: {}", reason);
        }
        self.state_manager.set_catalog(status).await;
        self.session.set_catalog(tracks, &mut self.engine);
        self.publish().await;
        let _ = self.broadcast_tx.send(BroadcastMessage::StateUpdated);
    }

    // ── mpv ───────────────────────────────────────────────────────────────────

    async fn handle_mpv_event(&mut self, evt: MpvEvent) {
        if evt.event_name() == Some("end-file") {
            let reason = evt
                .raw
                .get("reason")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");
            if reason == "error" {
                warn!("mpv: end-file with error: {:?}", evt.raw.get("file_error"));
            } else {
                debug!("mpv: end-file reason={}", reason);
            }
        }

        let Some(engine_event) = self.engine.tracker.translate(&evt) else {
            return;
        };
        if self.session.on_engine_event(engine_event) {
            self.publish().await;
        }
    }

    async fn connect_mpv(&mut self) -> bool {
        let (mpv_tx, mut mpv_rx) = mpsc::channel::<MpvEvent>(64);
        let core_tx = self.event_tx.clone();
        tokio::spawn(async move {
            while let Some(evt) = mpv_rx.recv().await {
                if core_tx.send(CoreEvent::Mpv(evt)).await.is_err() {
                    break;
                }
            }
        });

        match self.driver.spawn_and_connect(mpv_tx).await {
            Ok(handle) => {
                handle.observe_properties().await;
                self.handle_tx.send_replace(Some(handle));
                self.connected = true;
                self.engine.set_connected(true);
                self.mpv_failures = 0;
                true
            }
            Err(e) => {
                self.mpv_failures += 1;
                error!(
                    "PlayerCore: failed to start mpv (attempt {}): {}",
                    self.mpv_failures, e
                );
                false
            }
        }
    }

    fn disconnect_mpv(&mut self) {
        self.connected = false;
        self.handle_tx.send_replace(None);
        self.engine.set_connected(false);
    }

    async fn heartbeat(&mut self) {
        if self.connected {
            if self.driver.process_alive() {
                let handle = self.handle_tx.borrow().clone();
                if let Some(handle) = handle {
                    match handle.ping().await {
                        Ok(()) => return,
                        Err(e) => {
                            warn!("PlayerCore: heartbeat: mpv IPC unresponsive ({}), restarting", e)
                        }
                    }
                }
            } else {
                warn!("PlayerCore: heartbeat: mpv process died, respawning");
            }
            self.disconnect_mpv();
        } else {
            info!("PlayerCore: heartbeat: mpv not running, retrying start");
        }

        if self.connect_mpv().await {
            self.restore_playback().await;
        }
    }

    /// Bring a fresh mpv in line with the session: mute, then the current
    /// track, keeping it paused if it was.
    async fn restore_playback(&mut self) {
        self.engine.set_muted(self.session.is_muted());
        if let Some(id) = self.session.current_id() {
            let was_playing = self.session.is_playing();
            if self.session.select(id, &mut self.engine).is_ok() && !was_playing {
                self.session.play_pause_toggle(&mut self.engine);
            }
            self.publish().await;
        }
    }

    // ── helpers ───────────────────────────────────────────────────────────────

    async fn publish(&self) {
        if self.state_manager.set_playback(self.session.snapshot()).await {
            let _ = self.broadcast_tx.send(BroadcastMessage::StateUpdated);
        }
    }

    async fn cleanup(&mut self) {
        info!("PlayerCore: cleanup, stopping mpv");
        if let Some(handle) = self.handle_tx.send_replace(None) {
            let _ = handle.stop().await;
        }
        self.driver.kill().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::session::SessionState;
    use cadence_core::track::TrackId;

    fn track(id: u64) -> Track {
        Track {
            id: TrackId(id),
            name: format!("song {}", id),
            artist: "artist".into(),
            cover: String::new(),
            cover_url: String::new(),
            url: format!("https://cdn.test/{}.mp3", id),
            duration_secs: 60.0,
            duration: "1:00".into(),
        }
    }

    fn core() -> (PlayerCore, broadcast::Receiver<BroadcastMessage>) {
        core_with(Config::default())
    }

    fn core_with(config: Config) -> (PlayerCore, broadcast::Receiver<BroadcastMessage>) {
        let (broadcast_tx, broadcast_rx) = broadcast::channel(16);
        let (event_tx, _event_rx) = mpsc::channel(16);
        (
            PlayerCore::new(config, broadcast_tx, event_tx),
            broadcast_rx,
        )
    }

    fn ready(ids: &[u64]) -> CatalogStatus {
        CatalogStatus::Ready {
            tracks: ids.iter().map(|&i| track(i)).collect::<Vec<_>>().into(),
            dropped: 0,
        }
    }

    #[tokio::test]
    async fn test_catalog_load_auto_selects_and_publishes() {
        let (mut core, mut rx) = core();
        assert!(core.handle_event(CoreEvent::CatalogLoaded(ready(&[5, 6]))).await);

        let state = core.state_manager().get_state().await;
        assert_eq!(state.playback.current_track, Some(TrackId(5)));
        assert_eq!(state.playback.state, SessionState::Playing);
        assert_eq!(state.catalog.tracks().len(), 2);
        assert!(matches!(rx.try_recv(), Ok(BroadcastMessage::StateUpdated)));
    }

    #[tokio::test]
    async fn test_commands_flow_through_session() {
        let (mut core, _rx) = core();
        core.handle_event(CoreEvent::CatalogLoaded(ready(&[1, 2, 3])))
            .await;
        core.handle_event(CoreEvent::Command(Command::Prev)).await;
        core.handle_event(CoreEvent::Command(Command::TogglePause))
            .await;
        core.handle_event(CoreEvent::Command(Command::ToggleMute))
            .await;

        let playback = core.state_manager().get_state().await.playback;
        assert_eq!(playback.current_track, Some(TrackId(3)));
        assert_eq!(playback.state, SessionState::Paused);
        assert!(playback.is_muted);
    }

    #[tokio::test]
    async fn test_unknown_select_changes_nothing() {
        let (mut core, _rx) = core();
        core.handle_event(CoreEvent::CatalogLoaded(ready(&[1])))
            .await;
        let rev = core.state_manager().get_state().await.rev;
        core.handle_event(CoreEvent::Command(Command::Select {
            track_id: TrackId(42),
        }))
        .await;
        assert_eq!(core.state_manager().get_state().await.rev, rev);
    }

    #[tokio::test]
    async fn test_failed_catalog_leaves_session_empty() {
        let (mut core, _rx) = core();
        core.handle_event(CoreEvent::CatalogLoaded(CatalogStatus::Failed(
            "catalog endpoint answered HTTP 404".into(),
        )))
        .await;
        let state = core.state_manager().get_state().await;
        assert_eq!(state.playback.state, SessionState::Empty);
        assert!(state.catalog.error().is_some());
    }

    #[tokio::test]
    async fn test_heartbeat_keeps_retrying_missing_mpv() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.mpv.binary = Some(dir.path().join("no-such-mpv"));
        let (mut core, _rx) = core_with(config);

        core.handle_event(CoreEvent::CatalogLoaded(ready(&[1, 2, 3])))
            .await;
        for _ in 0..50 {
            core.handle_event(CoreEvent::Command(Command::Next)).await;
        }
        assert_eq!(core.engine.tracker.pending_len(), 0);

        assert!(core.handle_event(CoreEvent::HeartbeatTick).await);
        assert!(core.handle_event(CoreEvent::HeartbeatTick).await);
        assert_eq!(core.mpv_failures, 2);
        assert!(!core.connected);
        assert_eq!(core.engine.tracker.pending_len(), 0);
    }

    #[tokio::test]
    async fn test_end_of_track_pauses_session() {
        let (mut core, _rx) = core();
        core.handle_event(CoreEvent::CatalogLoaded(ready(&[1, 2])))
            .await;
        // Pretend mpv picked up the mount the catalog load issued.
        core.engine.set_connected(true);
        core.session.select(TrackId(1), &mut core.engine).unwrap();
        core.handle_event(CoreEvent::Mpv(MpvEvent {
            raw: serde_json::json!({ "event": "start-file" }),
        }))
        .await;
        core.handle_event(CoreEvent::Mpv(MpvEvent {
            raw: serde_json::json!({ "event": "end-file", "reason": "eof" }),
        }))
        .await;

        let playback = core.state_manager().get_state().await.playback;
        assert_eq!(playback.current_track, Some(TrackId(1)));
        assert_eq!(playback.state, SessionState::Paused);
        assert_eq!(playback.progress, 1.0);

        core.handle_event(CoreEvent::Command(Command::TogglePause))
            .await;
        let playback = core.state_manager().get_state().await.playback;
        assert_eq!(playback.state, SessionState::Playing);
        assert_eq!(playback.progress, 0.0);
    }

    #[tokio::test]
    async fn test_shutdown_stops_loop() {
        let (mut core, _rx) = core();
        assert!(!core.handle_event(CoreEvent::Shutdown).await);
    }
}
