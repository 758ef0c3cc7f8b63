use crate::catalog::CatalogStatus;
use crate::protocol::PlaybackSnapshot;
use crate::track::Track;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Everything a renderer needs. `rev` increases on every change so readers
/// can tell whether they missed an update.
#[derive(Debug, Clone, Default)]
pub struct PlayerState {
    pub rev: u64,
    pub catalog: CatalogStatus,
    pub playback: PlaybackSnapshot,
}

impl PlayerState {
    pub fn current_track(&self) -> Option<&Track> {
        let id = self.playback.current_track?;
        self.catalog.tracks().iter().find(|t| t.id == id)
    }
}

/// Shared, lock-guarded copy of the player state.
///
/// Written only by the core event loop; the TUI and HTTP server read it.
pub struct StateManager {
    state: Arc<RwLock<PlayerState>>,
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StateManager {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(PlayerState {
                rev: 1,
                ..PlayerState::default()
            })),
        }
    }

    pub async fn get_state(&self) -> PlayerState {
        self.state.read().await.clone()
    }

    pub async fn set_catalog(&self, catalog: CatalogStatus) {
        let mut state = self.state.write().await;
        state.catalog = catalog;
        state.rev += 1;
    }

    /// Returns false (and leaves `rev` alone) when nothing changed.
    pub async fn set_playback(&self, playback: PlaybackSnapshot) -> bool {
        let mut state = self.state.write().await;
        if state.playback == playback {
            return false;
        }
        state.playback = playback;
        state.rev += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionState;
    use crate::track::TrackId;

    #[tokio::test]
    async fn test_rev_bumps_only_on_change() {
        let manager = StateManager::new();
        assert_eq!(manager.get_state().await.rev, 1);

        assert!(!manager.set_playback(PlaybackSnapshot::default()).await);
        assert_eq!(manager.get_state().await.rev, 1);

        let playing = PlaybackSnapshot {
            state: SessionState::Playing,
            current_track: Some(TrackId(3)),
            is_playing: true,
            ..PlaybackSnapshot::default()
        };
        assert!(manager.set_playback(playing.clone()).await);
        assert_eq!(manager.get_state().await.rev, 2);
        assert!(!manager.set_playback(playing).await);

        manager.set_catalog(CatalogStatus::Failed("HTTP 500".into())).await;
        let state = manager.get_state().await;
        assert_eq!(state.rev, 3);
        assert_eq!(state.catalog.error(), Some("HTTP 500"));
        assert!(state.current_track().is_none());
    }
}
