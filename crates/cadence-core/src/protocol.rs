use serde::{Deserialize, Serialize};

use crate::session::SessionState;
use crate::track::TrackId;

/// Transport intents from the TUI or the HTTP API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd")]
pub enum Command {
    Select { track_id: TrackId },
    TogglePause,
    Next,
    Prev,
    ToggleMute,
    /// Re-run the catalog load.
    Reload,
    GetState,
}

/// Read-only view of the playback session, published after every change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PlaybackSnapshot {
    pub state: SessionState,
    pub current_track: Option<TrackId>,
    pub is_playing: bool,
    pub is_muted: bool,
    /// 0.0..=1.0
    pub progress: f64,
    pub total_duration_secs: Option<f64>,
    /// `M:SS`, once the engine has reported a length.
    pub total_duration: Option<String>,
    /// `#rrggbb` accent for the current track.
    pub accent: Option<String>,
}
