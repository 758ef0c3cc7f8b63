//! AppState: read-only data handed to every component during render/event.
//!
//! Only the App event loop writes to it.

use cadence_core::search::Tab;
use cadence_core::state::PlayerState;
use cadence_core::track::Track;

use crate::widgets::status_bar::InputMode;

#[derive(Debug, Default)]
pub struct AppState {
    /// Latest copy from the `StateManager`.
    pub player: PlayerState,
    pub tab: Tab,
    /// Current filter text. Only the For You tab honours it.
    pub query: String,
    pub input_mode: InputMode,
}

impl AppState {
    /// Tracks the active tab shows, in display order.
    pub fn visible_tracks(&self) -> Vec<&Track> {
        self.tab.visible(self.player.catalog.tracks(), &self.query)
    }
}
