//! Action enum: user intents produced by components and dispatched by the App.

use cadence_core::search::Tab;
use cadence_core::track::TrackId;

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    // ── Playback ─────────────────────────────────────────────────────────────
    Select(TrackId),
    TogglePause,
    Next,
    Prev,
    Mute,
    Reload,

    // ── Navigation ───────────────────────────────────────────────────────────
    SwitchTab(Tab),
    NextTab,

    // ── Filter/search ────────────────────────────────────────────────────────
    OpenFilter,
    CloseFilter,
    FilterChanged(String),

    // ── System ───────────────────────────────────────────────────────────────
    Quit,
}
