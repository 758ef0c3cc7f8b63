//! PlaybackSession: the transport state machine.
//!
//! States: `Empty` → (`select`) → `Playing` ⇄ (`play_pause_toggle`) ⇄ `Paused`.
//!
//! The session never awaits. It pushes fire-and-forget commands into an
//! [`AudioEngine`] and is fed back through [`EngineEvent`]s. Every `select`
//! mounts a new resource under a fresh [`MountId`]; events tagged with any
//! other mount are stale and ignored.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::accent::Accent;
use crate::protocol::PlaybackSnapshot;
use crate::track::{format_duration, Catalog, Track, TrackId};

/// Identity of one mounted audio resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MountId(pub u64);

/// Commands the session issues. Implementations must not block.
pub trait AudioEngine {
    /// Replace the current resource with `source`, tagged `mount`.
    fn load(&mut self, mount: MountId, source: &str);
    fn play(&mut self);
    fn pause(&mut self);
    fn set_muted(&mut self, muted: bool);
}

/// Notifications coming back from the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineEvent {
    /// Fires repeatedly while playing.
    TimeUpdate {
        mount: MountId,
        current_secs: f64,
        duration_secs: f64,
    },
    /// Fires once the resource's length is known.
    MetadataLoaded { mount: MountId, duration_secs: f64 },
    /// The resource played through to its end.
    Ended { mount: MountId },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("track {0} is not in the catalog")]
    UnknownTrack(TrackId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionState {
    #[default]
    Empty,
    Paused,
    Playing,
}

/// Which mount the session is currently listening to.
#[derive(Debug, Default)]
struct ListenerScope {
    last: u64,
    attached: Option<MountId>,
}

impl ListenerScope {
    fn detach(&mut self) {
        self.attached = None;
    }

    fn attach_next(&mut self) -> MountId {
        self.last += 1;
        let mount = MountId(self.last);
        self.attached = Some(mount);
        mount
    }

    fn accepts(&self, mount: MountId) -> bool {
        self.attached == Some(mount)
    }
}

#[derive(Debug)]
pub struct PlaybackSession {
    catalog: Catalog,
    current: Option<TrackId>,
    is_playing: bool,
    is_muted: bool,
    progress: f64,
    total_duration_secs: Option<f64>,
    total_duration: Option<String>,
    /// Set when the current resource finished; the engine is idle.
    ended: bool,
    scope: ListenerScope,
}

impl Default for PlaybackSession {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackSession {
    pub fn new() -> Self {
        Self {
            catalog: Vec::<Track>::new().into(),
            current: None,
            is_playing: false,
            is_muted: false,
            progress: 0.0,
            total_duration_secs: None,
            total_duration: None,
            ended: false,
            scope: ListenerScope::default(),
        }
    }

    // ── accessors ─────────────────────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        match (self.current, self.is_playing) {
            (None, _) => SessionState::Empty,
            (Some(_), true) => SessionState::Playing,
            (Some(_), false) => SessionState::Paused,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn current_id(&self) -> Option<TrackId> {
        self.current
    }

    pub fn current_track(&self) -> Option<&Track> {
        let id = self.current?;
        self.catalog.iter().find(|t| t.id == id)
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn is_muted(&self) -> bool {
        self.is_muted
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn total_duration_secs(&self) -> Option<f64> {
        self.total_duration_secs
    }

    pub fn total_duration(&self) -> Option<&str> {
        self.total_duration.as_deref()
    }

    pub fn accent(&self) -> Option<Accent> {
        self.current.map(Accent::for_track)
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            state: self.state(),
            current_track: self.current,
            is_playing: self.is_playing,
            is_muted: self.is_muted,
            progress: self.progress,
            total_duration_secs: self.total_duration_secs,
            total_duration: self.total_duration.clone(),
            accent: self.accent().map(|a| a.hex()),
        }
    }

    // ── catalog ───────────────────────────────────────────────────────────────

    /// Install the full catalog. Auto-selects the first track when nothing is
    /// current; drops the current track if the new catalog lacks it.
    pub fn set_catalog<E: AudioEngine + ?Sized>(&mut self, catalog: Catalog, engine: &mut E) {
        self.catalog = catalog;

        if let Some(id) = self.current {
            if self.index_of(id).is_none() {
                debug!("session: track {} left the catalog, unloading", id);
                self.unload(engine);
            }
        }

        if self.current.is_none() && !self.catalog.is_empty() {
            self.select_index(0, engine);
        }
    }

    // ── transport ─────────────────────────────────────────────────────────────

    pub fn select<E: AudioEngine + ?Sized>(
        &mut self,
        id: TrackId,
        engine: &mut E,
    ) -> Result<(), SessionError> {
        let idx = self.index_of(id).ok_or(SessionError::UnknownTrack(id))?;
        self.select_index(idx, engine);
        Ok(())
    }

    /// No-op while Empty. After the track ended, playing mounts it again.
    pub fn play_pause_toggle<E: AudioEngine + ?Sized>(&mut self, engine: &mut E) {
        let Some(id) = self.current else {
            return;
        };
        if self.ended {
            if let Some(idx) = self.index_of(id) {
                self.select_index(idx, engine);
            }
            return;
        }
        self.is_playing = !self.is_playing;
        if self.is_playing {
            engine.play();
        } else {
            engine.pause();
        }
    }

    /// Advance by one within the full catalog, wrapping at the end.
    pub fn next<E: AudioEngine + ?Sized>(&mut self, engine: &mut E) {
        let len = self.catalog.len();
        if len == 0 {
            return;
        }
        let target = match self.current.and_then(|id| self.index_of(id)) {
            Some(i) => (i + 1) % len,
            None => 0,
        };
        self.select_index(target, engine);
    }

    /// Step back by one within the full catalog, wrapping at the start.
    pub fn previous<E: AudioEngine + ?Sized>(&mut self, engine: &mut E) {
        let len = self.catalog.len();
        if len == 0 {
            return;
        }
        let target = match self.current.and_then(|id| self.index_of(id)) {
            Some(i) => (i + len - 1) % len,
            None => len - 1,
        };
        self.select_index(target, engine);
    }

    pub fn toggle_mute<E: AudioEngine + ?Sized>(&mut self, engine: &mut E) {
        self.is_muted = !self.is_muted;
        engine.set_muted(self.is_muted);
    }

    // ── engine notifications ──────────────────────────────────────────────────

    /// Returns whether the event changed session state.
    pub fn on_engine_event(&mut self, event: EngineEvent) -> bool {
        match event {
            EngineEvent::TimeUpdate {
                mount,
                current_secs,
                duration_secs,
            } => self.on_time_update(mount, current_secs, duration_secs),
            EngineEvent::MetadataLoaded {
                mount,
                duration_secs,
            } => self.on_metadata_loaded(mount, duration_secs),
            EngineEvent::Ended { mount } => self.on_ended(mount),
        }
    }

    /// Progress only moves on a positive, finite duration.
    pub fn on_time_update(&mut self, mount: MountId, current_secs: f64, duration_secs: f64) -> bool {
        if !self.scope.accepts(mount) {
            return false;
        }
        if !(duration_secs.is_finite() && duration_secs > 0.0) || !current_secs.is_finite() {
            return false;
        }
        let progress = (current_secs / duration_secs).clamp(0.0, 1.0);
        if progress == self.progress {
            return false;
        }
        self.progress = progress;
        true
    }

    pub fn on_metadata_loaded(&mut self, mount: MountId, duration_secs: f64) -> bool {
        if !self.scope.accepts(mount) {
            return false;
        }
        if !(duration_secs.is_finite() && duration_secs > 0.0) {
            return false;
        }
        self.total_duration_secs = Some(duration_secs);
        self.total_duration = Some(format_duration(duration_secs));
        true
    }

    /// No auto-advance: the session parks on the finished track, paused.
    pub fn on_ended(&mut self, mount: MountId) -> bool {
        if !self.scope.accepts(mount) || self.ended {
            return false;
        }
        debug!("session: mount {:?} ended", mount);
        self.ended = true;
        self.is_playing = false;
        self.progress = 1.0;
        true
    }

    // ── internals ─────────────────────────────────────────────────────────────

    fn index_of(&self, id: TrackId) -> Option<usize> {
        self.catalog.iter().position(|t| t.id == id)
    }

    fn select_index<E: AudioEngine + ?Sized>(&mut self, idx: usize, engine: &mut E) {
        let track = &self.catalog[idx];
        let id = track.id;
        let source = track.url.clone();

        // The old resource stops reporting before the new one is mounted.
        self.scope.detach();
        let mount = self.scope.attach_next();

        self.current = Some(id);
        self.progress = 0.0;
        self.is_playing = true;
        self.ended = false;
        debug!("session: select track {} as mount {:?}", id, mount);

        engine.load(mount, &source);
        engine.play();
    }

    fn unload<E: AudioEngine + ?Sized>(&mut self, engine: &mut E) {
        self.scope.detach();
        self.current = None;
        self.is_playing = false;
        self.ended = false;
        self.progress = 0.0;
        self.total_duration_secs = None;
        self.total_duration = None;
        engine.pause();
    }
}
