//! Core of the cadence player: catalog loading, search and tabs, and the
//! playback session state machine. No terminal or audio-process code lives
//! here; those plug in through [`catalog::DurationProbe`] and
//! [`session::AudioEngine`].

pub mod accent;
pub mod catalog;
pub mod config;
pub mod platform;
pub mod protocol;
pub mod search;
pub mod session;
pub mod state;
pub mod track;
