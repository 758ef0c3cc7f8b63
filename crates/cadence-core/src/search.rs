//! Query filtering and tab selection over the catalog. Pure functions of
//! (catalog, query, tab); nothing here is stored.

use serde::{Deserialize, Serialize};

use crate::track::Track;

/// Raw catalog positions shown on the Top Tracks tab.
pub const TOP_TRACKS_START: usize = 2;
pub const TOP_TRACKS_LEN: usize = 3;

/// Tracks whose artist or name contains `query`, case-insensitively.
/// An empty query keeps the whole catalog. Order is preserved.
pub fn filter<'a>(catalog: &'a [Track], query: &str) -> Vec<&'a Track> {
    if query.is_empty() {
        return catalog.iter().collect();
    }
    let needle = query.to_lowercase();
    catalog
        .iter()
        .filter(|t| track_matches(t, &needle))
        .collect()
}

/// `needle` must already be lowercased.
pub fn track_matches(track: &Track, needle: &str) -> bool {
    track.artist.to_lowercase().contains(needle) || track.name.to_lowercase().contains(needle)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Tab {
    #[default]
    ForYou,
    TopTracks,
}

impl Tab {
    pub const ALL: [Tab; 2] = [Tab::ForYou, Tab::TopTracks];

    pub fn label(self) -> &'static str {
        match self {
            Tab::ForYou => "For You",
            Tab::TopTracks => "Top Tracks",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Tab::ForYou => Tab::TopTracks,
            Tab::TopTracks => Tab::ForYou,
        }
    }

    /// The collection this tab renders.
    ///
    /// Top Tracks is a fixed slice of the raw catalog and ignores `query`.
    pub fn visible<'a>(self, catalog: &'a [Track], query: &str) -> Vec<&'a Track> {
        match self {
            Tab::ForYou => filter(catalog, query),
            Tab::TopTracks => catalog
                .iter()
                .skip(TOP_TRACKS_START)
                .take(TOP_TRACKS_LEN)
                .collect(),
        }
    }
}
