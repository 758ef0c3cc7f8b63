//! Per-track accent colour. Derived from the current track's id; the
//! renderer decides where to paint it.

use crate::track::TrackId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accent {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

pub const ACCENT_PALETTE: [Accent; 8] = [
    Accent::rgb(0xff, 0xec, 0xd2),
    Accent::rgb(0x2f, 0x1a, 0x04),
    Accent::rgb(0xd6, 0x33, 0xff),
    Accent::rgb(0x9a, 0x1f, 0xdd),
    Accent::rgb(0xff, 0x8f, 0xb1),
    Accent::rgb(0x82, 0x4d, 0x17),
    Accent::rgb(0xd7, 0x0f, 0x5f),
    Accent::rgb(0x06, 0x11, 0x47),
];

impl Accent {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn for_track(id: TrackId) -> Self {
        ACCENT_PALETTE[(id.0 % ACCENT_PALETTE.len() as u64) as usize]
    }

    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Rec. 601 luma below mid-grey: light text reads better on top.
    pub fn is_dark(&self) -> bool {
        let luma = 299 * self.r as u32 + 587 * self.g as u32 + 114 * self.b as u32;
        luma < 128_000
    }
}
