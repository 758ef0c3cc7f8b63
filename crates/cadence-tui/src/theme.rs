//! Color palette and style constants for the cadence TUI.

use cadence_core::accent::Accent;
use ratatui::style::Color;

// ── Color palette ─────────────────────────────────────────────────────────────

pub const C_BG: Color = Color::Rgb(18, 18, 18);
pub const C_ACCENT: Color = Color::Rgb(255, 95, 95);
pub const C_PLAYING: Color = Color::Rgb(80, 200, 120);
pub const C_PAUSED: Color = Color::Rgb(255, 184, 80);
pub const C_ERROR: Color = Color::Rgb(255, 80, 80);
pub const C_MUTED: Color = Color::Rgb(72, 72, 88);
pub const C_SEPARATOR: Color = Color::Rgb(40, 40, 52);
pub const C_SECONDARY: Color = Color::Rgb(115, 115, 138);
pub const C_PRIMARY: Color = Color::Rgb(210, 210, 225);
pub const C_SELECTION_BG: Color = Color::Rgb(28, 28, 40);
pub const C_PANEL_BORDER: Color = Color::Rgb(40, 40, 52);
pub const C_PANEL_BORDER_FOCUSED: Color = Color::Rgb(120, 100, 200);
pub const C_FILTER_BG: Color = Color::Rgb(20, 20, 32);
pub const C_FILTER_FG: Color = Color::Rgb(255, 200, 80);
pub const C_TAB_ACTIVE: Color = Color::Rgb(255, 255, 255);
pub const C_MODE_NORMAL: Color = Color::Rgb(115, 115, 138);
pub const C_MODE_FILTER: Color = Color::Rgb(255, 200, 80);

// ── Accent ────────────────────────────────────────────────────────────────────

pub fn accent_color(accent: Accent) -> Color {
    Color::Rgb(accent.r, accent.g, accent.b)
}

/// Readable foreground for text drawn on top of `accent`.
pub fn on_accent(accent: Accent) -> Color {
    if accent.is_dark() {
        C_PRIMARY
    } else {
        C_BG
    }
}

/// Border color for the now-playing pane. Dark accents vanish against the
/// background, so they are lifted toward white.
pub fn accent_border(accent: Accent) -> Color {
    if !accent.is_dark() {
        return accent_color(accent);
    }
    let lift = |c: u8| c + (255 - c) / 2;
    Color::Rgb(lift(accent.r), lift(accent.g), lift(accent.b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::accent::ACCENT_PALETTE;

    #[test]
    fn test_dark_accents_get_light_text() {
        let navy = ACCENT_PALETTE[7];
        assert!(navy.is_dark());
        assert_eq!(on_accent(navy), C_PRIMARY);

        let peach = ACCENT_PALETTE[0];
        assert_eq!(on_accent(peach), C_BG);
        assert_eq!(accent_border(peach), Color::Rgb(0xff, 0xec, 0xd2));
    }

    #[test]
    fn test_dark_border_is_lifted() {
        let navy = Accent::rgb(0x06, 0x11, 0x47);
        assert_eq!(accent_border(navy), Color::Rgb(130, 136, 163));
    }
}
