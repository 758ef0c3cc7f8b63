//! NowPlaying component: current song, state badges and the progress bar,
//! framed in the track's accent colour.

use cadence_core::accent::Accent;
use cadence_core::session::SessionState;
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::{
    app_state::AppState,
    component::Component,
    theme::{
        accent_border, accent_color, on_accent, C_MUTED, C_PANEL_BORDER, C_PAUSED, C_PLAYING,
        C_PRIMARY, C_SECONDARY,
    },
    widgets::{
        pane_chrome::{pane_chrome, Badge},
        progress_bar::draw_progress,
    },
};

#[derive(Default)]
pub struct NowPlaying;

fn badges(state: &AppState) -> Vec<Badge<'static>> {
    let playback = &state.player.playback;
    let mut out = Vec::new();
    match playback.state {
        SessionState::Playing => out.push(Badge {
            text: "PLAYING",
            color: C_PLAYING,
        }),
        SessionState::Paused => out.push(Badge {
            text: "PAUSED",
            color: C_PAUSED,
        }),
        SessionState::Empty => {}
    }
    if playback.is_muted {
        out.push(Badge {
            text: "MUTED",
            color: C_MUTED,
        });
    }
    out
}

impl Component for NowPlaying {
    fn draw(&mut self, frame: &mut Frame, area: Rect, state: &AppState) {
        let track = state.player.current_track();
        let accent = track.map(|t| Accent::for_track(t.id));
        let border = accent.map(accent_border).unwrap_or(C_PANEL_BORDER);

        let block = pane_chrome("Now Playing", None, border, track.is_some(), badges(state));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let [title, artist, cover, _, progress] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .areas(inner);

        let Some(track) = track else {
            frame.render_widget(
                Paragraph::new(Span::styled(
                    "No Song",
                    Style::default().fg(C_SECONDARY).add_modifier(Modifier::BOLD),
                )),
                title,
            );
            frame.render_widget(
                Paragraph::new(Span::styled("Select a song", Style::default().fg(C_MUTED))),
                artist,
            );
            return;
        };

        let accent = Accent::for_track(track.id);
        let color = accent_color(accent);
        frame.render_widget(
            Paragraph::new(Line::from(vec![
                Span::styled(" ♪ ", Style::default().bg(color).fg(on_accent(accent))),
                Span::raw(" "),
                Span::styled(
                    track.name.clone(),
                    Style::default().fg(color).add_modifier(Modifier::BOLD),
                ),
            ])),
            title,
        );
        frame.render_widget(
            Paragraph::new(Span::styled(
                track.artist.clone(),
                Style::default().fg(C_PRIMARY),
            )),
            artist,
        );
        if !track.cover.is_empty() {
            frame.render_widget(
                Paragraph::new(Span::styled(
                    track.cover_url.clone(),
                    Style::default().fg(C_MUTED),
                )),
                cover,
            );
        }

        let playback = &state.player.playback;
        draw_progress(
            frame,
            progress,
            playback.progress,
            playback.total_duration_secs,
            color,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_badges_reflect_playback() {
        let mut state = AppState::default();
        assert!(badges(&state).is_empty());

        state.player.playback.state = SessionState::Paused;
        state.player.playback.is_muted = true;
        let texts: Vec<&str> = badges(&state).iter().map(|b| b.text).collect();
        assert_eq!(texts, vec!["PAUSED", "MUTED"]);

        state.player.playback.state = SessionState::Playing;
        state.player.playback.is_muted = false;
        let texts: Vec<&str> = badges(&state).iter().map(|b| b.text).collect();
        assert_eq!(texts, vec!["PLAYING"]);
    }
}
