//! Header component: one-row top bar: app title, tabs, catalog status.
//!
//! Not interactive; tab switching is handled globally by the App.

use cadence_core::catalog::CatalogStatus;
use cadence_core::search::Tab;
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::{
    app_state::AppState,
    component::Component,
    theme::{C_ACCENT, C_ERROR, C_MUTED, C_PAUSED, C_SECONDARY, C_TAB_ACTIVE},
};

#[derive(Default)]
pub struct Header;

impl Component for Header {
    fn draw(&mut self, frame: &mut Frame, area: Rect, state: &AppState) {
        let mut spans = vec![
            Span::styled(
                " cadence ",
                Style::default().fg(C_ACCENT).add_modifier(Modifier::BOLD),
            ),
            Span::styled("│", Style::default().fg(C_MUTED)),
        ];
        spans.extend(tab_spans(state.tab));
        spans.push(Span::styled("│ ", Style::default().fg(C_MUTED)));
        spans.push(catalog_span(&state.player.catalog));
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }
}

fn tab_spans(active: Tab) -> Vec<Span<'static>> {
    Tab::ALL
        .iter()
        .enumerate()
        .map(|(i, tab)| {
            let label = format!(" {} {} ", i + 1, tab.label());
            if *tab == active {
                Span::styled(
                    label,
                    Style::default()
                        .fg(C_TAB_ACTIVE)
                        .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
                )
            } else {
                Span::styled(label, Style::default().fg(C_SECONDARY))
            }
        })
        .collect()
}

fn catalog_span(status: &CatalogStatus) -> Span<'static> {
    match status {
        CatalogStatus::Loading => Span::styled("loading…", Style::default().fg(C_PAUSED)),
        CatalogStatus::Ready { tracks, dropped: 0 } => Span::styled(
            format!("{} songs", tracks.len()),
            Style::default().fg(C_SECONDARY),
        ),
        CatalogStatus::Ready { tracks, dropped } => Span::styled(
            format!("{} songs ({} unavailable)", tracks.len(), dropped),
            Style::default().fg(C_PAUSED),
        ),
        CatalogStatus::Failed(_) => Span::styled("offline", Style::default().fg(C_ERROR)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_tab_is_emphasised() {
        let spans = tab_spans(Tab::TopTracks);
        assert_eq!(spans[0].content, " 1 For You ");
        assert_eq!(spans[1].content, " 2 Top Tracks ");
        assert!(spans[1].style.add_modifier.contains(Modifier::BOLD));
        assert!(!spans[0].style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_catalog_status_text() {
        assert_eq!(catalog_span(&CatalogStatus::Loading).content, "loading…");
        let ready = CatalogStatus::Ready {
            tracks: Vec::new().into(),
            dropped: 2,
        };
        assert_eq!(catalog_span(&ready).content, "0 songs (2 unavailable)");
        assert_eq!(
            catalog_span(&CatalogStatus::Failed("x".into())).content,
            "offline"
        );
    }
}
