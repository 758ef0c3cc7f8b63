//! TrackList component: the song list of the active tab, with the search bar.

use std::time::Instant;

use cadence_core::accent::Accent;
use cadence_core::catalog::CatalogStatus;
use cadence_core::search::Tab;
use cadence_core::session::SessionState;
use cadence_core::track::{Track, TrackId};
use ratatui::crossterm::event::{
    KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::{
    action::Action,
    app_state::AppState,
    component::Component,
    theme::{
        accent_color, C_ERROR, C_MUTED, C_PANEL_BORDER, C_PANEL_BORDER_FOCUSED, C_PAUSED,
        C_PRIMARY, C_SECONDARY, C_SELECTION_BG,
    },
    widgets::{
        filter_input::{FilterAction, FilterInput},
        pane_chrome::{pane_chrome, Badge},
        scrollable_list::ScrollableList,
    },
};

const DOUBLE_CLICK_MS: u128 = 400;
const DURATION_COL: usize = 6;

pub struct TrackList {
    pub list: ScrollableList<Track>,
    pub filter_input: FilterInput,
    /// Rows available on the last draw, for paging and clicks.
    height: usize,
    last_click: Option<(usize, Instant)>,
}

impl Default for TrackList {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackList {
    pub fn new() -> Self {
        Self {
            list: ScrollableList::default(),
            filter_input: FilterInput::new("artist or title…"),
            height: 0,
            last_click: None,
        }
    }

    /// Rebuild rows from the visible tracks, keeping the selected song if it
    /// is still listed.
    pub fn sync(&mut self, state: &AppState) {
        let previous = self.list.selected_item().map(|t| t.id);
        let items: Vec<Track> = state.visible_tracks().into_iter().cloned().collect();
        self.list.set_items(items, |t| Some(t.id) == previous);
    }

    pub fn selected_id(&self) -> Option<TrackId> {
        self.list.selected_item().map(|t| t.id)
    }

    fn handle_filter_key(&mut self, key: KeyEvent) -> Vec<Action> {
        match key.code {
            KeyCode::Up => {
                self.list.select_up(1);
                return Vec::new();
            }
            KeyCode::Down => {
                self.list.select_down(1);
                return Vec::new();
            }
            _ => {}
        }
        match self.filter_input.handle_key(key) {
            FilterAction::Changed(q) => vec![Action::FilterChanged(q)],
            FilterAction::Confirmed => vec![Action::CloseFilter],
            FilterAction::Cancelled => {
                vec![Action::FilterChanged(String::new()), Action::CloseFilter]
            }
        }
    }

    fn show_filter_bar(&self, state: &AppState) -> bool {
        state.tab == Tab::ForYou && (self.filter_input.is_active() || !state.query.is_empty())
    }
}

impl Component for TrackList {
    fn handle_key(&mut self, key: KeyEvent, _state: &AppState) -> Vec<Action> {
        if key.kind == KeyEventKind::Release {
            return Vec::new();
        }
        if self.filter_input.is_active() {
            return self.handle_filter_key(key);
        }

        let page = self.height.max(1);
        let step = if key.modifiers.contains(KeyModifiers::SHIFT) {
            5
        } else {
            1
        };
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.list.select_up(step),
            KeyCode::Down | KeyCode::Char('j') => self.list.select_down(step),
            KeyCode::PageUp => self.list.select_up(page),
            KeyCode::PageDown => self.list.select_down(page),
            KeyCode::Home | KeyCode::Char('g') => self.list.select_first(),
            KeyCode::End | KeyCode::Char('G') => self.list.select_last(),
            KeyCode::Enter => {
                if let Some(id) = self.selected_id() {
                    return vec![Action::Select(id)];
                }
            }
            KeyCode::Char('/') => {
                self.filter_input.activate();
                return vec![Action::SwitchTab(Tab::ForYou), Action::OpenFilter];
            }
            _ => {}
        }
        Vec::new()
    }

    fn handle_mouse(&mut self, event: MouseEvent, area: Rect, state: &AppState) -> Vec<Action> {
        let header_rows = if self.show_filter_bar(state) { 2 } else { 1 };
        match event.kind {
            MouseEventKind::ScrollUp => self.list.select_up(1),
            MouseEventKind::ScrollDown => self.list.select_down(1),
            MouseEventKind::Down(MouseButton::Left) => {
                if event.row < area.y + header_rows {
                    return Vec::new();
                }
                let row = (event.row - area.y - header_rows) as usize;
                if !self.list.handle_click(row) {
                    return Vec::new();
                }
                let now = Instant::now();
                let index = self.list.selected;
                let is_double = self
                    .last_click
                    .map(|(i, t)| i == index && t.elapsed().as_millis() < DOUBLE_CLICK_MS)
                    .unwrap_or(false);
                self.last_click = Some((index, now));
                if is_double {
                    self.last_click = None;
                    if let Some(id) = self.selected_id() {
                        return vec![Action::Select(id)];
                    }
                }
            }
            _ => {}
        }
        Vec::new()
    }

    fn on_action(&mut self, action: &Action, state: &AppState) {
        match action {
            Action::FilterChanged(_) | Action::SwitchTab(_) | Action::NextTab => self.sync(state),
            Action::CloseFilter => self.filter_input.deactivate(),
            _ => {}
        }
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, state: &AppState) {
        let focused = self.filter_input.is_active();
        let border = if focused {
            C_PANEL_BORDER_FOCUSED
        } else {
            C_PANEL_BORDER
        };
        let count = format!("{}", self.list.len());
        let badges = if state.player.catalog.is_loading() {
            Vec::new()
        } else {
            vec![Badge {
                text: &count,
                color: C_SECONDARY,
            }]
        };
        let block = pane_chrome(state.tab.label(), None, border, true, badges);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let rows_area = if self.show_filter_bar(state) {
            let [bar, rest] =
                Layout::vertical([Constraint::Length(1), Constraint::Min(0)]).areas(inner);
            self.filter_input.draw(frame, bar);
            rest
        } else {
            inner
        };

        self.height = rows_area.height as usize;

        if self.list.is_empty() {
            let text = placeholder(state);
            frame.render_widget(
                Paragraph::new(Line::from(Span::styled(text.0, Style::default().fg(text.1)))),
                rows_area,
            );
            return;
        }

        self.list.ensure_visible(self.height);
        let width = rows_area.width as usize;
        let lines: Vec<Line> = self
            .list
            .visible_items(self.height)
            .map(|(i, track)| render_row(track, i == self.list.selected, width, state))
            .collect();
        frame.render_widget(Paragraph::new(lines), rows_area);
    }
}

fn placeholder(state: &AppState) -> (String, ratatui::style::Color) {
    match &state.player.catalog {
        CatalogStatus::Loading => ("Loading catalog…".to_string(), C_PAUSED),
        CatalogStatus::Failed(msg) => (format!("Failed to load catalog: {}", msg), C_ERROR),
        CatalogStatus::Ready { .. } if state.tab == Tab::ForYou && !state.query.is_empty() => {
            (format!("No songs match \"{}\"", state.query), C_MUTED)
        }
        CatalogStatus::Ready { .. } => ("No songs".to_string(), C_MUTED),
    }
}

fn render_row(track: &Track, selected: bool, width: usize, state: &AppState) -> Line<'static> {
    let playback = &state.player.playback;
    let is_current = playback.current_track == Some(track.id);

    let (icon, icon_color) = match (is_current, playback.state) {
        (true, SessionState::Playing) => ("▶ ", accent_color(Accent::for_track(track.id))),
        (true, _) => ("⏸ ", C_PAUSED),
        (false, _) => ("  ", C_MUTED),
    };

    let name_style = if is_current {
        Style::default()
            .fg(accent_color(Accent::for_track(track.id)))
            .add_modifier(Modifier::BOLD)
    } else if selected {
        Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(C_PRIMARY)
    };

    // icon(2) + name + gap(2) + artist + duration column
    let text_w = width.saturating_sub(2 + 2 + DURATION_COL);
    let name_w = text_w * 3 / 5;
    let artist_w = text_w - name_w;

    let line = Line::from(vec![
        Span::styled(icon, Style::default().fg(icon_color)),
        Span::styled(fit(&track.name, name_w), name_style),
        Span::raw("  "),
        Span::styled(fit(&track.artist, artist_w), Style::default().fg(C_SECONDARY)),
        Span::styled(
            format!("{:>width$}", track.duration, width = DURATION_COL),
            Style::default().fg(C_MUTED),
        ),
    ]);

    if selected {
        line.style(Style::default().bg(C_SELECTION_BG))
    } else {
        line
    }
}

/// Truncate (with `…`) or pad `s` to exactly `width` terminal columns.
fn fit(s: &str, width: usize) -> String {
    if width == 0 {
        return String::new();
    }
    if s.width() <= width {
        let pad = width - s.width();
        return format!("{}{}", s, " ".repeat(pad));
    }
    let mut out = String::new();
    let mut used = 0;
    for ch in s.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w > width - 1 {
            break;
        }
        out.push(ch);
        used += w;
    }
    out.push('…');
    used += 1;
    out.push_str(&" ".repeat(width - used));
    out
}
