//! App: component-based event loop.
//!
//! Architecture:
//! - `App` owns the components and `AppState` (read-only data for components).
//! - A `tokio::mpsc` channel carries `AppMessage` events in from background tasks.
//! - The event loop draws a frame when something changed, then awaits the next message.
//! - Components return `Vec<Action>`; App dispatches each Action.
//! - Playback commands flow out to the PlayerCore through `cmd_tx`.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use ratatui::crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers, MouseEvent,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Layout, Rect},
    Frame, Terminal,
};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use cadence_core::protocol::Command;
use cadence_core::search::Tab;
use cadence_core::state::{PlayerState, StateManager};
use cadence_core::track::TrackId;

use crate::{
    action::Action,
    app_state::AppState,
    component::Component,
    components::{header::Header, now_playing::NowPlaying, track_list::TrackList},
    core::CoreEvent,
    widgets::status_bar::{self, InputMode},
    BroadcastMessage,
};

/// Below this width the now-playing pane moves under the list.
const WIDE_LAYOUT_MIN_WIDTH: u16 = 90;

// ── Internal event bus ────────────────────────────────────────────────────────

enum AppMessage {
    Event(Event),
    StateUpdated(PlayerState),
}

#[derive(Default, Clone, Copy)]
struct PaneAreas {
    track_list: Rect,
    now_playing: Rect,
}

pub struct App {
    state: AppState,
    header: Header,
    track_list: TrackList,
    now_playing: NowPlaying,
    cmd_tx: mpsc::Sender<CoreEvent>,
    state_manager: Arc<StateManager>,
    should_quit: bool,
    pane_areas: PaneAreas,
}

impl App {
    pub fn new(cmd_tx: mpsc::Sender<CoreEvent>, state_manager: Arc<StateManager>) -> Self {
        Self {
            state: AppState::default(),
            header: Header,
            track_list: TrackList::new(),
            now_playing: NowPlaying,
            cmd_tx,
            state_manager,
            should_quit: false,
            pane_areas: PaneAreas::default(),
        }
    }

    // ── Main run loop ─────────────────────────────────────────────────────────

    pub async fn run(
        mut self,
        broadcast_rx: broadcast::Receiver<BroadcastMessage>,
    ) -> anyhow::Result<()> {
        debug!("run(): enabling raw mode");
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        debug!("run(): terminal created, size={:?}", terminal.size());

        let result = self.event_loop(&mut terminal, broadcast_rx).await;

        // ── Teardown ──────────────────────────────────────────────────────────
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;

        result
    }

    async fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
        mut broadcast_rx: broadcast::Receiver<BroadcastMessage>,
    ) -> anyhow::Result<()> {
        let (tx, mut rx) = mpsc::channel::<AppMessage>(1024);

        // ── Background task: keyboard/mouse events ────────────────────────────
        let event_tx = tx.clone();
        tokio::task::spawn_blocking(move || loop {
            match event::read() {
                Ok(ev) => {
                    if event_tx.blocking_send(AppMessage::Event(ev)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        });

        // ── Background task: broadcast receiver (PlayerCore → AppMessage) ─────
        let bc_tx = tx.clone();
        let bc_state_manager = Arc::clone(&self.state_manager);
        tokio::spawn(async move {
            loop {
                match broadcast_rx.recv().await {
                    Ok(BroadcastMessage::StateUpdated) => {
                        let state = bc_state_manager.get_state().await;
                        if bc_tx.send(AppMessage::StateUpdated(state)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // Only the latest state matters; fetch it now.
                        warn!("broadcast receiver lagged by {} messages", n);
                        let state = bc_state_manager.get_state().await;
                        if bc_tx.send(AppMessage::StateUpdated(state)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        // The loop may start after the core's first publish; pick it up here.
        let initial = self.state_manager.get_state().await;
        self.apply_state(initial);

        // Fallback frame rate; state pushes and input redraw immediately.
        let mut ui_tick = tokio::time::interval(Duration::from_millis(250));
        ui_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        // ── Main loop ─────────────────────────────────────────────────────────
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal.draw(|f| self.draw(f))?;
            }

            if self.should_quit {
                break;
            }

            tokio::select! {
                Some(msg) = rx.recv() => {
                    const MAX_DRAIN: usize = 256;
                    let mut redraw = self.handle_message(msg).await;
                    let mut drained = 0usize;
                    while drained < MAX_DRAIN {
                        let Ok(next) = rx.try_recv() else { break };
                        drained += 1;
                        redraw |= self.handle_message(next).await;
                    }
                    needs_redraw = redraw;
                }

                _ = ui_tick.tick() => {
                    needs_redraw = true;
                }
            }
        }

        Ok(())
    }

    // ── Messages ──────────────────────────────────────────────────────────────

    /// Returns true when the screen needs a redraw.
    async fn handle_message(&mut self, msg: AppMessage) -> bool {
        match msg {
            AppMessage::StateUpdated(state) => self.apply_state(state),
            AppMessage::Event(Event::Key(key)) => {
                self.handle_key(key).await;
                true
            }
            AppMessage::Event(Event::Mouse(mouse)) => {
                self.handle_mouse(mouse).await;
                true
            }
            AppMessage::Event(Event::Resize(_, _)) => true,
            AppMessage::Event(_) => false,
        }
    }

    /// Install a newer `PlayerState`. Copies that arrive out of order are dropped.
    fn apply_state(&mut self, state: PlayerState) -> bool {
        if state.rev < self.state.player.rev {
            debug!(
                "dropping stale state rev {} (have {})",
                state.rev, self.state.player.rev
            );
            return false;
        }
        let previous_track = self.state.player.playback.current_track;
        self.state.player = state;
        self.track_list.sync(&self.state);

        // Follow the playing song when it changes (n/p, auto-select on load).
        let current = self.state.player.playback.current_track;
        if current != previous_track {
            if let Some(id) = current {
                self.track_list.list.select_where(|t| t.id == id);
            }
        }
        true
    }

    async fn handle_key(&mut self, key: KeyEvent) {
        if key.kind == KeyEventKind::Release {
            return;
        }
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.dispatch(Action::Quit).await;
            return;
        }

        // While the search bar is open every key belongs to it.
        if self.state.input_mode == InputMode::Filter {
            let actions = self.track_list.handle_key(key, &self.state);
            for action in actions {
                self.dispatch(action).await;
            }
            return;
        }

        let global = match key.code {
            KeyCode::Char('q') => Some(Action::Quit),
            KeyCode::Tab => Some(Action::NextTab),
            KeyCode::Char('1') => Some(Action::SwitchTab(Tab::ForYou)),
            KeyCode::Char('2') => Some(Action::SwitchTab(Tab::TopTracks)),
            KeyCode::Char(' ') => Some(Action::TogglePause),
            KeyCode::Char('n') => Some(Action::Next),
            KeyCode::Char('p') => Some(Action::Prev),
            KeyCode::Char('m') => Some(Action::Mute),
            KeyCode::Char('r') => Some(Action::Reload),
            _ => None,
        };
        if let Some(action) = global {
            self.dispatch(action).await;
            return;
        }

        let actions = self.track_list.handle_key(key, &self.state);
        for action in actions {
            self.dispatch(action).await;
        }
    }

    async fn handle_mouse(&mut self, mouse: MouseEvent) {
        let area = self.pane_areas.track_list;
        if hit(area, mouse.column, mouse.row) {
            let actions = self.track_list.handle_mouse(mouse, area, &self.state);
            for action in actions {
                self.dispatch(action).await;
            }
        }
    }

    // ── Action dispatcher ─────────────────────────────────────────────────────

    async fn dispatch(&mut self, action: Action) {
        debug!("dispatch: {:?}", action);
        match &action {
            Action::Select(id) => self.send_cmd(select_command(*id)).await,
            Action::TogglePause => self.send_cmd(Command::TogglePause).await,
            Action::Next => self.send_cmd(Command::Next).await,
            Action::Prev => self.send_cmd(Command::Prev).await,
            Action::Mute => self.send_cmd(Command::ToggleMute).await,
            Action::Reload => self.send_cmd(Command::Reload).await,
            Action::SwitchTab(tab) => self.state.tab = *tab,
            Action::NextTab => self.state.tab = self.state.tab.next(),
            Action::OpenFilter => self.state.input_mode = InputMode::Filter,
            Action::CloseFilter => self.state.input_mode = InputMode::Normal,
            Action::FilterChanged(q) => self.state.query = q.clone(),
            Action::Quit => {
                self.should_quit = true;
                let _ = self.cmd_tx.send(CoreEvent::Shutdown).await;
            }
        }
        self.track_list.on_action(&action, &self.state);
    }

    async fn send_cmd(&self, cmd: Command) {
        if self.cmd_tx.send(CoreEvent::Command(cmd)).await.is_err() {
            warn!("PlayerCore is gone; command dropped");
        }
    }

    // ── Drawing ───────────────────────────────────────────────────────────────

    fn draw(&mut self, frame: &mut Frame) {
        let [header, separator, body, keys] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .areas(frame.area());

        let [list, now_playing] = if body.width >= WIDE_LAYOUT_MIN_WIDTH {
            Layout::horizontal([Constraint::Percentage(62), Constraint::Percentage(38)])
                .areas(body)
        } else {
            Layout::vertical([Constraint::Min(0), Constraint::Length(7)]).areas(body)
        };
        self.pane_areas = PaneAreas {
            track_list: list,
            now_playing,
        };

        self.header.draw(frame, header, &self.state);
        status_bar::draw_separator(frame, separator);
        self.track_list.draw(frame, list, &self.state);
        self.now_playing.draw(frame, now_playing, &self.state);
        status_bar::draw_keys_bar(frame, keys, self.state.input_mode);
    }
}

fn select_command(track_id: TrackId) -> Command {
    Command::Select { track_id }
}

fn hit(area: Rect, col: u16, row: u16) -> bool {
    col >= area.x && col < area.x + area.width && row >= area.y && row < area.y + area.height
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::catalog::CatalogStatus;
    use cadence_core::track::{Track, TrackRecord};
    use ratatui::backend::TestBackend;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn catalog() -> CatalogStatus {
        let tracks: Vec<Track> = (1..=4)
            .map(|id| {
                Track::new(
                    TrackRecord {
                        id,
                        name: Some(format!("Song {}", id)),
                        artist: Some(if id % 2 == 0 { "Even" } else { "Odd" }.into()),
                        cover: Some(format!("c{}.jpg", id)),
                        url: format!("https://cdn.test/{}.mp3", id),
                    },
                    "https://cdn.test/assets/",
                    61.0,
                )
            })
            .collect();
        CatalogStatus::Ready {
            tracks: tracks.into(),
            dropped: 0,
        }
    }

    fn app() -> (App, mpsc::Receiver<CoreEvent>) {
        let (tx, rx) = mpsc::channel(16);
        let mut app = App::new(tx, Arc::new(StateManager::new()));
        app.apply_state(PlayerState {
            rev: 2,
            catalog: catalog(),
            ..PlayerState::default()
        });
        (app, rx)
    }

    #[tokio::test]
    async fn test_global_keys_send_commands() {
        let (mut app, mut rx) = app();
        app.handle_key(key(KeyCode::Char(' '))).await;
        app.handle_key(key(KeyCode::Char('n'))).await;
        app.handle_key(key(KeyCode::Char('m'))).await;
        app.handle_key(key(KeyCode::Enter)).await;

        let mut sent = Vec::new();
        while let Ok(CoreEvent::Command(cmd)) = rx.try_recv() {
            sent.push(cmd);
        }
        assert_eq!(
            sent,
            vec![
                Command::TogglePause,
                Command::Next,
                Command::ToggleMute,
                Command::Select {
                    track_id: TrackId(1)
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_filter_mode_captures_letters() {
        let (mut app, mut rx) = app();
        app.handle_key(key(KeyCode::Char('/'))).await;
        assert_eq!(app.state.input_mode, InputMode::Filter);

        // 'n' and 'q' are typed into the search, not handled as shortcuts.
        app.handle_key(key(KeyCode::Char('q'))).await;
        assert!(!app.should_quit);
        assert_eq!(app.state.query, "q");
        assert!(rx.try_recv().is_err());

        app.handle_key(key(KeyCode::Backspace)).await;
        app.handle_key(key(KeyCode::Char('e'))).await;
        app.handle_key(key(KeyCode::Char('v'))).await;
        assert_eq!(app.track_list.list.len(), 2);

        app.handle_key(key(KeyCode::Enter)).await;
        assert_eq!(app.state.input_mode, InputMode::Normal);
        assert_eq!(app.state.query, "ev");
    }

    #[tokio::test]
    async fn test_quit_shuts_core_down() {
        let (mut app, mut rx) = app();
        app.handle_key(key(KeyCode::Char('q'))).await;
        assert!(app.should_quit);
        assert!(matches!(rx.try_recv(), Ok(CoreEvent::Shutdown)));
    }

    #[tokio::test]
    async fn test_stale_state_is_ignored() {
        let (mut app, _rx) = app();
        assert!(!app.apply_state(PlayerState::default()));
        assert_eq!(app.track_list.list.len(), 4);
    }

    #[tokio::test]
    async fn test_list_follows_current_track() {
        let (mut app, _rx) = app();
        let mut next = app.state.player.clone();
        next.rev += 1;
        next.playback.current_track = Some(TrackId(3));
        app.apply_state(next);
        assert_eq!(app.track_list.selected_id(), Some(TrackId(3)));
    }

    #[tokio::test]
    async fn test_tabs_switch_visible_rows() {
        let (mut app, _rx) = app();
        app.handle_key(key(KeyCode::Tab)).await;
        assert_eq!(app.state.tab, Tab::TopTracks);
        let ids: Vec<u64> = app.track_list.list.items.iter().map(|t| t.id.0).collect();
        assert_eq!(ids, vec![3, 4]);
        app.handle_key(key(KeyCode::Char('1'))).await;
        assert_eq!(app.track_list.list.len(), 4);
    }

    #[test]
    fn test_draw_renders_without_panicking() {
        let (mut app, _rx) = app();
        let mut terminal = Terminal::new(TestBackend::new(120, 30)).unwrap();
        terminal.draw(|f| app.draw(f)).unwrap();
        let mut narrow = Terminal::new(TestBackend::new(60, 20)).unwrap();
        narrow.draw(|f| app.draw(f)).unwrap();
        assert!(app.pane_areas.now_playing.y > app.pane_areas.track_list.y);
    }
}
