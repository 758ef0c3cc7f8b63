//! Component trait: the interface every UI panel implements.
//!
//! - Components own their view state and render themselves.
//! - They read `AppState` and never mutate it.
//! - They return `Vec<Action>`; the App dispatches those.

use ratatui::crossterm::event::{KeyEvent, MouseEvent};
use ratatui::{layout::Rect, Frame};

use crate::action::Action;
use crate::app_state::AppState;

pub trait Component {
    fn handle_key(&mut self, _key: KeyEvent, _state: &AppState) -> Vec<Action> {
        Vec::new()
    }

    fn handle_mouse(&mut self, _event: MouseEvent, _area: Rect, _state: &AppState) -> Vec<Action> {
        Vec::new()
    }

    /// Receive an action dispatched by the App, after the App applied it.
    fn on_action(&mut self, _action: &Action, _state: &AppState) {}

    fn draw(&mut self, frame: &mut Frame, area: Rect, state: &AppState);
}
