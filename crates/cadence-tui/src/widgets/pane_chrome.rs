//! PaneChrome: bordered pane with a keyed title and an optional badge.

use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders},
};

use crate::theme::{C_MUTED, C_PRIMARY};

/// Shown right-aligned in the top border, e.g. "PAUSED" or "MUTED".
pub struct Badge<'a> {
    pub text: &'a str,
    pub color: Color,
}

/// `border` colours both the frame and, when `emphasised`, the title.
pub fn pane_chrome<'a>(
    title: &'a str,
    number_key: Option<char>,
    border: Color,
    emphasised: bool,
    badges: Vec<Badge<'a>>,
) -> Block<'a> {
    let title_style = if emphasised {
        Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(C_MUTED)
    };

    let mut title_spans = Vec::with_capacity(2);
    if let Some(key) = number_key {
        title_spans.push(Span::styled(format!("[{}] ", key), Style::default().fg(C_MUTED)));
    }
    title_spans.push(Span::styled(title, title_style));

    let mut block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .title(Line::from(title_spans));

    if !badges.is_empty() {
        let spans: Vec<Span> = badges
            .into_iter()
            .map(|b| {
                Span::styled(
                    format!(" {} ", b.text),
                    Style::default().fg(b.color).add_modifier(Modifier::BOLD),
                )
            })
            .collect();
        block = block.title_top(Line::from(spans).right_aligned());
    }
    block
}
