//! Smooth Unicode progress bar widget.

use cadence_core::track::format_duration;
use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::theme::{C_MUTED, C_SECONDARY};

const BLOCKS: [char; 9] = [' ', '▏', '▎', '▍', '▌', '▋', '▊', '▉', '█'];

/// Render `progress` (0.0..=1.0) as `elapsed ███▌    total` in `area`.
///
/// Labels are only drawn once the total length is known.
pub fn draw_progress(
    frame: &mut Frame,
    area: Rect,
    progress: f64,
    total_secs: Option<f64>,
    color: Color,
) {
    if area.width < 4 || area.height == 0 {
        return;
    }

    let (left, right) = labels(progress, total_secs);
    let label_w = (left.len() + right.len() + 2) as u16;
    let bar_w = area.width.saturating_sub(label_w).max(4) as usize;

    let mut spans = Vec::with_capacity(3);
    if !left.is_empty() {
        spans.push(Span::styled(format!("{} ", left), Style::default().fg(C_SECONDARY)));
    }
    spans.push(Span::styled(bar(progress, bar_w), Style::default().fg(color)));
    if !right.is_empty() {
        spans.push(Span::styled(format!(" {}", right), Style::default().fg(C_MUTED)));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn labels(progress: f64, total_secs: Option<f64>) -> (String, String) {
    match total_secs {
        Some(total) => (
            format_duration(progress.clamp(0.0, 1.0) * total),
            format_duration(total),
        ),
        None => (String::new(), String::new()),
    }
}

/// Eighth-block fill, always exactly `width` chars.
fn bar(progress: f64, width: usize) -> String {
    let eighths = (progress.clamp(0.0, 1.0) * width as f64 * 8.0) as usize;
    let full = (eighths / 8).min(width);
    let mut out = String::with_capacity(width * 3);
    out.extend(std::iter::repeat('█').take(full));
    if full < width {
        out.push(BLOCKS[eighths % 8]);
        out.extend(std::iter::repeat(' ').take(width - full - 1));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_width_is_stable() {
        for p in [0.0, 0.13, 0.5, 0.999, 1.0, 4.0, -1.0] {
            assert_eq!(bar(p, 10).chars().count(), 10, "progress {}", p);
        }
        assert_eq!(bar(1.0, 4), "████");
        assert_eq!(bar(0.5, 4), "██  ");
    }

    #[test]
    fn test_labels_follow_total() {
        assert_eq!(labels(0.5, None), (String::new(), String::new()));
        assert_eq!(
            labels(0.25, Some(200.0)),
            ("0:50".to_string(), "3:20".to_string())
        );
    }
}
