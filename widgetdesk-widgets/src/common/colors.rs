// widgetdesk-widgets/src/common/colors.rs
use ratatui::{
    style::{Color, Style},
    widgets::{Block, Borders},
};

/// Threshold constants for usage-based coloring
pub const LOW_THRESHOLD: f64 = 60.0;
pub const HIGH_THRESHOLD: f64 = 80.0;

/// Get color based on usage percentage
///
/// # Returns
/// Color based on thresholds:
/// - Green: < 60%
/// - Yellow: 60% - 80%
/// - Red: >= 80%
pub fn usage_color(percentage: f64) -> Color {
    if percentage < LOW_THRESHOLD {
        Color::Green
    } else if percentage < HIGH_THRESHOLD {
        Color::Yellow
    } else {
        Color::Red
    }
}

/// Yellow if focused, DarkGray if not
pub fn focus_color(focused: bool) -> Color {
    if focused {
        Color::Yellow
    } else {
        Color::DarkGray
    }
}

/// Bordered frame shared by the built-in widgets; the top row doubles as
/// the overlay's drag handle.
pub fn widget_block(title: &str, focused: bool) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .title(format!(" {} ", title))
        .border_style(Style::default().fg(focus_color(focused)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_color() {
        assert_eq!(usage_color(0.0), Color::Green);
        assert_eq!(usage_color(59.9), Color::Green);
        assert_eq!(usage_color(60.0), Color::Yellow);
        assert_eq!(usage_color(79.9), Color::Yellow);
        assert_eq!(usage_color(80.0), Color::Red);
        assert_eq!(usage_color(100.0), Color::Red);
    }

    #[test]
    fn test_focus_color() {
        assert_eq!(focus_color(true), Color::Yellow);
        assert_eq!(focus_color(false), Color::DarkGray);
    }
}
