use ratatui::{
    buffer::Buffer,
    layout::Rect,
    prelude::Widget as RatatuiWidget,
    style::{Color, Style},
    widgets::{Block, Borders, Paragraph, Wrap},
};
use widgetdesk_core::{Locale, Size, Widget};

/// Widget that displays error messages in the overlay
#[derive(Debug)]
pub struct ErrorWidget {
    message: String,
    title: String,
    border_color: Color,
}

impl ErrorWidget {
    pub fn new(message: String) -> Self {
        Self {
            title: "Error".to_string(),
            border_color: Color::Red,
            message,
        }
    }

    /// Inline notice for a widget that could not be activated
    pub fn activation_failed(widget: &str, reason: &str, locale: &Locale) -> Self {
        Self {
            title: format!("{}: {}", locale.tr("widget.failed"), widget),
            border_color: Color::Red,
            message: reason.to_string(),
        }
    }
}

impl Default for ErrorWidget {
    fn default() -> Self {
        Self::new("An unknown error occurred.".to_string())
    }
}

impl Widget for ErrorWidget {
    fn render(&mut self, area: Rect, buf: &mut Buffer) {
        self.render_focused(area, buf, false);
    }

    fn render_focused(&mut self, area: Rect, buf: &mut Buffer, _focused: bool) {
        let block = Block::default()
            .title(self.title.as_str())
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.border_color));

        let paragraph = Paragraph::new(self.message.as_str())
            .block(block)
            .wrap(Wrap { trim: true })
            .style(Style::default().fg(Color::White));

        RatatuiWidget::render(paragraph, area, buf);
    }

    fn preferred_size(&self) -> Option<Size> {
        Some(Size {
            width: 40,
            height: 4,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activation_failed_is_localized() {
        let mut widget = ErrorWidget::activation_failed("weather", "boom", &Locale::new("nl"));
        let area = Rect::new(0, 0, 60, 4);
        let mut buf = Buffer::empty(area);
        widget.render(area, &mut buf);

        let text: String = buf.content().iter().map(|c| c.symbol()).collect();
        assert!(text.contains("Widget kon niet worden geactiveerd: weather"));
        assert!(text.contains("boom"));
    }
}
