// widgetdesk-widgets/src/clock.rs
use chrono::{DateTime, Local};
use crossterm::event::KeyCode;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Rect},
    prelude::Widget as RatatuiWidget,
    style::{Color, Modifier, Style},
    text::Line,
    widgets::Paragraph,
};
use std::fmt::Write;
use std::time::Duration;
use widgetdesk_core::{Event, EventResult, Locale, Size, Widget, WidgetConfig, WidgetContext};

use crate::common::widget_block;

pub const DEFAULT_TIME_FORMAT: &str = "%H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Current time in a configurable strftime format
///
/// # Config
/// - `time_format` - chrono strftime pattern, default `%H:%M:%S`
/// - `show_date` - draw the date below the time, default true
///
/// # Keyboard Shortcuts
/// - `d` - Toggle the date line
pub struct ClockWidget {
    title: String,
    time_format: String,
    show_date: bool,
    now: DateTime<Local>,
}

impl ClockWidget {
    pub fn new(ctx: &WidgetContext) -> Self {
        Self {
            title: ctx.locale.tr("clock.title").to_string(),
            time_format: DEFAULT_TIME_FORMAT.to_string(),
            show_date: true,
            now: Local::now(),
        }
    }

    fn time_text(&self) -> String {
        format_time(&self.now, &self.time_format)
    }
}

/// Format with `pattern`, falling back to the default for invalid patterns
pub fn format_time(now: &DateTime<Local>, pattern: &str) -> String {
    let mut out = String::new();
    if write!(out, "{}", now.format(pattern)).is_ok() {
        return out;
    }
    now.format(DEFAULT_TIME_FORMAT).to_string()
}

impl Widget for ClockWidget {
    fn on_activate(&mut self, config: &WidgetConfig) {
        if let Some(format) = config.get_str("time_format") {
            self.time_format = format.to_string();
        }
        if let Some(show_date) = config.get_bool("show_date") {
            self.show_date = show_date;
        }
        self.now = Local::now();
    }

    fn on_update(&mut self, _delta: Duration) {
        self.now = Local::now();
    }

    fn on_event(&mut self, event: Event) -> EventResult {
        if let Event::Key(key) = event
            && key.code == KeyCode::Char('d')
        {
            self.show_date = !self.show_date;
            return EventResult::Consumed;
        }
        EventResult::Ignored
    }

    fn render(&mut self, area: Rect, buf: &mut Buffer) {
        self.render_focused(area, buf, false);
    }

    fn render_focused(&mut self, area: Rect, buf: &mut Buffer, focused: bool) {
        let mut lines = vec![Line::styled(
            self.time_text(),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )];
        if self.show_date {
            lines.push(Line::styled(
                self.now.format(DATE_FORMAT).to_string(),
                Style::default().fg(Color::Gray),
            ));
        }

        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(widget_block(&self.title, focused))
            .render(area, buf);
    }

    fn preferred_size(&self) -> Option<Size> {
        Some(Size {
            width: 24,
            height: 4,
        })
    }

    fn needs_update(&self) -> bool {
        true
    }

    fn on_locale_changed(&mut self, locale: &Locale) {
        self.title = locale.tr("clock.title").to_string();
    }

    fn store_settings(&self, config: &mut WidgetConfig) {
        config.set("time_format", self.time_format.as_str());
        config.set("show_date", self.show_date);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn noon() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 12, 5, 7).unwrap()
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(&noon(), DEFAULT_TIME_FORMAT), "12:05:07");
        assert_eq!(format_time(&noon(), "%H:%M"), "12:05");
    }

    #[test]
    fn test_invalid_format_falls_back() {
        assert_eq!(format_time(&noon(), "%Q broken %"), "12:05:07");
    }
}
