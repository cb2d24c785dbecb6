//! Counter widget loaded from a dynamic library.
//!
//! Build with `cargo build --release` in this directory, copy
//! `example.toml` and the built library into the widget directory.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    prelude::Widget as RatatuiWidget,
    style::{Color, Style},
    widgets::{Block, Borders, Paragraph},
};
use std::time::Duration;
use widgetdesk_plugin_sdk::*;

const MAX_SPEED: u64 = 5;

fn focus_color(focused: bool) -> Color {
    if focused {
        Color::Yellow
    } else {
        Color::DarkGray
    }
}

struct ExampleWidget {
    counter: u64,
    paused: bool,
    speed: u64,
    title: &'static str,
}

impl Default for ExampleWidget {
    fn default() -> Self {
        Self {
            counter: 0,
            paused: false,
            speed: 1,
            title: "Example",
        }
    }
}

impl Widget for ExampleWidget {
    fn on_activate(&mut self, config: &WidgetConfig) {
        self.counter = config.get_u64("counter").unwrap_or(0);
        self.speed = config.get_u64("speed").unwrap_or(1).clamp(1, MAX_SPEED);
    }

    fn on_update(&mut self, _delta: Duration) {
        if !self.paused {
            self.counter += self.speed;
        }
    }

    fn on_event(&mut self, event: Event) -> EventResult {
        use crossterm::event::KeyCode;

        let Event::Key(key) = event else {
            return EventResult::Ignored;
        };

        match key.code {
            KeyCode::Char(' ') => self.paused = !self.paused,
            KeyCode::Char('+') | KeyCode::Char('=') => {
                self.speed = (self.speed + 1).min(MAX_SPEED)
            }
            KeyCode::Char('-') => self.speed = self.speed.saturating_sub(1).max(1),
            KeyCode::Char('r') => self.counter = 0,
            _ => return EventResult::Ignored,
        }
        EventResult::Consumed
    }

    fn render(&mut self, area: Rect, buf: &mut Buffer) {
        self.render_focused(area, buf, false);
    }

    fn render_focused(&mut self, area: Rect, buf: &mut Buffer, focused: bool) {
        let block = Block::default()
            .title(format!(" {} ", self.title))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(focus_color(focused)));

        let status = if self.paused { "paused" } else { "running" };
        let text = format!(
            "{}  ({}, x{})\n[Space] pause  [+/-] speed  [r] reset",
            self.counter, status, self.speed
        );

        RatatuiWidget::render(
            Paragraph::new(text)
                .block(block)
                .style(Style::default().fg(Color::White)),
            area,
            buf,
        );
    }

    fn preferred_size(&self) -> Option<Size> {
        Some(Size {
            width: 40,
            height: 4,
        })
    }

    fn needs_update(&self) -> bool {
        !self.paused
    }

    fn on_locale_changed(&mut self, locale: &Locale) {
        self.title = if locale.language() == "nl" {
            "Voorbeeld"
        } else {
            "Example"
        };
    }

    fn store_settings(&self, config: &mut WidgetConfig) {
        config.set("counter", self.counter);
        config.set("speed", self.speed);
    }
}

export_widget!(ExampleWidget, "example");
