// widgetdesk-core/src/widget.rs
use crate::event::EventBus;
use crate::locale::Locale;
use crate::widget_config::WidgetConfig;
use ratatui::{buffer::Buffer, layout::Rect};
use std::path::PathBuf;
use std::time::Duration;

/// Core widget trait with lifecycle hooks
pub trait Widget: Send {
    /// Called once after the instance is created, with its persisted config
    fn on_activate(&mut self, _config: &WidgetConfig) {}

    /// Called every tick with delta time since last update
    fn on_update(&mut self, _delta: Duration) {}

    /// Handle input events routed to the widget while it has focus
    fn on_event(&mut self, _event: Event) -> EventResult {
        EventResult::Ignored
    }

    /// Render the widget to the buffer
    fn render(&mut self, area: Rect, buf: &mut Buffer);

    /// Render the widget with focus awareness (default implementation calls render)
    fn render_focused(&mut self, area: Rect, buf: &mut Buffer, _focused: bool) {
        self.render(area, buf);
    }

    /// Size used when the config does not carry one (None = host default)
    fn preferred_size(&self) -> Option<Size> {
        None
    }

    /// Whether widget needs regular updates (for clocks/polling)
    fn needs_update(&self) -> bool {
        false
    }

    /// The UI language changed
    fn on_locale_changed(&mut self, _locale: &Locale) {}

    /// Write widget-specific state into the config before it is saved
    fn store_settings(&self, _config: &mut WidgetConfig) {}

    /// Shutdown hook, called right before the instance is dropped
    fn on_close(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    pub width: u16,
    pub height: u16,
}

#[derive(Debug, Clone)]
pub enum Event {
    Key(crossterm::event::KeyEvent),
    /// Mouse event with coordinates relative to the widget's top-left corner
    Mouse(crossterm::event::MouseEvent),
    /// The user finished resizing the widget to (width, height)
    Resize(u16, u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventResult {
    Consumed, // Stop propagation
    Ignored,  // Continue to next handler
}

/// Everything a factory may use to build an instance
#[derive(Clone)]
pub struct WidgetContext {
    pub name: String,
    /// Provisioned dependency environment of this widget
    pub environment: PathBuf,
    pub bus: EventBus,
    pub locale: Locale,
}
