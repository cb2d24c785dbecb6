// widgetdesk-widgets/src/notes.rs
use crossterm::event::{KeyCode, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    prelude::Widget as RatatuiWidget,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
};
use widgetdesk_core::{Event, EventResult, Locale, Size, Widget, WidgetConfig, WidgetContext};

use crate::common::widget_block;

/// Free-text note persisted in the widget config under `content`
///
/// The host saves the config after every handled key, so edits survive a
/// crash or a closed terminal.
///
/// # Keyboard Shortcuts
/// - Printable keys insert text, `Enter` starts a new line
/// - `Backspace`/`Delete` - Remove the character before/under the cursor
/// - `Left`/`Right` - Move the cursor
/// - `Home`/`End` - Jump to the start/end of the line
pub struct NotesWidget {
    content: String,
    /// Byte offset into `content`, always on a char boundary
    cursor: usize,
    locale: Locale,
}

impl NotesWidget {
    pub fn new(ctx: &WidgetContext) -> Self {
        Self {
            content: String::new(),
            cursor: 0,
            locale: ctx.locale,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn insert(&mut self, c: char) {
        self.content.insert(self.cursor, c);
        self.cursor += c.len_utf8();
    }

    pub fn backspace(&mut self) -> bool {
        let Some(c) = self.content[..self.cursor].chars().next_back() else {
            return false;
        };
        self.cursor -= c.len_utf8();
        self.content.remove(self.cursor);
        true
    }

    pub fn delete(&mut self) -> bool {
        if self.cursor >= self.content.len() {
            return false;
        }
        self.content.remove(self.cursor);
        true
    }

    fn left(&mut self) {
        if let Some(c) = self.content[..self.cursor].chars().next_back() {
            self.cursor -= c.len_utf8();
        }
    }

    fn right(&mut self) {
        if let Some(c) = self.content[self.cursor..].chars().next() {
            self.cursor += c.len_utf8();
        }
    }

    fn home(&mut self) {
        self.cursor = self.content[..self.cursor]
            .rfind('\n')
            .map(|i| i + 1)
            .unwrap_or(0);
    }

    fn end(&mut self) {
        self.cursor += self.content[self.cursor..]
            .find('\n')
            .unwrap_or(self.content.len() - self.cursor);
    }

    fn lines(&self, focused: bool) -> Vec<Line<'static>> {
        let cursor_style = Style::default().add_modifier(Modifier::REVERSED);
        let cursor_line = self.content[..self.cursor].matches('\n').count();
        let mut offset = 0;
        let mut lines = Vec::new();

        for (i, text) in self.content.split('\n').enumerate() {
            if focused && i == cursor_line {
                let (head, tail) = text.split_at(self.cursor - offset);
                let mut rest = tail.chars();
                let under = rest.next().map(String::from).unwrap_or_else(|| " ".into());
                lines.push(Line::from(vec![
                    Span::raw(head.to_string()),
                    Span::styled(under, cursor_style),
                    Span::raw(rest.as_str().to_string()),
                ]));
            } else {
                lines.push(Line::raw(text.to_string()));
            }
            offset += text.len() + 1;
        }
        lines
    }
}

impl Widget for NotesWidget {
    fn on_activate(&mut self, config: &WidgetConfig) {
        self.content = config.get_str("content").unwrap_or_default().to_string();
        self.cursor = self.content.len();
    }

    fn on_event(&mut self, event: Event) -> EventResult {
        let Event::Key(key) = event else {
            return EventResult::Ignored;
        };
        if key
            .modifiers
            .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
        {
            return EventResult::Ignored;
        }

        match key.code {
            KeyCode::Char(c) => self.insert(c),
            KeyCode::Enter => self.insert('\n'),
            KeyCode::Backspace => {
                self.backspace();
            }
            KeyCode::Delete => {
                self.delete();
            }
            KeyCode::Left => self.left(),
            KeyCode::Right => self.right(),
            KeyCode::Home => self.home(),
            KeyCode::End => self.end(),
            _ => return EventResult::Ignored,
        }
        EventResult::Consumed
    }

    fn render(&mut self, area: Rect, buf: &mut Buffer) {
        self.render_focused(area, buf, false);
    }

    fn render_focused(&mut self, area: Rect, buf: &mut Buffer, focused: bool) {
        let block = widget_block(self.locale.tr("notes.title"), focused);
        let inner = block.inner(area);
        block.render(area, buf);

        if self.content.is_empty() && !focused {
            Paragraph::new(self.locale.tr("notes.empty"))
                .style(Style::default().fg(Color::DarkGray))
                .render(inner, buf);
            return;
        }

        let cursor_line = self.content[..self.cursor].matches('\n').count() as u16;
        let scroll = cursor_line.saturating_sub(inner.height.saturating_sub(1));
        Paragraph::new(self.lines(focused))
            .style(Style::default().fg(Color::White))
            .scroll((scroll, 0))
            .render(inner, buf);
    }

    fn preferred_size(&self) -> Option<Size> {
        Some(Size {
            width: 30,
            height: 8,
        })
    }

    fn on_locale_changed(&mut self, locale: &Locale) {
        self.locale = *locale;
    }

    fn store_settings(&self, config: &mut WidgetConfig) {
        config.set("content", self.content.as_str());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEvent;
    use std::path::PathBuf;
    use widgetdesk_core::EventBus;

    fn widget() -> NotesWidget {
        NotesWidget::new(&WidgetContext {
            name: "notes".to_string(),
            environment: PathBuf::new(),
            bus: EventBus::new(),
            locale: Locale::default(),
        })
    }

    fn press(widget: &mut NotesWidget, code: KeyCode) -> EventResult {
        widget.on_event(Event::Key(KeyEvent::new(code, KeyModifiers::NONE)))
    }

    fn type_text(widget: &mut NotesWidget, text: &str) {
        for c in text.chars() {
            press(widget, KeyCode::Char(c));
        }
    }

    #[test]
    fn test_typing_and_new_lines() {
        let mut notes = widget();
        type_text(&mut notes, "ab");
        press(&mut notes, KeyCode::Enter);
        type_text(&mut notes, "cd");
        press(&mut notes, KeyCode::Backspace);

        assert_eq!(notes.content(), "ab\nc");
    }

    #[test]
    fn test_cursor_moves_over_multibyte_chars() {
        let mut notes = widget();
        type_text(&mut notes, "héllo");
        for _ in 0..3 {
            press(&mut notes, KeyCode::Left);
        }
        press(&mut notes, KeyCode::Backspace);
        assert_eq!(notes.content(), "hllo");

        press(&mut notes, KeyCode::Home);
        press(&mut notes, KeyCode::Delete);
        assert_eq!(notes.content(), "llo");

        press(&mut notes, KeyCode::End);
        type_text(&mut notes, "!");
        assert_eq!(notes.content(), "llo!");
    }

    #[test]
    fn test_home_and_end_stay_on_the_line() {
        let mut notes = widget();
        type_text(&mut notes, "one");
        press(&mut notes, KeyCode::Enter);
        type_text(&mut notes, "two");

        press(&mut notes, KeyCode::Home);
        type_text(&mut notes, ">");
        press(&mut notes, KeyCode::End);
        type_text(&mut notes, "<");

        assert_eq!(notes.content(), "one\n>two<");
    }

    #[test]
    fn test_control_keys_are_left_to_the_host() {
        let mut notes = widget();
        let ctrl_s = KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL);

        assert_eq!(notes.on_event(Event::Key(ctrl_s)), EventResult::Ignored);
        assert_eq!(press(&mut notes, KeyCode::Tab), EventResult::Ignored);
        assert!(notes.content().is_empty());
    }

    #[test]
    fn test_content_round_trips_through_config() {
        let mut notes = widget();
        type_text(&mut notes, "call mum");
        press(&mut notes, KeyCode::Enter);
        type_text(&mut notes, "buy bread");

        let mut config = WidgetConfig::default();
        notes.store_settings(&mut config);
        assert_eq!(config.get_str("content"), Some("call mum\nbuy bread"));

        let mut restored = widget();
        restored.on_activate(&config);
        type_text(&mut restored, "!");
        assert_eq!(restored.content(), "call mum\nbuy bread!");
    }

    #[test]
    fn test_render_shows_every_line() {
        let mut notes = widget();
        type_text(&mut notes, "first");
        press(&mut notes, KeyCode::Enter);
        type_text(&mut notes, "second");

        let area = Rect::new(0, 0, 30, 8);
        let mut buf = Buffer::empty(area);
        notes.render_focused(area, &mut buf, true);

        let text: String = buf.content().iter().map(|c| c.symbol()).collect();
        assert!(text.contains("first"));
        assert!(text.contains("second"));
    }
}
