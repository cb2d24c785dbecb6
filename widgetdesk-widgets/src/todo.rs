// widgetdesk-widgets/src/todo.rs
use crossterm::event::{KeyCode, MouseButton, MouseEventKind};
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    prelude::Widget as RatatuiWidget,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
};
use serde::{Deserialize, Serialize};
use tracing::warn;
use widgetdesk_core::{Event, EventResult, Locale, Size, Widget, WidgetConfig, WidgetContext};

use crate::common::widget_block;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoItem {
    pub text: String,
    #[serde(default)]
    pub done: bool,
}

/// To-do list persisted in the widget config under `items`
///
/// # Keyboard Shortcuts
/// - `a` - Start typing a new item, `Enter` adds it, `Esc` cancels
/// - `Space` - Toggle the selected item
/// - `d` - Delete the selected item
/// - `Up`/`Down` - Move the selection
pub struct TodoWidget {
    items: Vec<TodoItem>,
    selected: usize,
    input: Option<String>,
    locale: Locale,
}

impl TodoWidget {
    pub fn new(ctx: &WidgetContext) -> Self {
        Self {
            items: Vec::new(),
            selected: 0,
            input: None,
            locale: ctx.locale,
        }
    }

    pub fn items(&self) -> &[TodoItem] {
        &self.items
    }

    pub fn add(&mut self, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        self.items.push(TodoItem {
            text: text.to_string(),
            done: false,
        });
        self.selected = self.items.len() - 1;
        true
    }

    pub fn toggle_selected(&mut self) -> bool {
        match self.items.get_mut(self.selected) {
            Some(item) => {
                item.done = !item.done;
                true
            }
            None => false,
        }
    }

    pub fn delete_selected(&mut self) -> bool {
        if self.selected >= self.items.len() {
            return false;
        }
        self.items.remove(self.selected);
        self.selected = self.selected.min(self.items.len().saturating_sub(1));
        true
    }

    fn handle_input_key(&mut self, code: KeyCode) -> EventResult {
        let Some(input) = self.input.as_mut() else {
            return EventResult::Ignored;
        };

        match code {
            KeyCode::Char(c) => input.push(c),
            KeyCode::Backspace => {
                input.pop();
            }
            KeyCode::Enter => {
                if let Some(text) = self.input.take() {
                    self.add(&text);
                }
            }
            KeyCode::Esc => self.input = None,
            _ => return EventResult::Ignored,
        }
        EventResult::Consumed
    }

    fn handle_list_key(&mut self, code: KeyCode) -> EventResult {
        match code {
            KeyCode::Char('a') | KeyCode::Char('i') => {
                self.input = Some(String::new());
                EventResult::Consumed
            }
            KeyCode::Char(' ') => {
                self.toggle_selected();
                EventResult::Consumed
            }
            KeyCode::Char('d') | KeyCode::Delete => {
                self.delete_selected();
                EventResult::Consumed
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected = self.selected.saturating_sub(1);
                EventResult::Consumed
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected + 1 < self.items.len() {
                    self.selected += 1;
                }
                EventResult::Consumed
            }
            _ => EventResult::Ignored,
        }
    }
}

impl Widget for TodoWidget {
    fn on_activate(&mut self, config: &WidgetConfig) {
        let Some(items) = config.settings.get("items") else {
            return;
        };
        match serde_json::from_value::<Vec<TodoItem>>(items.clone()) {
            Ok(items) => self.items = items,
            Err(e) => warn!(error = %e, "ignoring malformed to-do items"),
        }
    }

    fn on_event(&mut self, event: Event) -> EventResult {
        match event {
            Event::Key(key) if self.input.is_some() => self.handle_input_key(key.code),
            Event::Key(key) => self.handle_list_key(key.code),
            Event::Mouse(mouse) if mouse.kind == MouseEventKind::Down(MouseButton::Left) => {
                // Row 0 is the border
                let index = usize::from(mouse.row).saturating_sub(1);
                if mouse.row > 0 && index < self.items.len() {
                    self.selected = index;
                    return EventResult::Consumed;
                }
                EventResult::Ignored
            }
            _ => EventResult::Ignored,
        }
    }

    fn render(&mut self, area: Rect, buf: &mut Buffer) {
        self.render_focused(area, buf, false);
    }

    fn render_focused(&mut self, area: Rect, buf: &mut Buffer, focused: bool) {
        let block = widget_block(self.locale.tr("todo.title"), focused);
        let inner = block.inner(area);
        block.render(area, buf);

        let [list_area, input_area] =
            Layout::vertical([Constraint::Min(0), Constraint::Length(1)]).areas(inner);

        let lines: Vec<Line> = if self.items.is_empty() {
            vec![Line::styled(
                self.locale.tr("todo.empty"),
                Style::default().fg(Color::DarkGray),
            )]
        } else {
            self.items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    let mark = if item.done { "[x] " } else { "[ ] " };
                    let mut style = if item.done {
                        Style::default()
                            .fg(Color::DarkGray)
                            .add_modifier(Modifier::CROSSED_OUT)
                    } else {
                        Style::default().fg(Color::White)
                    };
                    if focused && i == self.selected {
                        style = style.bg(Color::Blue);
                    }
                    Line::from(vec![Span::raw(mark), Span::styled(item.text.clone(), style)])
                })
                .collect()
        };

        let scroll = (self.selected as u16).saturating_sub(list_area.height.saturating_sub(1));
        Paragraph::new(lines)
            .scroll((scroll, 0))
            .render(list_area, buf);

        let prompt = match &self.input {
            Some(text) => Line::from(vec![
                Span::styled("> ", Style::default().fg(Color::Yellow)),
                Span::raw(text.clone()),
                Span::styled("_", Style::default().fg(Color::Yellow)),
            ]),
            None => Line::styled(
                format!("[a] {}", self.locale.tr("todo.input")),
                Style::default().fg(Color::DarkGray),
            ),
        };
        Paragraph::new(prompt).render(input_area, buf);
    }

    fn preferred_size(&self) -> Option<Size> {
        Some(Size {
            width: 32,
            height: 10,
        })
    }

    fn on_locale_changed(&mut self, locale: &Locale) {
        self.locale = *locale;
    }

    fn store_settings(&self, config: &mut WidgetConfig) {
        match serde_json::to_value(&self.items) {
            Ok(items) => config.set("items", items),
            Err(e) => warn!(error = %e, "could not serialize to-do items"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEvent, KeyModifiers};
    use std::path::PathBuf;
    use widgetdesk_core::EventBus;

    fn widget() -> TodoWidget {
        TodoWidget::new(&WidgetContext {
            name: "todo".to_string(),
            environment: PathBuf::new(),
            bus: EventBus::new(),
            locale: Locale::default(),
        })
    }

    fn press(widget: &mut TodoWidget, code: KeyCode) -> EventResult {
        widget.on_event(Event::Key(KeyEvent::new(code, KeyModifiers::NONE)))
    }

    fn type_item(widget: &mut TodoWidget, text: &str) {
        press(widget, KeyCode::Char('a'));
        for c in text.chars() {
            press(widget, KeyCode::Char(c));
        }
        press(widget, KeyCode::Enter);
    }

    #[test]
    fn test_type_and_enter_adds_item() {
        let mut todo = widget();
        type_item(&mut todo, "buy milk");
        type_item(&mut todo, "   ");

        assert_eq!(
            todo.items(),
            [TodoItem {
                text: "buy milk".to_string(),
                done: false
            }]
        );
    }

    #[test]
    fn test_toggle_and_delete() {
        let mut todo = widget();
        type_item(&mut todo, "one");
        type_item(&mut todo, "two");

        press(&mut todo, KeyCode::Up);
        press(&mut todo, KeyCode::Char(' '));
        assert!(todo.items()[0].done);

        press(&mut todo, KeyCode::Char('d'));
        assert_eq!(todo.items().len(), 1);
        assert_eq!(todo.items()[0].text, "two");

        press(&mut todo, KeyCode::Char('d'));
        assert!(todo.items().is_empty());
        assert_eq!(press(&mut todo, KeyCode::Char('d')), EventResult::Consumed);
    }

    #[test]
    fn test_items_round_trip_through_config() {
        let mut todo = widget();
        type_item(&mut todo, "write tests");
        todo.toggle_selected();

        let mut config = WidgetConfig::default();
        todo.store_settings(&mut config);

        let mut restored = widget();
        restored.on_activate(&config);
        assert_eq!(restored.items(), todo.items());
    }
}
