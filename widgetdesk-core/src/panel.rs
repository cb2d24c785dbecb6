// widgetdesk-core/src/panel.rs
//! Settings panel: widget toggles, the focused widget's own settings,
//! language, rescan and quit.

use crate::locale::{Locale, SUPPORTED_LANGUAGES};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    prelude::Widget as RatatuiWidget,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
};
use serde_json::{Map, Number, Value};

/// What the host should do after a key press in the panel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelAction {
    None,
    Close,
    ToggleWidget { name: String, enabled: bool },
    SetLanguage(String),
    /// Persist `key = value` in the widget's config and re-create it
    UpdateSetting {
        widget: String,
        key: String,
        value: Value,
    },
    Rescan,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct WidgetEntry {
    name: String,
    title: String,
    enabled: bool,
}

/// The widget whose settings the panel offers to edit
#[derive(Debug, Clone, PartialEq)]
pub struct FocusedWidget {
    pub name: String,
    pub title: String,
    pub settings: Map<String, Value>,
}

/// Editor for the scalar settings of one widget
#[derive(Debug, Clone, PartialEq)]
struct SettingsEditor {
    widget: String,
    title: String,
    entries: Vec<(String, Value)>,
    cursor: usize,
    input: Option<String>,
    invalid: bool,
}

impl SettingsEditor {
    fn new(focused: &FocusedWidget) -> Self {
        Self {
            widget: focused.name.clone(),
            title: focused.title.clone(),
            entries: editable_entries(&focused.settings),
            cursor: 0,
            input: None,
            invalid: false,
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Option<PanelAction> {
        if let Some(input) = self.input.as_mut() {
            match key.code {
                KeyCode::Char(c) => {
                    input.push(c);
                    self.invalid = false;
                }
                KeyCode::Backspace => {
                    input.pop();
                    self.invalid = false;
                }
                KeyCode::Esc => {
                    self.input = None;
                    self.invalid = false;
                }
                KeyCode::Enter => return Some(self.commit()),
                _ => {}
            }
            return Some(PanelAction::None);
        }

        match key.code {
            KeyCode::Esc => None,
            KeyCode::Up | KeyCode::Char('k') if !self.entries.is_empty() => {
                self.cursor = self
                    .cursor
                    .checked_sub(1)
                    .unwrap_or(self.entries.len() - 1);
                Some(PanelAction::None)
            }
            KeyCode::Down | KeyCode::Char('j') if !self.entries.is_empty() => {
                self.cursor = (self.cursor + 1) % self.entries.len();
                Some(PanelAction::None)
            }
            KeyCode::Enter | KeyCode::Char(' ') => {
                let Some((key, value)) = self.entries.get_mut(self.cursor) else {
                    return Some(PanelAction::None);
                };
                if let Value::Bool(flag) = value {
                    *flag = !*flag;
                    return Some(PanelAction::UpdateSetting {
                        widget: self.widget.clone(),
                        key: key.clone(),
                        value: value.clone(),
                    });
                }
                self.input = Some(display_value(value));
                Some(PanelAction::None)
            }
            _ => Some(PanelAction::None),
        }
    }

    fn commit(&mut self) -> PanelAction {
        let (Some(text), Some((key, current))) =
            (self.input.as_ref(), self.entries.get_mut(self.cursor))
        else {
            return PanelAction::None;
        };

        let Some(value) = parse_like(current, text.trim()) else {
            self.invalid = true;
            return PanelAction::None;
        };

        *current = value.clone();
        self.input = None;
        PanelAction::UpdateSetting {
            widget: self.widget.clone(),
            key: key.clone(),
            value,
        }
    }
}

/// Single-line scalar settings, sorted by key
fn editable_entries(settings: &Map<String, Value>) -> Vec<(String, Value)> {
    let mut entries: Vec<(String, Value)> = settings
        .iter()
        .filter(|(_, value)| match value {
            Value::Bool(_) | Value::Number(_) => true,
            Value::String(s) => !s.contains('\n'),
            _ => false,
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    entries
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Parse `text` as a value of the same kind as `current`
fn parse_like(current: &Value, text: &str) -> Option<Value> {
    match current {
        Value::String(_) => Some(Value::String(text.to_string())),
        Value::Bool(_) => text.parse::<bool>().ok().map(Value::Bool),
        Value::Number(n) if n.is_u64() => text.parse::<u64>().ok().map(Value::from),
        Value::Number(n) if n.is_i64() => text.parse::<i64>().ok().map(Value::from),
        Value::Number(_) => text
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number),
        _ => None,
    }
}

#[derive(Debug, Default)]
pub struct SettingsPanel {
    open: bool,
    cursor: usize,
    widgets: Vec<WidgetEntry>,
    language: String,
    focused: Option<FocusedWidget>,
    editor: Option<SettingsEditor>,
}

impl SettingsPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Open with the current widget list as (name, title, enabled)
    pub fn open(&mut self, widgets: Vec<(String, String, bool)>, language: &str) {
        self.open = true;
        self.refresh(widgets, language);
    }

    pub fn close(&mut self) {
        self.open = false;
        self.editor = None;
    }

    /// Offer the settings of the focused widget, if any.
    ///
    /// An editor already open for the same widget keeps its cursor and
    /// picks up the new values.
    pub fn set_focused_widget(&mut self, focused: Option<FocusedWidget>) {
        let same_widget = self
            .editor
            .as_ref()
            .zip(focused.as_ref())
            .is_some_and(|(editor, f)| editor.widget == f.name);
        if !same_widget {
            self.editor = None;
        }
        if let (Some(editor), Some(f)) = (self.editor.as_mut(), focused.as_ref()) {
            editor.entries = editable_entries(&f.settings);
            editor.cursor = editor.cursor.min(editor.entries.len().saturating_sub(1));
        }
        self.focused = focused;
        self.cursor = self.cursor.min(self.item_count() - 1);
    }

    /// Name of the widget whose settings are being edited
    pub fn editing(&self) -> Option<&str> {
        self.editor.as_ref().map(|e| e.widget.as_str())
    }

    /// Replace the listed state, keeping the cursor in range
    pub fn refresh(&mut self, widgets: Vec<(String, String, bool)>, language: &str) {
        self.widgets = widgets
            .into_iter()
            .map(|(name, title, enabled)| WidgetEntry {
                name,
                title,
                enabled,
            })
            .collect();
        self.language = language.to_string();
        self.cursor = self.cursor.min(self.item_count() - 1);
    }

    fn item_count(&self) -> usize {
        // widgets + widget settings + language + rescan + quit
        self.widgets.len() + self.settings_rows() + 3
    }

    fn settings_rows(&self) -> usize {
        usize::from(self.focused.is_some())
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> PanelAction {
        if key.code == KeyCode::F(2) {
            self.close();
            return PanelAction::Close;
        }

        if let Some(editor) = self.editor.as_mut() {
            match editor.handle_key(key) {
                Some(action) => return action,
                None => {
                    self.editor = None;
                    return PanelAction::None;
                }
            }
        }

        match key.code {
            KeyCode::Esc => {
                self.close();
                PanelAction::Close
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.cursor = self.cursor.checked_sub(1).unwrap_or(self.item_count() - 1);
                PanelAction::None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.cursor = (self.cursor + 1) % self.item_count();
                PanelAction::None
            }
            KeyCode::Enter | KeyCode::Char(' ') => self.select(),
            _ => PanelAction::None,
        }
    }

    fn select(&mut self) -> PanelAction {
        let widgets = self.widgets.len();

        if let Some(entry) = self.widgets.get_mut(self.cursor) {
            entry.enabled = !entry.enabled;
            return PanelAction::ToggleWidget {
                name: entry.name.clone(),
                enabled: entry.enabled,
            };
        }

        let mut row = self.cursor - widgets;
        if let Some(focused) = &self.focused {
            if row == 0 {
                self.editor = Some(SettingsEditor::new(focused));
                return PanelAction::None;
            }
            row -= 1;
        }

        match row {
            0 => {
                let current = SUPPORTED_LANGUAGES
                    .iter()
                    .position(|(code, _)| *code == self.language)
                    .unwrap_or(0);
                let (next, _) = SUPPORTED_LANGUAGES[(current + 1) % SUPPORTED_LANGUAGES.len()];
                self.language = next.to_string();
                PanelAction::SetLanguage(self.language.clone())
            }
            1 => PanelAction::Rescan,
            _ => PanelAction::Quit,
        }
    }

    pub fn render(&self, area: Rect, buf: &mut Buffer, locale: &Locale) {
        if let Some(editor) = &self.editor {
            self.render_editor(editor, area, buf, locale);
            return;
        }

        let height = (self.item_count() as u16 + 5).min(area.height);
        let width = 48.min(area.width);
        let popup = Rect::new(
            area.x + (area.width - width) / 2,
            area.y + (area.height - height) / 2,
            width,
            height,
        );

        let highlight = |i: usize| {
            if i == self.cursor {
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            }
        };

        let mut lines = vec![Line::from(Span::styled(
            locale.tr("settings.widgets"),
            Style::default().fg(Color::Cyan),
        ))];

        for (i, entry) in self.widgets.iter().enumerate() {
            let mark = if entry.enabled { "[x]" } else { "[ ]" };
            lines.push(Line::from(Span::styled(
                format!(" {} {}", mark, entry.title),
                highlight(i),
            )));
        }

        let mut base = self.widgets.len();
        if let Some(focused) = &self.focused {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                format!(" {}: {}", locale.tr("settings.widget_settings"), focused.title),
                highlight(base),
            )));
            base += 1;
        }

        let language = SUPPORTED_LANGUAGES
            .iter()
            .find(|(code, _)| *code == self.language)
            .map(|(_, label)| *label)
            .unwrap_or(self.language.as_str());

        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!(" {}: {}", locale.tr("settings.language"), language),
            highlight(base),
        )));
        lines.push(Line::from(Span::styled(
            format!(" {}", locale.tr("settings.rescan")),
            highlight(base + 1),
        )));
        lines.push(Line::from(Span::styled(
            format!(" {}", locale.tr("settings.quit")),
            highlight(base + 2),
        )));
        lines.push(Line::from(Span::styled(
            locale.tr("settings.hint"),
            Style::default().fg(Color::DarkGray),
        )));

        render_popup(popup, buf, locale.tr("settings.title"), lines);
    }

    fn render_editor(&self, editor: &SettingsEditor, area: Rect, buf: &mut Buffer, locale: &Locale) {
        let rows = editor.entries.len().max(1) as u16;
        let height = (rows + 4).min(area.height);
        let width = 48.min(area.width);
        let popup = Rect::new(
            area.x + (area.width - width) / 2,
            area.y + (area.height - height) / 2,
            width,
            height,
        );

        let mut lines = Vec::new();
        if editor.entries.is_empty() {
            lines.push(Line::from(Span::styled(
                locale.tr("settings.no_options"),
                Style::default().fg(Color::DarkGray),
            )));
        }

        for (i, (key, value)) in editor.entries.iter().enumerate() {
            let selected = i == editor.cursor;
            let shown = match &editor.input {
                Some(text) if selected => format!("{text}_"),
                _ => display_value(value),
            };
            let style = if selected {
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            lines.push(Line::from(Span::styled(format!(" {key}: {shown}"), style)));
        }

        lines.push(Line::from(""));
        let (hint, color) = if editor.invalid {
            (locale.tr("settings.invalid"), Color::Red)
        } else {
            (locale.tr("settings.edit_hint"), Color::DarkGray)
        };
        lines.push(Line::from(Span::styled(hint, Style::default().fg(color))));

        let title = format!("{}: {}", locale.tr("settings.widget_settings"), editor.title);
        render_popup(popup, buf, &title, lines);
    }
}

fn render_popup(popup: Rect, buf: &mut Buffer, title: &str, lines: Vec<Line>) {
    let block = Block::default()
        .title(format!(" {title} "))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));

    Clear.render(popup, buf);
    Paragraph::new(lines).block(block).render(popup, buf);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn panel() -> SettingsPanel {
        let mut panel = SettingsPanel::new();
        panel.open(
            vec![
                ("clock".to_string(), "Clock".to_string(), true),
                ("todo".to_string(), "To-do".to_string(), false),
            ],
            "en",
        );
        panel
    }

    #[test]
    fn test_toggle_widget() {
        let mut panel = panel();
        panel.handle_key(key(KeyCode::Down));

        assert_eq!(
            panel.handle_key(key(KeyCode::Enter)),
            PanelAction::ToggleWidget {
                name: "todo".to_string(),
                enabled: true
            }
        );
        assert_eq!(
            panel.handle_key(key(KeyCode::Char(' '))),
            PanelAction::ToggleWidget {
                name: "todo".to_string(),
                enabled: false
            }
        );
    }

    #[test]
    fn test_language_rescan_quit() {
        let mut panel = panel();
        panel.handle_key(key(KeyCode::Down));
        panel.handle_key(key(KeyCode::Down));

        assert_eq!(
            panel.handle_key(key(KeyCode::Enter)),
            PanelAction::SetLanguage("nl".to_string())
        );
        assert_eq!(
            panel.handle_key(key(KeyCode::Enter)),
            PanelAction::SetLanguage("en".to_string())
        );

        panel.handle_key(key(KeyCode::Down));
        assert_eq!(panel.handle_key(key(KeyCode::Enter)), PanelAction::Rescan);
        panel.handle_key(key(KeyCode::Down));
        assert_eq!(panel.handle_key(key(KeyCode::Enter)), PanelAction::Quit);
    }

    #[test]
    fn test_cursor_wraps_and_escape_closes() {
        let mut panel = panel();
        panel.handle_key(key(KeyCode::Up));
        assert_eq!(panel.handle_key(key(KeyCode::Enter)), PanelAction::Quit);

        assert_eq!(panel.handle_key(key(KeyCode::Esc)), PanelAction::Close);
        assert!(!panel.is_open());
    }

    #[test]
    fn test_refresh_clamps_cursor() {
        let mut panel = panel();
        for _ in 0..4 {
            panel.handle_key(key(KeyCode::Down));
        }
        panel.refresh(Vec::new(), "en");
        assert_eq!(panel.handle_key(key(KeyCode::Enter)), PanelAction::Quit);
    }

    fn with_focused_clock(mut panel: SettingsPanel) -> SettingsPanel {
        let mut settings = Map::new();
        settings.insert("time_format".to_string(), Value::from("%H:%M"));
        settings.insert("show_date".to_string(), Value::from(false));
        settings.insert("update_interval".to_string(), Value::from(2u64));
        settings.insert("history".to_string(), serde_json::json!(["1"]));
        panel.set_focused_widget(Some(FocusedWidget {
            name: "clock".to_string(),
            title: "Clock".to_string(),
            settings,
        }));
        panel
    }

    fn open_editor(panel: &mut SettingsPanel) {
        // clock, todo, then the widget settings row
        panel.handle_key(key(KeyCode::Down));
        panel.handle_key(key(KeyCode::Down));
        assert_eq!(panel.handle_key(key(KeyCode::Enter)), PanelAction::None);
        assert_eq!(panel.editing(), Some("clock"));
    }

    fn type_text(panel: &mut SettingsPanel, text: &str) {
        for c in text.chars() {
            panel.handle_key(key(KeyCode::Char(c)));
        }
    }

    #[test]
    fn test_edit_numeric_setting() {
        let mut panel = with_focused_clock(panel());
        open_editor(&mut panel);

        // show_date, time_format, update_interval; arrays are not editable
        panel.handle_key(key(KeyCode::Up));
        panel.handle_key(key(KeyCode::Enter));
        panel.handle_key(key(KeyCode::Backspace));
        type_text(&mut panel, "10");

        assert_eq!(
            panel.handle_key(key(KeyCode::Enter)),
            PanelAction::UpdateSetting {
                widget: "clock".to_string(),
                key: "update_interval".to_string(),
                value: Value::from(10u64),
            }
        );
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let mut panel = with_focused_clock(panel());
        open_editor(&mut panel);

        panel.handle_key(key(KeyCode::Up));
        panel.handle_key(key(KeyCode::Enter));
        type_text(&mut panel, "x");
        assert_eq!(panel.handle_key(key(KeyCode::Enter)), PanelAction::None);

        // Esc drops the input, a second Esc returns to the menu
        panel.handle_key(key(KeyCode::Esc));
        assert_eq!(panel.editing(), Some("clock"));
        panel.handle_key(key(KeyCode::Esc));
        assert_eq!(panel.editing(), None);
        assert!(panel.is_open());
    }

    #[test]
    fn test_toggle_bool_and_edit_string() {
        let mut panel = with_focused_clock(panel());
        open_editor(&mut panel);

        assert_eq!(
            panel.handle_key(key(KeyCode::Enter)),
            PanelAction::UpdateSetting {
                widget: "clock".to_string(),
                key: "show_date".to_string(),
                value: Value::from(true),
            }
        );

        panel.handle_key(key(KeyCode::Down));
        panel.handle_key(key(KeyCode::Enter));
        type_text(&mut panel, ":%S");
        assert_eq!(
            panel.handle_key(key(KeyCode::Enter)),
            PanelAction::UpdateSetting {
                widget: "clock".to_string(),
                key: "time_format".to_string(),
                value: Value::from("%H:%M:%S"),
            }
        );
    }

    #[test]
    fn test_focus_change_closes_editor() {
        let mut panel = with_focused_clock(panel());
        open_editor(&mut panel);

        panel.set_focused_widget(None);
        assert_eq!(panel.editing(), None);
        // language row directly follows the widgets again
        assert_eq!(
            panel.handle_key(key(KeyCode::Enter)),
            PanelAction::SetLanguage("nl".to_string())
        );
    }

    #[test]
    fn test_render_lists_widgets() {
        let panel = panel();
        let area = Rect::new(0, 0, 60, 20);
        let mut buf = Buffer::empty(area);
        panel.render(area, &mut buf, &Locale::new("nl"));

        let text: String = buf.content().iter().map(|c| c.symbol()).collect();
        assert!(text.contains("[x] Clock"));
        assert!(text.contains("Instellingen"));
    }
}
