// widgetdesk-widgets/src/calendar.rs
use chrono::{Datelike, Local, NaiveDate};
use crossterm::event::KeyCode;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Rect},
    prelude::Widget as RatatuiWidget,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
};
use widgetdesk_core::{Event, EventResult, Locale, Size, Widget, WidgetContext};

use crate::common::widget_block;

/// Weeks of a month, Monday first; `None` pads days outside the month
pub type Week = [Option<u32>; 7];

/// Month grid with today highlighted
///
/// # Keyboard Shortcuts
/// - `<` / `Left` - Previous month
/// - `>` / `Right` - Next month
/// - `t` - Back to the current month
pub struct CalendarWidget {
    year: i32,
    month: u32,
    today: NaiveDate,
    locale: Locale,
}

impl CalendarWidget {
    pub fn new(ctx: &WidgetContext) -> Self {
        let today = Local::now().date_naive();
        Self {
            year: today.year(),
            month: today.month(),
            today,
            locale: ctx.locale,
        }
    }

    pub fn shown_month(&self) -> (i32, u32) {
        (self.year, self.month)
    }

    fn shift(&mut self, delta: i32) {
        (self.year, self.month) = shift_month(self.year, self.month, delta);
    }

    fn month_name(&self) -> String {
        self.locale
            .tr("calendar.months")
            .split(',')
            .nth(self.month as usize - 1)
            .unwrap_or_default()
            .to_string()
    }
}

/// Move `delta` months from (year, month), wrapping years
pub fn shift_month(year: i32, month: u32, delta: i32) -> (i32, u32) {
    let index = year * 12 + month as i32 - 1 + delta;
    (index.div_euclid(12), index.rem_euclid(12) as u32 + 1)
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = shift_month(year, month, 1);
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(28)
}

pub fn month_grid(year: i32, month: u32) -> Vec<Week> {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return Vec::new();
    };
    let offset = first.weekday().num_days_from_monday() as usize;
    let days = days_in_month(year, month);

    let mut weeks = Vec::new();
    let mut week: Week = [None; 7];
    let mut column = offset;

    for day in 1..=days {
        week[column] = Some(day);
        column += 1;
        if column == 7 {
            weeks.push(week);
            week = [None; 7];
            column = 0;
        }
    }
    if column > 0 {
        weeks.push(week);
    }
    weeks
}

impl Widget for CalendarWidget {
    fn on_event(&mut self, event: Event) -> EventResult {
        let Event::Key(key) = event else {
            return EventResult::Ignored;
        };

        match key.code {
            KeyCode::Char('<') | KeyCode::Left => self.shift(-1),
            KeyCode::Char('>') | KeyCode::Right => self.shift(1),
            KeyCode::Char('t') => {
                self.today = Local::now().date_naive();
                self.year = self.today.year();
                self.month = self.today.month();
            }
            _ => return EventResult::Ignored,
        }
        EventResult::Consumed
    }

    fn render(&mut self, area: Rect, buf: &mut Buffer) {
        self.render_focused(area, buf, false);
    }

    fn render_focused(&mut self, area: Rect, buf: &mut Buffer, focused: bool) {
        let mut lines = vec![
            Line::styled(
                format!("{} {}", self.month_name(), self.year),
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Line::styled(
                self.locale.tr("calendar.weekdays"),
                Style::default().fg(Color::Gray),
            ),
        ];

        let showing_today = (self.year, self.month) == (self.today.year(), self.today.month());
        for week in month_grid(self.year, self.month) {
            let mut spans = Vec::with_capacity(14);
            for (i, day) in week.iter().enumerate() {
                if i > 0 {
                    spans.push(Span::raw(" "));
                }
                let span = match day {
                    Some(d) if showing_today && *d == self.today.day() => Span::styled(
                        format!("{:>2}", d),
                        Style::default()
                            .fg(Color::Black)
                            .bg(Color::Yellow)
                            .add_modifier(Modifier::BOLD),
                    ),
                    Some(d) => Span::raw(format!("{:>2}", d)),
                    None => Span::raw("  "),
                };
                spans.push(span);
            }
            lines.push(Line::from(spans));
        }

        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(widget_block(self.locale.tr("calendar.title"), focused))
            .render(area, buf);
    }

    fn preferred_size(&self) -> Option<Size> {
        Some(Size {
            width: 26,
            height: 10,
        })
    }

    fn on_locale_changed(&mut self, locale: &Locale) {
        self.locale = *locale;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shift_month_wraps_years() {
        assert_eq!(shift_month(2024, 1, -1), (2023, 12));
        assert_eq!(shift_month(2024, 12, 1), (2025, 1));
        assert_eq!(shift_month(2024, 5, 0), (2024, 5));
        assert_eq!(shift_month(2024, 3, -15), (2022, 12));
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2023, 2), 28);
        assert_eq!(days_in_month(2024, 12), 31);
        assert_eq!(days_in_month(2024, 4), 30);
    }

    #[test]
    fn test_month_grid_starts_on_monday() {
        // 1 September 2024 is a Sunday
        let grid = month_grid(2024, 9);
        assert_eq!(grid[0], [None, None, None, None, None, None, Some(1)]);
        assert_eq!(grid[1][0], Some(2));
        assert_eq!(grid.len(), 6);
        assert_eq!(grid[5][0], Some(30));
    }

    #[test]
    fn test_localized_month_names() {
        let mut calendar = CalendarWidget::new(&WidgetContext {
            name: "calendar".to_string(),
            environment: Default::default(),
            bus: widgetdesk_core::EventBus::new(),
            locale: Locale::new("nl"),
        });
        calendar.month = 3;
        assert_eq!(calendar.month_name(), "maart");
    }
}
