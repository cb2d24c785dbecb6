// widgetdesk-widgets/src/pomodoro.rs
use crossterm::event::KeyCode;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Layout, Rect},
    prelude::Widget as RatatuiWidget,
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Gauge, Paragraph},
};
use std::time::Duration;
use tracing::debug;
use widgetdesk_core::{Event, EventResult, Locale, Size, Widget, WidgetConfig, WidgetContext};

use crate::common::{format_countdown, widget_block};

pub const DEFAULT_WORK_MINUTES: u64 = 25;
pub const DEFAULT_BREAK_MINUTES: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Work,
    Break,
}

/// Work/break countdown
///
/// # Config
/// - `work_minutes` - default 25
/// - `break_minutes` - default 5
///
/// # Keyboard Shortcuts
/// - `Space` - Start or pause
/// - `r` - Reset to a fresh work phase
pub struct PomodoroWidget {
    work: Duration,
    rest: Duration,
    phase: Phase,
    remaining: Duration,
    running: bool,
    sessions: u32,
    locale: Locale,
}

impl PomodoroWidget {
    pub fn new(ctx: &WidgetContext) -> Self {
        let work = Duration::from_secs(DEFAULT_WORK_MINUTES * 60);
        Self {
            work,
            rest: Duration::from_secs(DEFAULT_BREAK_MINUTES * 60),
            phase: Phase::Work,
            remaining: work,
            running: false,
            sessions: 0,
            locale: ctx.locale,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    /// Completed work phases
    pub fn sessions(&self) -> u32 {
        self.sessions
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn reset(&mut self) {
        self.running = false;
        self.phase = Phase::Work;
        self.remaining = self.work;
    }

    /// Advance the countdown, switching phases when it runs out
    pub fn tick(&mut self, delta: Duration) {
        if !self.running {
            return;
        }

        let mut delta = delta;
        while delta >= self.remaining {
            delta -= self.remaining;
            self.switch_phase();
        }
        self.remaining -= delta;
    }

    fn switch_phase(&mut self) {
        match self.phase {
            Phase::Work => {
                self.sessions += 1;
                self.phase = Phase::Break;
                self.remaining = self.rest;
            }
            Phase::Break => {
                self.phase = Phase::Work;
                self.remaining = self.work;
            }
        }
        debug!(phase = ?self.phase, sessions = self.sessions, "pomodoro phase switched");
    }

    fn phase_length(&self) -> Duration {
        match self.phase {
            Phase::Work => self.work,
            Phase::Break => self.rest,
        }
    }
}

fn minutes(config: &WidgetConfig, key: &str, default: u64) -> Duration {
    let minutes = config.get_u64(key).filter(|m| *m > 0).unwrap_or(default);
    Duration::from_secs(minutes * 60)
}

impl Widget for PomodoroWidget {
    fn on_activate(&mut self, config: &WidgetConfig) {
        self.work = minutes(config, "work_minutes", DEFAULT_WORK_MINUTES);
        self.rest = minutes(config, "break_minutes", DEFAULT_BREAK_MINUTES);
        self.reset();
    }

    fn on_update(&mut self, delta: Duration) {
        self.tick(delta);
    }

    fn on_event(&mut self, event: Event) -> EventResult {
        let Event::Key(key) = event else {
            return EventResult::Ignored;
        };

        match key.code {
            KeyCode::Char(' ') => self.running = !self.running,
            KeyCode::Char('r') => self.reset(),
            _ => return EventResult::Ignored,
        }
        EventResult::Consumed
    }

    fn render(&mut self, area: Rect, buf: &mut Buffer) {
        self.render_focused(area, buf, false);
    }

    fn render_focused(&mut self, area: Rect, buf: &mut Buffer, focused: bool) {
        let block = widget_block(self.locale.tr("pomodoro.title"), focused);
        let inner = block.inner(area);
        block.render(area, buf);

        let (label, color) = match (self.running, self.phase) {
            (false, _) => (self.locale.tr("pomodoro.paused"), Color::DarkGray),
            (true, Phase::Work) => (self.locale.tr("pomodoro.work"), Color::Red),
            (true, Phase::Break) => (self.locale.tr("pomodoro.break"), Color::Green),
        };

        let [text_area, gauge_area] =
            Layout::vertical([Constraint::Min(2), Constraint::Length(1)]).areas(inner);

        let lines = vec![
            Line::styled(
                format!("{}  {}", label, format_countdown(self.remaining)),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            ),
            Line::styled(
                format!("{}: {}", self.locale.tr("pomodoro.sessions"), self.sessions),
                Style::default().fg(Color::Gray),
            ),
        ];
        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .render(text_area, buf);

        let total = self.phase_length().as_secs_f64();
        let elapsed = if total > 0.0 {
            1.0 - self.remaining.as_secs_f64() / total
        } else {
            0.0
        };
        Gauge::default()
            .gauge_style(Style::default().fg(color))
            .label("")
            .ratio(elapsed.clamp(0.0, 1.0))
            .render(gauge_area, buf);
    }

    fn preferred_size(&self) -> Option<Size> {
        Some(Size {
            width: 26,
            height: 5,
        })
    }

    fn needs_update(&self) -> bool {
        self.running
    }

    fn on_locale_changed(&mut self, locale: &Locale) {
        self.locale = *locale;
    }

    fn store_settings(&self, config: &mut WidgetConfig) {
        config.set("work_minutes", self.work.as_secs() / 60);
        config.set("break_minutes", self.rest.as_secs() / 60);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEvent, KeyModifiers};
    use std::path::PathBuf;
    use widgetdesk_core::EventBus;

    fn widget(work: u64, rest: u64) -> PomodoroWidget {
        let mut widget = PomodoroWidget::new(&WidgetContext {
            name: "pomodoro".to_string(),
            environment: PathBuf::new(),
            bus: EventBus::new(),
            locale: Locale::default(),
        });
        let mut config = WidgetConfig::default();
        config.set("work_minutes", work);
        config.set("break_minutes", rest);
        widget.on_activate(&config);
        widget
    }

    fn space(widget: &mut PomodoroWidget) {
        widget.on_event(Event::Key(KeyEvent::new(
            KeyCode::Char(' '),
            KeyModifiers::NONE,
        )));
    }

    #[test]
    fn test_paused_timer_does_not_move() {
        let mut pomodoro = widget(1, 1);
        pomodoro.tick(Duration::from_secs(30));
        assert_eq!(pomodoro.remaining(), Duration::from_secs(60));
    }

    #[test]
    fn test_work_phase_completes_into_break() {
        let mut pomodoro = widget(1, 2);
        space(&mut pomodoro);
        assert!(pomodoro.is_running());

        pomodoro.tick(Duration::from_secs(45));
        assert_eq!(pomodoro.phase(), Phase::Work);
        assert_eq!(pomodoro.remaining(), Duration::from_secs(15));

        pomodoro.tick(Duration::from_secs(20));
        assert_eq!(pomodoro.phase(), Phase::Break);
        assert_eq!(pomodoro.sessions(), 1);
        assert_eq!(pomodoro.remaining(), Duration::from_secs(115));

        pomodoro.tick(Duration::from_secs(115));
        assert_eq!(pomodoro.phase(), Phase::Work);
        assert_eq!(pomodoro.remaining(), Duration::from_secs(60));
    }

    #[test]
    fn test_reset_keeps_sessions() {
        let mut pomodoro = widget(1, 1);
        space(&mut pomodoro);
        pomodoro.tick(Duration::from_secs(70));
        assert_eq!(pomodoro.sessions(), 1);

        pomodoro.on_event(Event::Key(KeyEvent::new(
            KeyCode::Char('r'),
            KeyModifiers::NONE,
        )));
        assert!(!pomodoro.is_running());
        assert_eq!(pomodoro.phase(), Phase::Work);
        assert_eq!(pomodoro.remaining(), Duration::from_secs(60));
        assert_eq!(pomodoro.sessions(), 1);
    }

    #[test]
    fn test_zero_minutes_fall_back_to_defaults() {
        let pomodoro = widget(0, 0);
        assert_eq!(
            pomodoro.remaining(),
            Duration::from_secs(DEFAULT_WORK_MINUTES * 60)
        );
    }
}
