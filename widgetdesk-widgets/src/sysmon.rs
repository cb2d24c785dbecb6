// widgetdesk-widgets/src/sysmon.rs
use crossterm::event::KeyCode;
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    prelude::Widget as RatatuiWidget,
    style::Style,
    widgets::{Block, Gauge},
};
use std::time::Duration;
use sysinfo::System;
use widgetdesk_core::{
    BusEvent, Event, EventBus, EventResult, Locale, Size, SystemMetrics, Widget, WidgetConfig,
    WidgetContext, event::TOPIC_SYSTEM_METRICS,
};

use crate::common::{Unit, format_bytes_unit, format_percentage, usage_color, widget_block};

pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(2);

/// CPU and memory monitor
///
/// Polls `sysinfo` every `update_interval` seconds (config, default 2) and
/// publishes a [`SystemMetrics`] event on `system.metrics` after each poll.
///
/// # Keyboard Shortcuts
/// - `u` - Cycle the memory display unit (Auto → MB → GB)
/// - `r` - Force an immediate refresh
pub struct SysmonWidget {
    system: System,

    cpu_usage: f32,
    used_memory: u64,
    total_memory: u64,

    display_unit: Unit,
    title: String,

    poll_interval: Duration,
    time_since_poll: Duration,

    event_bus: EventBus,
}

impl SysmonWidget {
    pub fn new(ctx: &WidgetContext) -> Self {
        Self {
            system: System::new(),
            cpu_usage: 0.0,
            used_memory: 0,
            total_memory: 0,
            display_unit: Unit::Auto,
            title: ctx.locale.tr("sysmon.title").to_string(),
            poll_interval: DEFAULT_UPDATE_INTERVAL,
            time_since_poll: Duration::ZERO,
            event_bus: ctx.bus.clone(),
        }
    }

    fn poll(&mut self) {
        self.system.refresh_cpu_usage();
        self.system.refresh_memory();

        self.cpu_usage = self.system.global_cpu_usage();
        self.used_memory = self.system.used_memory();
        self.total_memory = self.system.total_memory();

        self.event_bus.publish(BusEvent::new(
            TOPIC_SYSTEM_METRICS,
            SystemMetrics {
                cpu_usage: self.cpu_usage,
                memory_used: self.used_memory,
                memory_total: self.total_memory,
            },
        ));
    }

    fn memory_percent(&self) -> f64 {
        if self.total_memory > 0 {
            (self.used_memory as f64 / self.total_memory as f64) * 100.0
        } else {
            0.0
        }
    }
}

impl Widget for SysmonWidget {
    fn on_activate(&mut self, config: &WidgetConfig) {
        if let Some(secs) = config.get_u64("update_interval")
            && secs > 0
        {
            self.poll_interval = Duration::from_secs(secs);
        }
        self.poll();
    }

    fn on_update(&mut self, delta: Duration) {
        self.time_since_poll += delta;

        if self.time_since_poll >= self.poll_interval {
            self.poll();
            self.time_since_poll = Duration::ZERO;
        }
    }

    fn on_event(&mut self, event: Event) -> EventResult {
        if let Event::Key(key) = event {
            match key.code {
                KeyCode::Char('u') => {
                    self.display_unit = self.display_unit.next();
                    return EventResult::Consumed;
                }
                KeyCode::Char('r') => {
                    self.time_since_poll = self.poll_interval;
                    return EventResult::Consumed;
                }
                _ => {}
            }
        }

        EventResult::Ignored
    }

    fn render(&mut self, area: Rect, buf: &mut Buffer) {
        self.render_focused(area, buf, false);
    }

    fn render_focused(&mut self, area: Rect, buf: &mut Buffer, focused: bool) {
        let block = widget_block(&self.title, focused);
        let inner = block.inner(area);
        block.render(area, buf);

        if inner.height < 2 {
            return;
        }

        let [cpu_area, memory_area] =
            Layout::vertical([Constraint::Length(2), Constraint::Length(2)]).areas(inner);

        let cpu = f64::from(self.cpu_usage).clamp(0.0, 100.0);
        Gauge::default()
            .block(Block::default().title("CPU"))
            .gauge_style(Style::default().fg(usage_color(cpu)))
            .label(format_percentage(cpu))
            .ratio(cpu / 100.0)
            .render(cpu_area, buf);

        let memory = self.memory_percent().clamp(0.0, 100.0);
        Gauge::default()
            .block(Block::default().title("RAM"))
            .gauge_style(Style::default().fg(usage_color(memory)))
            .label(format!(
                "{}/{}",
                format_bytes_unit(self.used_memory, self.display_unit),
                format_bytes_unit(self.total_memory, self.display_unit)
            ))
            .ratio(memory / 100.0)
            .render(memory_area, buf);
    }

    fn preferred_size(&self) -> Option<Size> {
        Some(Size {
            width: 34,
            height: 6,
        })
    }

    fn needs_update(&self) -> bool {
        true
    }

    fn on_locale_changed(&mut self, locale: &Locale) {
        self.title = locale.tr("sysmon.title").to_string();
    }

    fn store_settings(&self, config: &mut WidgetConfig) {
        config.set("update_interval", self.poll_interval.as_secs());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_poll_publishes_metrics() {
        let bus = EventBus::new();
        let (_sub, rx) = bus.subscribe(TOPIC_SYSTEM_METRICS);
        let mut widget = SysmonWidget::new(&WidgetContext {
            name: "sysmon".to_string(),
            environment: PathBuf::new(),
            bus: bus.clone(),
            locale: Locale::default(),
        });

        let mut config = WidgetConfig::default();
        config.set("update_interval", 5);
        widget.on_activate(&config);
        assert_eq!(widget.poll_interval, Duration::from_secs(5));

        let event = rx.try_recv().unwrap();
        let metrics = event.payload.downcast::<SystemMetrics>().unwrap();
        assert_eq!(metrics.memory_total, widget.total_memory);

        widget.on_update(Duration::from_secs(1));
        assert!(rx.try_recv().is_err());
        widget.on_update(Duration::from_secs(4));
        assert!(rx.try_recv().is_ok());
    }
}
