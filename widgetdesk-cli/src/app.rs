// widgetdesk-cli/src/app.rs
use anyhow::Context;
use crossbeam::channel::Receiver;
use crossterm::event::{
    self, Event as CEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEvent,
};
use ratatui::{
    Frame, Terminal,
    backend::Backend,
    buffer::Buffer,
    layout::{Alignment, Rect},
    prelude::Widget as RatatuiWidget,
    style::{Color, Style},
    widgets::Paragraph,
};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use widgetdesk_core::{
    BusEvent, ConfigFile, EnvironmentProvisioner, EventBus, FocusedWidget, LocaleChanged,
    LocaleContext, Overlay, PanelAction, Settings, SettingsPanel, Size, Widget, WidgetDirWatcher,
    WidgetManager, WidgetRegistry,
    event::{Subscription, TOPIC_LOCALE_CHANGED},
    geometry::DEFAULT_WIDTH,
};
use widgetdesk_widgets::{ErrorWidget, builtin_catalog};

/// Lifecycle manager over the built-in catalog, scanning the configured
/// widget directory
pub fn build_manager(config: &ConfigFile, bus: EventBus) -> anyhow::Result<WidgetManager> {
    let provisioner =
        EnvironmentProvisioner::from_config(&config.environments_dir, &config.installer);
    let manager = WidgetManager::new(
        &config.widget_dir,
        WidgetRegistry::new(builtin_catalog()),
        provisioner,
        bus,
    )
    .with_context(|| format!("cannot open widget directory {:?}", config.widget_dir))?;
    Ok(manager)
}

/// Interactive overlay session
pub struct App {
    tick_rate: Duration,
    settings: Settings,
    manager: WidgetManager,
    overlay: Overlay,
    panel: SettingsPanel,
    locale: LocaleContext,
    watcher: Option<WidgetDirWatcher>,
    locale_rx: Receiver<BusEvent>,
    _locale_sub: Subscription,
    should_quit: bool,
}

impl App {
    pub fn new(config: &ConfigFile, settings: Settings, area: Rect) -> anyhow::Result<Self> {
        let bus = EventBus::new();
        let (locale_sub, locale_rx) = bus.subscribe(TOPIC_LOCALE_CHANGED);
        let locale = LocaleContext::new(&settings.language(), bus.clone());

        let mut manager = build_manager(config, bus)?;
        manager.set_locale(locale.current());

        let watcher = match WidgetDirWatcher::new(manager.widget_dir()) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                warn!(error = %e, "widget directory watcher unavailable, hot reload disabled");
                None
            }
        };

        let mut app = Self {
            tick_rate: Duration::from_millis(config.tick_rate_ms.max(10)),
            settings,
            manager,
            overlay: Overlay::new(overlay_area(area)),
            panel: SettingsPanel::new(),
            locale,
            watcher,
            locale_rx,
            _locale_sub: locale_sub,
            should_quit: false,
        };
        app.reconcile();
        Ok(app)
    }

    pub fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> anyhow::Result<()> {
        let mut last_tick = Instant::now();

        while !self.should_quit {
            terminal.draw(|f| self.draw(f))?;

            let timeout = self
                .tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or(Duration::ZERO);

            if event::poll(timeout)? {
                match event::read()? {
                    CEvent::Key(key) if key.kind == KeyEventKind::Press => self.on_key(key),
                    CEvent::Mouse(mouse) => self.on_mouse(mouse),
                    _ => {}
                }
            }

            self.drain_bus();

            if self.watcher.as_ref().is_some_and(|w| w.poll_changes()) {
                info!("widget directory changed, rescanning");
                self.rescan();
            }

            if last_tick.elapsed() >= self.tick_rate {
                self.manager.update_all();
                last_tick = Instant::now();
            }
        }

        self.overlay.close(&mut self.manager);
        Ok(())
    }

    fn draw(&mut self, frame: &mut Frame) {
        let full = frame.area();
        let area = overlay_area(full);
        self.overlay.set_area(area);

        let locale = self.locale.current();
        let buf = frame.buffer_mut();
        self.overlay.render(&mut self.manager, buf);

        self.draw_failures(area, buf);

        if self.overlay.stacking_order().is_empty() && self.overlay.failures().is_empty() {
            Paragraph::new(locale.tr("overlay.empty"))
                .alignment(Alignment::Center)
                .style(Style::default().fg(Color::DarkGray))
                .render(Rect::new(area.x, area.y + area.height / 2, area.width, 1), buf);
        }

        let hint_row = Rect::new(full.x, full.y + full.height.saturating_sub(1), full.width, 1);
        Paragraph::new(locale.tr("overlay.hint"))
            .style(Style::default().fg(Color::DarkGray))
            .render(hint_row, buf);

        if self.panel.is_open() {
            self.panel.render(full, buf, &locale);
        }
    }

    /// Activation failures stacked in the bottom-right corner
    fn draw_failures(&self, area: Rect, buf: &mut Buffer) {
        let locale = self.locale.current();
        let mut bottom = area.y + area.height;

        for (name, reason) in self.overlay.failures() {
            let mut notice = ErrorWidget::activation_failed(name, reason, &locale);
            let size = notice.preferred_size().unwrap_or(Size {
                width: DEFAULT_WIDTH,
                height: 4,
            });
            let width = size.width.min(area.width);
            let height = size.height.min(bottom.saturating_sub(area.y));
            if height < 3 {
                break;
            }
            bottom -= height;
            let rect = Rect::new(area.x + area.width - width, bottom, width, height);
            notice.render(rect, buf);
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        if ctrl && matches!(key.code, KeyCode::Char('q') | KeyCode::Char('c')) {
            self.should_quit = true;
            return;
        }

        if self.panel.is_open() {
            let action = self.panel.handle_key(key);
            self.on_panel_action(action);
            return;
        }

        match key.code {
            KeyCode::F(2) => self.open_panel(),
            KeyCode::Tab => self.overlay.focus_next(),
            _ => {
                self.overlay.handle_key(&mut self.manager, key);
            }
        }
    }

    fn on_mouse(&mut self, mouse: MouseEvent) {
        if self.panel.is_open() {
            return;
        }
        self.overlay.handle_mouse(&mut self.manager, mouse);
    }

    fn panel_entries(&self) -> Vec<(String, String, bool)> {
        let enabled = self.settings.active_widgets();
        self.manager
            .descriptors()
            .map(|d| (d.name.clone(), d.title.clone(), enabled.contains(&d.name)))
            .collect()
    }

    fn focused_widget(&mut self) -> Option<FocusedWidget> {
        let name = self.overlay.focused()?.to_string();
        let instance = self.manager.active_mut(&name)?;
        Some(FocusedWidget {
            title: instance.title().to_string(),
            settings: instance.current_settings(),
            name,
        })
    }

    fn open_panel(&mut self) {
        let entries = self.panel_entries();
        self.panel.open(entries, &self.settings.language());
        let focused = self.focused_widget();
        self.panel.set_focused_widget(focused);
    }

    fn refresh_panel(&mut self) {
        let entries = self.panel_entries();
        self.panel.refresh(entries, &self.settings.language());
        let focused = self.focused_widget();
        self.panel.set_focused_widget(focused);
    }

    fn on_panel_action(&mut self, action: PanelAction) {
        match action {
            PanelAction::None | PanelAction::Close => {}
            PanelAction::ToggleWidget { name, enabled } => {
                if let Err(e) = self.settings.set_widget_enabled(&name, enabled) {
                    warn!(widget = %name, error = %e, "could not update active widgets");
                }
                self.reconcile();
                self.refresh_panel();
            }
            PanelAction::SetLanguage(language) => {
                if let Err(e) = self.settings.set_language(&language) {
                    warn!(language = %language, error = %e, "could not save language");
                }
                self.locale.set_language(&language);
                self.drain_bus();
                self.refresh_panel();
            }
            PanelAction::UpdateSetting { widget, key, value } => {
                if let Err(e) = self.manager.update_setting(&widget, &key, value) {
                    warn!(widget = %widget, key = %key, error = %e, "could not apply widget setting");
                }
                self.reconcile();
                self.refresh_panel();
            }
            PanelAction::Rescan => {
                self.rescan();
                self.refresh_panel();
            }
            PanelAction::Quit => self.should_quit = true,
        }
    }

    fn reconcile(&mut self) {
        let report = self
            .overlay
            .load_active_widgets(&mut self.manager, &self.settings);
        debug!(?report, "active widgets reconciled");
    }

    fn rescan(&mut self) {
        match self.manager.rescan() {
            Ok(report) => {
                for (name, reason) in &report.skipped {
                    warn!(widget = %name, reason = %reason, "widget skipped during rescan");
                }
                self.reconcile();
            }
            Err(e) => warn!(error = %e, "rescan failed"),
        }
    }

    /// Forward bus events the host reacts to
    fn drain_bus(&mut self) {
        while let Ok(event) = self.locale_rx.try_recv() {
            if let Some(changed) = event.payload.downcast::<LocaleChanged>() {
                debug!(language = %changed.language, "applying locale");
                self.manager
                    .set_locale(widgetdesk_core::Locale::new(&changed.language));
            }
        }
    }
}

/// Everything but the bottom hint row
fn overlay_area(full: Rect) -> Rect {
    Rect::new(full.x, full.y, full.width, full.height.saturating_sub(1))
}
