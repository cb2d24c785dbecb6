// widgetdesk-core/src/overlay.rs
//! Host surface that places active widgets on screen.
//!
//! The overlay never owns widget instances; it keeps their placement and
//! stacking order and borrows them from the [`WidgetManager`] to draw and
//! route input.

use crate::geometry::{DEFAULT_HEIGHT, DEFAULT_WIDTH, DragMode, Geometry};
use crate::manager::WidgetManager;
use crate::settings::Settings;
use crate::widget::{Event, EventResult};
use crossterm::event::{KeyEvent, MouseButton, MouseEvent, MouseEventKind};
use ratatui::{buffer::Buffer, layout::Rect, widgets::Clear};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// What `load_active_widgets` changed
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub activated: Vec<String>,
    pub deactivated: Vec<String>,
    /// Enabled widgets that could not be activated, with the reason
    pub failed: Vec<(String, String)>,
}

pub struct Overlay {
    area: Rect,
    placements: BTreeMap<String, Geometry>,
    /// Stacking order, last is drawn on top
    order: Vec<String>,
    focused: Option<String>,
    drag: Option<(String, DragMode)>,
    failures: BTreeMap<String, String>,
}

impl Overlay {
    pub fn new(area: Rect) -> Self {
        Self {
            area,
            placements: BTreeMap::new(),
            order: Vec::new(),
            focused: None,
            drag: None,
            failures: BTreeMap::new(),
        }
    }

    pub fn area(&self) -> Rect {
        self.area
    }

    pub fn set_area(&mut self, area: Rect) {
        self.area = area;
    }

    pub fn placement(&self, name: &str) -> Option<Geometry> {
        self.placements.get(name).copied()
    }

    pub fn focused(&self) -> Option<&str> {
        self.focused.as_deref()
    }

    /// Widgets in stacking order, bottom first
    pub fn stacking_order(&self) -> &[String] {
        &self.order
    }

    /// Activation failures from the last reconcile, by widget name
    pub fn failures(&self) -> &BTreeMap<String, String> {
        &self.failures
    }

    /// Bring the manager's active set in line with the enabled widgets in
    /// `settings`, then place every active widget.
    pub fn load_active_widgets(
        &mut self,
        manager: &mut WidgetManager,
        settings: &Settings,
    ) -> ReconcileReport {
        let enabled = settings.active_widgets();
        let mut report = ReconcileReport::default();
        self.failures.clear();

        for name in manager.active_names() {
            if !enabled.contains(&name) {
                manager.deactivate(&name);
                report.deactivated.push(name);
            }
        }

        for name in &enabled {
            if manager.is_active(name) {
                continue;
            }
            match manager.activate(name) {
                Ok(_) => report.activated.push(name.clone()),
                Err(e) => {
                    self.failures.insert(name.clone(), e.to_string());
                    report.failed.push((name.clone(), e.to_string()));
                }
            }
        }

        self.placements.retain(|name, _| manager.is_active(name));
        self.order.retain(|name| manager.is_active(name));

        for name in &enabled {
            if self.placements.contains_key(name) {
                continue;
            }
            let Some(instance) = manager.active_mut(name) else {
                continue;
            };

            let slot = self.placements.len() + 1;
            let geometry = initial_geometry(instance, slot).clamp_to(self.area);
            debug!(widget = %name, ?geometry, "widget placed");
            self.placements.insert(name.clone(), geometry);
            self.order.push(name.clone());
        }

        if self
            .focused
            .as_ref()
            .is_none_or(|f| !self.placements.contains_key(f))
        {
            self.focused = self.order.last().cloned();
        }

        report
    }

    /// Topmost widget under the cell
    pub fn widget_at(&self, col: u16, row: u16) -> Option<&str> {
        self.order
            .iter()
            .rev()
            .find(|name| {
                self.placements
                    .get(*name)
                    .is_some_and(|g| g.contains(col, row))
            })
            .map(String::as_str)
    }

    pub fn focus_next(&mut self) {
        if self.order.is_empty() {
            self.focused = None;
            return;
        }

        let next = match &self.focused {
            Some(current) => self
                .order
                .iter()
                .position(|n| n == current)
                .map(|i| (i + 1) % self.order.len())
                .unwrap_or(0),
            None => 0,
        };
        self.focused = Some(self.order[next].clone());
    }

    fn raise(&mut self, name: &str) {
        if let Some(i) = self.order.iter().position(|n| n == name) {
            let entry = self.order.remove(i);
            self.order.push(entry);
        }
    }

    /// Route a key press to the focused widget
    pub fn handle_key(&mut self, manager: &mut WidgetManager, key: KeyEvent) -> EventResult {
        let Some(name) = self.focused.clone() else {
            return EventResult::Ignored;
        };
        let Some(instance) = manager.active_mut(&name) else {
            return EventResult::Ignored;
        };

        let result = instance.handle_event(Event::Key(key));
        if result == EventResult::Consumed
            && let Err(e) = instance.save_config()
        {
            warn!(widget = %name, error = %e, "could not save widget config");
        }
        result
    }

    /// Drag on the top row moves, drag on the corner resizes, other clicks
    /// go to the widget in widget-relative coordinates.
    pub fn handle_mouse(&mut self, manager: &mut WidgetManager, mouse: MouseEvent) -> EventResult {
        let (col, row) = (mouse.column, mouse.row);

        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                let Some(name) = self.widget_at(col, row).map(str::to_string) else {
                    return EventResult::Ignored;
                };
                self.focused = Some(name.clone());
                self.raise(&name);

                let Some(geometry) = self.placements.get(&name).copied() else {
                    return EventResult::Ignored;
                };
                let mode = DragMode::begin(&geometry, col, row);
                let on_title = i32::from(row) == geometry.y;
                if matches!(mode, DragMode::Resize) || on_title {
                    self.drag = Some((name, mode));
                    return EventResult::Consumed;
                }

                self.forward_mouse(manager, &name, geometry, mouse)
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                let Some((name, mode)) = self.drag.clone() else {
                    return EventResult::Ignored;
                };
                if let Some(geometry) = self.placements.get_mut(&name) {
                    *geometry = mode.apply(*geometry, col, row, self.area);
                }
                EventResult::Consumed
            }
            MouseEventKind::Up(MouseButton::Left) => {
                let Some((name, mode)) = self.drag.take() else {
                    return EventResult::Ignored;
                };
                let (Some(geometry), Some(instance)) =
                    (self.placements.get(&name).copied(), manager.active_mut(&name))
                else {
                    return EventResult::Consumed;
                };
                if matches!(mode, DragMode::Resize) {
                    instance.handle_event(Event::Resize(geometry.width, geometry.height));
                }
                if let Err(e) = instance.set_geometry(geometry) {
                    warn!(widget = %name, error = %e, "could not save widget geometry");
                }
                EventResult::Consumed
            }
            _ => match self.widget_at(col, row).map(str::to_string) {
                Some(name) => match self.placements.get(&name).copied() {
                    Some(geometry) => self.forward_mouse(manager, &name, geometry, mouse),
                    None => EventResult::Ignored,
                },
                None => EventResult::Ignored,
            },
        }
    }

    fn forward_mouse(
        &self,
        manager: &mut WidgetManager,
        name: &str,
        geometry: Geometry,
        mouse: MouseEvent,
    ) -> EventResult {
        let Some(instance) = manager.active_mut(name) else {
            return EventResult::Ignored;
        };
        let relative = MouseEvent {
            column: (i32::from(mouse.column) - geometry.x).max(0) as u16,
            row: (i32::from(mouse.row) - geometry.y).max(0) as u16,
            ..mouse
        };
        instance.handle_event(Event::Mouse(relative))
    }

    /// Draw every placed widget; cells outside widgets are left untouched
    pub fn render(&self, manager: &mut WidgetManager, buf: &mut Buffer) {
        for name in &self.order {
            let Some(rect) = self
                .placements
                .get(name)
                .and_then(|g| g.to_rect(self.area))
            else {
                continue;
            };
            let Some(instance) = manager.active_mut(name) else {
                continue;
            };

            ratatui::widgets::Widget::render(Clear, rect, buf);
            let focused = self.focused.as_deref() == Some(name.as_str());
            instance.render_focused(rect, buf, focused);
        }
    }

    /// Overlay shutdown: close every widget
    pub fn close(&mut self, manager: &mut WidgetManager) {
        manager.deactivate_all();
        self.placements.clear();
        self.order.clear();
        self.focused = None;
        self.drag = None;
    }
}

fn initial_geometry(instance: &crate::ActiveWidget, slot: usize) -> Geometry {
    let config = instance.config();
    let (width, height) = match (config.size, instance.preferred_size()) {
        (Some([w, h]), _) => (w, h),
        (None, Some(size)) => (size.width, size.height),
        (None, None) => (DEFAULT_WIDTH, DEFAULT_HEIGHT),
    };

    match config.position {
        Some([x, y]) => Geometry::new(x, y, width, height),
        None => Geometry::cascade(slot, width, height),
    }
}
