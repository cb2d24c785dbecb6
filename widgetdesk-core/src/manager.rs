// widgetdesk-core/src/manager.rs
//! Widget lifecycle: activation, deactivation, refresh and rescans.
//!
//! Per widget name the manager moves between *unregistered*, *registered*
//! and *active*. A name maps to at most one live instance. Failures are
//! isolated per widget: they are logged, returned to the caller, and never
//! affect other widgets.

use crate::environment::{EnvironmentError, EnvironmentProvisioner, InstallReport};
use crate::event::{
    Event, EventBus, TOPIC_WIDGET_ACTIVATED, TOPIC_WIDGET_DEACTIVATED, TOPIC_WIDGET_RESCANNED,
    WidgetLifecycle, WidgetsRescanned,
};
use crate::locale::Locale;
use crate::registry::{RegistryError, WidgetDescriptor, WidgetError, WidgetRegistry};
use crate::widget::{Event as InputEvent, EventResult, Size, Widget, WidgetContext};
use crate::widget_config::{WidgetConfig, WidgetConfigError};
use ratatui::{buffer::Buffer, layout::Rect};
use serde_json::{Map, Value};
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, error, info, warn};

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, thiserror::Error)]
pub enum ActivationError {
    #[error("Widget '{0}' is not registered")]
    NotRegistered(String),
    #[error("Dependencies of '{widget}' could not be installed: {source}")]
    Install {
        widget: String,
        #[source]
        source: EnvironmentError,
    },
    #[error("Config of '{widget}' could not be loaded: {source}")]
    Config {
        widget: String,
        #[source]
        source: WidgetConfigError,
    },
    #[error("Widget '{widget}' failed to start: {reason}")]
    Instantiate { widget: String, reason: String },
    #[error("Widget '{0}' is not active")]
    NotActive(String),
}

/// A live widget instance owned by the manager
pub struct ActiveWidget {
    name: String,
    title: String,
    instance_id: u64,
    widget: Box<dyn Widget>,
    config: WidgetConfig,
    last_update: Instant,
}

impl ActiveWidget {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Unique per instantiation, never reused within a process
    pub fn instance_id(&self) -> u64 {
        self.instance_id
    }

    pub fn config(&self) -> &WidgetConfig {
        &self.config
    }

    /// Widget settings as they would be saved right now
    pub fn current_settings(&self) -> Map<String, Value> {
        let mut config = self.config.clone();
        self.widget.store_settings(&mut config);
        config.settings
    }

    pub fn preferred_size(&self) -> Option<Size> {
        self.widget.preferred_size()
    }

    pub fn update(&mut self) {
        let now = Instant::now();
        let delta = now.duration_since(self.last_update);

        if self.widget.needs_update() {
            self.widget.on_update(delta);
        }

        self.last_update = now;
    }

    pub fn handle_event(&mut self, event: InputEvent) -> EventResult {
        self.widget.on_event(event)
    }

    pub fn render_focused(&mut self, area: Rect, buf: &mut Buffer, focused: bool) {
        self.widget.render_focused(area, buf, focused);
    }

    pub fn locale_changed(&mut self, locale: &Locale) {
        self.widget.on_locale_changed(locale);
    }

    /// Record a new screen position/size and persist it
    pub fn set_geometry(&mut self, geometry: crate::Geometry) -> Result<(), WidgetConfigError> {
        self.config.set_geometry(geometry);
        self.save_config()
    }

    /// Pull widget state into the config and write it to disk
    pub fn save_config(&mut self) -> Result<(), WidgetConfigError> {
        self.widget.store_settings(&mut self.config);
        self.config.save()
    }

    fn close(mut self) {
        if let Err(e) = self.save_config() {
            warn!(widget = %self.name, error = %e, "could not save widget config");
        }
        self.shutdown();
    }

    /// Run the close hook without touching the config
    fn shutdown(mut self) {
        let name = self.name.clone();
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| self.widget.on_close())) {
            error!(widget = %name, reason = %panic_message(&*panic), "widget panicked while closing");
        }
    }
}

/// What a rescan changed
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RescanReport {
    pub available: Vec<String>,
    /// Active widgets whose manifest disappeared, now deactivated
    pub removed: Vec<String>,
    /// Active widgets re-created from the new descriptors
    pub refreshed: Vec<String>,
    /// Active widgets that could not be re-created, with the reason
    pub failed: Vec<(String, String)>,
    /// Manifests that failed to load, with the reason
    pub skipped: Vec<(String, String)>,
}

pub struct WidgetManager {
    widget_dir: PathBuf,
    registry: WidgetRegistry,
    provisioner: EnvironmentProvisioner,
    widgets: BTreeMap<String, WidgetDescriptor>,
    active: BTreeMap<String, ActiveWidget>,
    bus: EventBus,
    locale: Locale,
}

impl WidgetManager {
    /// Create the widget directory if needed and run the first scan
    pub fn new(
        widget_dir: impl Into<PathBuf>,
        registry: WidgetRegistry,
        provisioner: EnvironmentProvisioner,
        bus: EventBus,
    ) -> Result<Self, RegistryError> {
        let widget_dir = widget_dir.into();
        std::fs::create_dir_all(&widget_dir).map_err(|source| RegistryError::ReadDir {
            path: widget_dir.clone(),
            source,
        })?;

        let widgets = registry.scan(&widget_dir)?.widgets;
        info!(dir = %widget_dir.display(), count = widgets.len(), "widgets discovered");

        Ok(Self {
            widget_dir,
            registry,
            provisioner,
            widgets,
            active: BTreeMap::new(),
            bus,
            locale: Locale::default(),
        })
    }

    pub fn widget_dir(&self) -> &Path {
        &self.widget_dir
    }

    pub fn provisioner(&self) -> &EnvironmentProvisioner {
        &self.provisioner
    }

    pub fn available_widgets(&self) -> Vec<String> {
        self.widgets.keys().cloned().collect()
    }

    pub fn descriptor(&self, name: &str) -> Option<&WidgetDescriptor> {
        self.widgets.get(name)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &WidgetDescriptor> {
        self.widgets.values()
    }

    pub fn active_names(&self) -> Vec<String> {
        self.active.keys().cloned().collect()
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.active.contains_key(name)
    }

    pub fn active_mut(&mut self, name: &str) -> Option<&mut ActiveWidget> {
        self.active.get_mut(name)
    }

    pub fn iter_active_mut(&mut self) -> impl Iterator<Item = &mut ActiveWidget> {
        self.active.values_mut()
    }

    /// Install a registered widget's dependencies without activating it
    pub fn provision(&self, name: &str) -> Result<InstallReport, ActivationError> {
        let descriptor = self
            .widgets
            .get(name)
            .ok_or_else(|| ActivationError::NotRegistered(name.to_string()))?;

        self.provisioner
            .install_dependencies(name, &descriptor.dependencies)
            .map_err(|source| ActivationError::Install {
                widget: name.to_string(),
                source,
            })
    }

    /// Provision, instantiate and track `name`.
    ///
    /// An already active widget is returned as is.
    pub fn activate(&mut self, name: &str) -> Result<&mut ActiveWidget, ActivationError> {
        if !self.active.contains_key(name) {
            let instance = self.instantiate(name).inspect_err(|e| {
                error!(widget = name, error = %e, "activation failed");
            })?;

            info!(widget = name, instance = instance.instance_id, "widget activated");
            self.bus.publish(Event::new(
                TOPIC_WIDGET_ACTIVATED,
                WidgetLifecycle {
                    name: name.to_string(),
                    instance_id: instance.instance_id,
                },
            ));
            self.active.insert(name.to_string(), instance);
        } else {
            debug!(widget = name, "already active");
        }

        self.active
            .get_mut(name)
            .ok_or_else(|| ActivationError::NotRegistered(name.to_string()))
    }

    fn instantiate(&self, name: &str) -> Result<ActiveWidget, ActivationError> {
        let descriptor = self
            .widgets
            .get(name)
            .ok_or_else(|| ActivationError::NotRegistered(name.to_string()))?;

        let install_error = |source: EnvironmentError| ActivationError::Install {
            widget: name.to_string(),
            source,
        };
        let report = self
            .provisioner
            .install_dependencies(name, &descriptor.dependencies)
            .map_err(install_error)?;
        if !report.installed.is_empty() {
            info!(widget = name, installed = ?report.installed, "dependencies installed");
        }
        let environment = self
            .provisioner
            .ensure_environment(name)
            .map_err(install_error)?;

        let config = WidgetConfig::load(WidgetConfig::path_for(&self.widget_dir, name)).map_err(
            |source| ActivationError::Config {
                widget: name.to_string(),
                source,
            },
        )?;

        let ctx = WidgetContext {
            name: name.to_string(),
            environment,
            bus: self.bus.clone(),
            locale: self.locale,
        };

        let built = catch_unwind(AssertUnwindSafe(|| -> Result<Box<dyn Widget>, WidgetError> {
            let mut widget = (descriptor.entry)(&ctx)?;
            widget.on_activate(&config);
            Ok(widget)
        }));

        let widget = match built {
            Ok(Ok(widget)) => widget,
            Ok(Err(e)) => {
                return Err(ActivationError::Instantiate {
                    widget: name.to_string(),
                    reason: e.to_string(),
                });
            }
            Err(panic) => {
                return Err(ActivationError::Instantiate {
                    widget: name.to_string(),
                    reason: panic_message(&*panic),
                });
            }
        };

        Ok(ActiveWidget {
            name: name.to_string(),
            title: descriptor.title.clone(),
            instance_id: NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed),
            widget,
            config,
            last_update: Instant::now(),
        })
    }

    /// Close and drop the active instance; false if `name` was not active
    pub fn deactivate(&mut self, name: &str) -> bool {
        let Some(instance) = self.active.remove(name) else {
            warn!(widget = name, "deactivate requested for inactive widget");
            return false;
        };

        let instance_id = instance.instance_id;
        instance.close();
        self.deactivated(name, instance_id);
        true
    }

    fn deactivated(&self, name: &str, instance_id: u64) {
        info!(widget = name, instance = instance_id, "widget deactivated");
        self.bus.publish(Event::new(
            TOPIC_WIDGET_DEACTIVATED,
            WidgetLifecycle {
                name: name.to_string(),
                instance_id,
            },
        ));
    }

    /// Persist one widget setting and re-create the instance so it applies.
    ///
    /// The running instance's state is stored first; `key` then overrides
    /// whatever the widget stored for it. When the config cannot be written
    /// the old instance keeps running.
    pub fn update_setting(
        &mut self,
        name: &str,
        key: &str,
        value: Value,
    ) -> Result<&mut ActiveWidget, ActivationError> {
        let Some(mut instance) = self.active.remove(name) else {
            return Err(ActivationError::NotActive(name.to_string()));
        };

        instance.widget.store_settings(&mut instance.config);
        instance.config.set(key, value);
        if let Err(source) = instance.config.save() {
            self.active.insert(name.to_string(), instance);
            return Err(ActivationError::Config {
                widget: name.to_string(),
                source,
            });
        }

        info!(widget = name, key, "widget setting updated");
        let instance_id = instance.instance_id;
        instance.shutdown();
        self.deactivated(name, instance_id);

        self.activate(name)
    }

    /// Deactivate (if active) and activate again
    pub fn refresh(&mut self, name: &str) -> Result<&mut ActiveWidget, ActivationError> {
        if self.active.contains_key(name) {
            self.deactivate(name);
        }
        self.activate(name)
    }

    /// Re-scan the widget directory, replacing every descriptor.
    ///
    /// Active widgets without a descriptor are deactivated; the others are
    /// refreshed so they pick up new code and dependencies.
    pub fn rescan(&mut self) -> Result<RescanReport, RegistryError> {
        let outcome = self.registry.scan(&self.widget_dir)?;
        self.widgets = outcome.widgets;

        let mut report = RescanReport {
            available: self.available_widgets(),
            skipped: outcome
                .skipped
                .into_iter()
                .map(|(name, e)| (name, e.to_string()))
                .collect(),
            ..RescanReport::default()
        };

        for name in self.active_names() {
            if !self.widgets.contains_key(&name) {
                self.deactivate(&name);
                report.removed.push(name);
                continue;
            }

            match self.refresh(&name) {
                Ok(_) => report.refreshed.push(name),
                Err(e) => report.failed.push((name, e.to_string())),
            }
        }

        info!(
            available = report.available.len(),
            removed = report.removed.len(),
            refreshed = report.refreshed.len(),
            "widgets rescanned"
        );
        self.bus.publish(Event::new(
            TOPIC_WIDGET_RESCANNED,
            WidgetsRescanned {
                available: report.available.clone(),
                removed: report.removed.clone(),
            },
        ));

        Ok(report)
    }

    /// Deactivate everything, e.g. when the overlay shuts down
    pub fn deactivate_all(&mut self) {
        for name in self.active_names() {
            self.deactivate(&name);
        }
    }

    /// Use `locale` for new instances and notify the active ones
    pub fn set_locale(&mut self, locale: Locale) {
        self.locale = locale;
        for instance in self.active.values_mut() {
            instance.locale_changed(&locale);
        }
    }

    pub fn update_all(&mut self) {
        for instance in self.active.values_mut() {
            instance.update();
        }
    }
}

impl Drop for WidgetManager {
    fn drop(&mut self) {
        self.deactivate_all();
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "widget panicked".to_string()
    }
}
