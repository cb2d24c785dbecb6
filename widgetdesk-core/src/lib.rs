pub mod config;
pub mod deps;
pub mod environment;
pub mod event;
pub mod geometry;
pub mod locale;
pub mod manager;
pub mod overlay;
pub mod panel;
pub mod plugin;
pub mod registry;
pub mod settings;
pub mod watch;
pub mod widget;
pub mod widget_config;

pub use config::{ConfigError, ConfigFile, InstallerConfig};
pub use deps::parse_dependencies;
pub use environment::{
    CommandInstaller, Environment, EnvironmentError, EnvironmentProvisioner, InstallReport,
    PackageInstaller,
};
pub use event::{Event as BusEvent, EventBus, EventPayload, LocaleChanged, SystemMetrics};
pub use geometry::{DragMode, Geometry};
pub use locale::{Locale, LocaleContext, SUPPORTED_LANGUAGES};
pub use manager::{ActivationError, ActiveWidget, RescanReport, WidgetManager};
pub use overlay::{Overlay, ReconcileReport};
pub use panel::{FocusedWidget, PanelAction, SettingsPanel};
pub use plugin::{PluginError, PluginLoader, PluginWidget, WIDGET_ABI_VERSION};
pub use registry::{
    LoadError, RegistryError, ScanOutcome, WidgetCatalog, WidgetDescriptor, WidgetError,
    WidgetFactory, WidgetManifest, WidgetRegistry,
};
pub use settings::{Settings, SettingsError};
pub use watch::{WatchError, WidgetDirWatcher};
pub use widget::{Event, EventResult, Size, Widget, WidgetContext};
pub use widget_config::{WidgetConfig, WidgetConfigError};
