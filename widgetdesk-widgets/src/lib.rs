pub mod calculator;
pub mod calendar;
pub mod clock;
pub mod common;
pub mod error;
pub mod notes;
pub mod pomodoro;
pub mod sysmon;
pub mod todo;

pub use calculator::{CalcError, CalculatorWidget, evaluate};
pub use calendar::CalendarWidget;
pub use clock::ClockWidget;
pub use common::*;
pub use error::ErrorWidget;
pub use notes::NotesWidget;
pub use pomodoro::{Phase, PomodoroWidget};
pub use sysmon::SysmonWidget;
pub use todo::{TodoItem, TodoWidget};

use widgetdesk_core::{WidgetCatalog, register_widget};

/// Catalog with every built-in widget, keyed by the `entry` name used in
/// manifests.
pub fn builtin_catalog() -> WidgetCatalog {
    let mut catalog = WidgetCatalog::new();
    register_widget!(catalog, "clock", ClockWidget);
    register_widget!(catalog, "todo", TodoWidget);
    register_widget!(catalog, "notes", NotesWidget);
    register_widget!(catalog, "calculator", CalculatorWidget);
    register_widget!(catalog, "sysmon", SysmonWidget);
    register_widget!(catalog, "pomodoro", PomodoroWidget);
    register_widget!(catalog, "calendar", CalendarWidget);
    catalog
}
