// widgetdesk-widgets/src/common/formatting.rs
use std::time::Duration;

/// Unit options for byte formatting
///
/// Auto selects the most appropriate unit based on the value size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Auto,
    MB,
    GB,
}

impl Unit {
    /// Cycle to the next display unit
    pub fn next(self) -> Self {
        match self {
            Self::Auto => Self::MB,
            Self::MB => Self::GB,
            Self::GB => Self::Auto,
        }
    }
}

/// Format bytes to human-readable string with automatic unit selection
///
/// # Example
/// ```rust
/// use widgetdesk_widgets::format_bytes;
/// assert_eq!(format_bytes(1024), "1.0 KB");
/// assert_eq!(format_bytes(1536 * 1024 * 1024), "1.5 GB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    format_bytes_unit(bytes, Unit::Auto)
}

/// Format bytes with specific unit
pub fn format_bytes_unit(bytes: u64, unit: Unit) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    const TB: u64 = GB * 1024;

    match unit {
        Unit::Auto => {
            if bytes >= TB {
                format!("{:.1} TB", bytes as f64 / TB as f64)
            } else if bytes >= GB {
                format!("{:.1} GB", bytes as f64 / GB as f64)
            } else if bytes >= MB {
                format!("{:.1} MB", bytes as f64 / MB as f64)
            } else if bytes >= KB {
                format!("{:.1} KB", bytes as f64 / KB as f64)
            } else {
                format!("{} B", bytes)
            }
        }
        Unit::MB => format!("{:.1} MB", bytes as f64 / MB as f64),
        Unit::GB => format!("{:.1} GB", bytes as f64 / GB as f64),
    }
}

/// Format percentage with 1 decimal place
pub fn format_percentage(value: f64) -> String {
    format!("{:.1}%", value)
}

/// `mm:ss`, minutes not capped at 59
pub fn format_countdown(remaining: Duration) -> String {
    let secs = remaining.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
