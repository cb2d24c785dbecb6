// widgetdesk-core/src/widget_config.rs
use crate::geometry::Geometry;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum WidgetConfigError {
    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid widget config {path:?}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Per-widget JSON document stored next to the widget manifest
/// (`<widget_dir>/<name>_config.json`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WidgetConfig {
    #[serde(skip)]
    path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<[i32; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<[u16; 2]>,
    /// Widget-specific settings
    #[serde(flatten)]
    pub settings: Map<String, Value>,
}

impl WidgetConfig {
    pub fn path_for(widget_dir: &Path, name: &str) -> PathBuf {
        widget_dir.join(format!("{name}_config.json"))
    }

    /// Load the config, or an empty one bound to `path` if the file is absent
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, WidgetConfigError> {
        let path = path.into();
        if !path.exists() {
            return Ok(Self {
                path,
                ..Self::default()
            });
        }

        let content = std::fs::read_to_string(&path).map_err(|source| WidgetConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let mut config: WidgetConfig =
            serde_json::from_str(&content).map_err(|source| WidgetConfigError::Json {
                path: path.clone(),
                source,
            })?;
        config.path = path;
        Ok(config)
    }

    pub fn save(&self) -> Result<(), WidgetConfigError> {
        let content =
            serde_json::to_string_pretty(self).map_err(|source| WidgetConfigError::Json {
                path: self.path.clone(),
                source,
            })?;
        std::fs::write(&self.path, content).map_err(|source| WidgetConfigError::Io {
            path: self.path.clone(),
            source,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn set_geometry(&mut self, geometry: Geometry) {
        self.position = Some([geometry.x, geometry.y]);
        self.size = Some([geometry.width, geometry.height]);
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.settings.get(key).and_then(Value::as_str)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.settings.get(key).and_then(Value::as_u64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.settings.get(key).and_then(Value::as_bool)
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.settings.insert(key.to_string(), value.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_empty_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = WidgetConfig::load(WidgetConfig::path_for(dir.path(), "clock")).unwrap();

        assert_eq!(config.position, None);
        assert!(config.settings.is_empty());
        assert!(config.path().ends_with("clock_config.json"));
    }

    #[test]
    fn test_geometry_and_settings_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = WidgetConfig::path_for(dir.path(), "clock");

        let mut config = WidgetConfig::load(&path).unwrap();
        config.set_geometry(Geometry::new(7, 3, 24, 5));
        config.set("time_format", "%H:%M");
        config.save().unwrap();

        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["position"], serde_json::json!([7, 3]));
        assert_eq!(raw["size"], serde_json::json!([24, 5]));
        assert_eq!(raw["time_format"], "%H:%M");

        let reloaded = WidgetConfig::load(&path).unwrap();
        assert_eq!(reloaded.position, Some([7, 3]));
        assert_eq!(reloaded.get_str("time_format"), Some("%H:%M"));
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad_config.json");
        std::fs::write(&path, "{ position: ").unwrap();

        assert!(matches!(
            WidgetConfig::load(&path),
            Err(WidgetConfigError::Json { .. })
        ));
    }
}
