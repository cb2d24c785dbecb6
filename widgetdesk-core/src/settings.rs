// widgetdesk-core/src/settings.rs
use serde_json::{Map, Value, json};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const KEY_ACTIVE_WIDGETS: &str = "active_widgets";
pub const KEY_LANGUAGE: &str = "language";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid settings document {path:?}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Settings document {0:?} is not a JSON object")]
    NotAnObject(PathBuf),
}

/// Flat persisted key-value store; every `set` rewrites the whole document
#[derive(Debug)]
pub struct Settings {
    path: PathBuf,
    values: Map<String, Value>,
}

impl Settings {
    /// Load the document, writing the defaults first when it does not exist
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();

        if !path.exists() {
            let settings = Self {
                values: default_document(),
                path,
            };
            settings.save()?;
            return Ok(settings);
        }

        let content = std::fs::read_to_string(&path).map_err(|source| SettingsError::Io {
            path: path.clone(),
            source,
        })?;
        let document: Value =
            serde_json::from_str(&content).map_err(|source| SettingsError::Json {
                path: path.clone(),
                source,
            })?;

        match document {
            Value::Object(values) => Ok(Self { path, values }),
            _ => Err(SettingsError::NotAnObject(path)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str, default: Value) -> Value {
        self.values.get(key).cloned().unwrap_or(default)
    }

    pub fn set(&mut self, key: &str, value: Value) -> Result<(), SettingsError> {
        self.values.insert(key.to_string(), value);
        self.save()
    }

    pub fn save(&self) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| SettingsError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let content = serde_json::to_string_pretty(&self.values).map_err(|source| {
            SettingsError::Json {
                path: self.path.clone(),
                source,
            }
        })?;
        std::fs::write(&self.path, content).map_err(|source| SettingsError::Io {
            path: self.path.clone(),
            source,
        })?;

        debug!(path = %self.path.display(), "settings saved");
        Ok(())
    }

    /// Widgets the user has enabled, in the order they were enabled
    pub fn active_widgets(&self) -> Vec<String> {
        match self.values.get(KEY_ACTIVE_WIDGETS) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn set_active_widgets(&mut self, names: &[String]) -> Result<(), SettingsError> {
        self.set(KEY_ACTIVE_WIDGETS, json!(names))
    }

    /// Enable or disable one widget; returns whether the list changed
    pub fn set_widget_enabled(&mut self, name: &str, enabled: bool) -> Result<bool, SettingsError> {
        let mut names = self.active_widgets();
        let present = names.iter().any(|n| n == name);

        match (enabled, present) {
            (true, false) => names.push(name.to_string()),
            (false, true) => names.retain(|n| n != name),
            _ => return Ok(false),
        }

        self.set_active_widgets(&names)?;
        Ok(true)
    }

    pub fn language(&self) -> String {
        self.values
            .get(KEY_LANGUAGE)
            .and_then(Value::as_str)
            .unwrap_or("en")
            .to_string()
    }

    pub fn set_language(&mut self, language: &str) -> Result<(), SettingsError> {
        self.set(KEY_LANGUAGE, json!(language))
    }
}

fn default_document() -> Map<String, Value> {
    let mut values = Map::new();
    values.insert(KEY_ACTIVE_WIDGETS.to_string(), json!([]));
    values.insert(KEY_LANGUAGE.to_string(), json!("en"));
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let settings = Settings::load(&path).unwrap();

        assert!(path.exists());
        assert!(settings.active_widgets().is_empty());
        assert_eq!(settings.language(), "en");
    }

    #[test]
    fn test_set_rewrites_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut settings = Settings::load(&path).unwrap();
        settings.set("theme", json!("dark")).unwrap();
        settings.set_language("nl").unwrap();

        let reloaded = Settings::load(&path).unwrap();
        assert_eq!(reloaded.get("theme", Value::Null), json!("dark"));
        assert_eq!(reloaded.language(), "nl");
        assert_eq!(reloaded.get("missing", json!(3)), json!(3));
    }

    #[test]
    fn test_widget_enabled_toggles() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::load(dir.path().join("settings.json")).unwrap();

        assert!(settings.set_widget_enabled("clock", true).unwrap());
        assert!(settings.set_widget_enabled("todo", true).unwrap());
        assert!(!settings.set_widget_enabled("clock", true).unwrap());
        assert_eq!(settings.active_widgets(), vec!["clock", "todo"]);

        assert!(settings.set_widget_enabled("clock", false).unwrap());
        assert_eq!(settings.active_widgets(), vec!["todo"]);
    }

    #[test]
    fn test_non_object_document_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "[1, 2, 3]").unwrap();

        assert!(matches!(
            Settings::load(&path),
            Err(SettingsError::NotAnObject(_))
        ));
    }
}
