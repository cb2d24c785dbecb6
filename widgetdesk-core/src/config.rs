use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Config directory not found")]
    NoConfigDir,
}

const CONFIG_FILE: &str = "widgetdesk.toml";

/// Application configuration (`widgetdesk.toml`)
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConfigFile {
    /// Directory holding widget manifests and their config files
    pub widget_dir: PathBuf,
    /// Root of the per-widget dependency environments
    pub environments_dir: PathBuf,
    /// Flat JSON settings document
    pub settings_path: PathBuf,
    /// Overlay tick rate in milliseconds
    pub tick_rate_ms: u64,
    pub installer: InstallerConfig,
}

/// How dependency specifiers are installed into an environment
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InstallerConfig {
    /// Package manager executable; `<env>/bin/<program>` wins over `PATH`
    pub program: String,
    /// Argument template, `{spec}` and `{env}` are substituted
    pub args: Vec<String>,
    /// Runtime executable name inside `<env>/bin`
    pub runtime: String,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            program: "pip".to_string(),
            args: ["install", "--prefix", "{env}", "{spec}"]
                .map(String::from)
                .to_vec(),
            runtime: "python".to_string(),
        }
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        let widget_dir = dirs::document_dir()
            .or_else(dirs::home_dir)
            .map(|d| d.join("Widgets"))
            .unwrap_or_else(|| PathBuf::from("./widgets"));

        let data_dir = dirs::data_dir()
            .map(|d| d.join("widgetdesk"))
            .unwrap_or_else(|| PathBuf::from("./.widgetdesk"));

        let settings_path = dirs::config_dir()
            .map(|d| d.join("widgetdesk"))
            .unwrap_or_else(|| PathBuf::from("./.widgetdesk"))
            .join("settings.json");

        Self {
            widget_dir,
            environments_dir: data_dir.join("environments"),
            settings_path,
            tick_rate_ms: 100,
            installer: InstallerConfig::default(),
        }
    }
}

impl ConfigFile {
    pub fn load() -> Result<Self, ConfigError> {
        // Priority: ./widgetdesk.toml -> ~/.config/widgetdesk/widgetdesk.toml -> default
        let paths = [
            std::env::current_dir()?.join(CONFIG_FILE),
            dirs::config_dir()
                .ok_or(ConfigError::NoConfigDir)?
                .join("widgetdesk")
                .join(CONFIG_FILE),
        ];

        for path in paths {
            if path.exists() {
                return Self::load_from(&path);
            }
        }

        Ok(Self::default())
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(ConfigError::Parse)
    }

    /// Directory for the application log file
    pub fn log_dir(&self) -> PathBuf {
        dirs::data_dir()
            .map(|d| d.join("widgetdesk"))
            .unwrap_or_else(|| PathBuf::from("./.widgetdesk"))
            .join("logs")
    }
}
