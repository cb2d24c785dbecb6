use crate::deps::parse_dependencies;
use crate::plugin::{PluginError, PluginLoader};
use crate::widget::{Widget, WidgetContext};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Manifests with this name initialize the directory and are never widgets
pub const RESERVED_MANIFEST: &str = "_init.toml";
pub const MANIFEST_EXTENSION: &str = "toml";

/// Builds a fresh widget instance
pub type WidgetFactory =
    Arc<dyn Fn(&WidgetContext) -> Result<Box<dyn Widget>, WidgetError> + Send + Sync>;

/// A factory refused to build an instance
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct WidgetError(pub String);

impl WidgetError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Cannot read widget directory {path:?}: {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Why a single manifest was skipped during a scan
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Cannot read {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid manifest {path:?}: {source}")]
    Manifest {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Cannot load widget library {path:?}: {source}")]
    Library {
        path: PathBuf,
        source: PluginError,
    },
    #[error("No widget entry point '{entry}' for {path:?}")]
    MissingEntryPoint { path: PathBuf, entry: String },
    #[error("Widget file name {path:?} is not valid UTF-8")]
    InvalidName { path: PathBuf },
}

impl LoadError {
    pub fn is_missing_entry_point(&self) -> bool {
        matches!(self, LoadError::MissingEntryPoint { .. })
    }
}

/// Body of a widget manifest
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WidgetManifest {
    /// Catalog factory name, defaults to the file stem
    pub entry: Option<String>,
    /// Dynamic library exporting the widget ABI; wins over `entry`
    pub library: Option<PathBuf>,
    pub title: Option<String>,
    pub description: Option<String>,
}

/// Discovered widget: name, entry point and declared dependencies
#[derive(Clone)]
pub struct WidgetDescriptor {
    pub name: String,
    pub title: String,
    pub description: Option<String>,
    pub source: PathBuf,
    pub dependencies: Vec<String>,
    pub entry: WidgetFactory,
}

impl fmt::Debug for WidgetDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WidgetDescriptor")
            .field("name", &self.name)
            .field("title", &self.title)
            .field("source", &self.source)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

/// Built-in widget factories addressable from manifests by name
#[derive(Clone, Default)]
pub struct WidgetCatalog {
    factories: HashMap<String, WidgetFactory>,
}

impl WidgetCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, factory: WidgetFactory) {
        self.factories.insert(name.to_string(), factory);
    }

    pub fn get(&self, name: &str) -> Option<WidgetFactory> {
        self.factories.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Result of scanning a widget directory
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub widgets: BTreeMap<String, WidgetDescriptor>,
    pub skipped: Vec<(String, LoadError)>,
}

/// Scans widget directories into descriptors
pub struct WidgetRegistry {
    catalog: WidgetCatalog,
    loader: PluginLoader,
}

impl WidgetRegistry {
    pub fn new(catalog: WidgetCatalog) -> Self {
        Self {
            catalog,
            loader: PluginLoader::new(),
        }
    }

    pub fn catalog(&self) -> &WidgetCatalog {
        &self.catalog
    }

    /// Load every manifest directly inside `dir`.
    ///
    /// A manifest that fails to load is logged and skipped; only an
    /// unreadable directory fails the scan.
    pub fn scan(&self, dir: &Path) -> Result<ScanOutcome, RegistryError> {
        let mut outcome = ScanOutcome::default();

        let entries = std::fs::read_dir(dir).map_err(|source| RegistryError::ReadDir {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut candidates: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|entry| entry.path())
            .filter(|path| is_manifest(path))
            .collect();
        candidates.sort();

        for path in candidates {
            let name = match widget_name(&path) {
                Ok(name) => name,
                Err(e) => {
                    error!(error = %e, "failed to load widget");
                    let lossy = path.file_stem().unwrap_or_default().to_string_lossy();
                    outcome.skipped.push((lossy.into_owned(), e));
                    continue;
                }
            };
            match self.load_manifest(&name, &path, dir) {
                Ok(descriptor) => {
                    debug!(widget = %name, deps = ?descriptor.dependencies, "widget registered");
                    outcome.widgets.insert(name, descriptor);
                }
                Err(e) if e.is_missing_entry_point() => {
                    warn!(widget = %name, error = %e, "skipping widget without entry point");
                    outcome.skipped.push((name, e));
                }
                Err(e) => {
                    error!(widget = %name, error = %e, "failed to load widget");
                    outcome.skipped.push((name, e));
                }
            }
        }

        Ok(outcome)
    }

    fn load_manifest(
        &self,
        name: &str,
        path: &Path,
        dir: &Path,
    ) -> Result<WidgetDescriptor, LoadError> {
        let source = std::fs::read_to_string(path).map_err(|source| LoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let dependencies = parse_dependencies(&source);
        let manifest: WidgetManifest =
            toml::from_str(&source).map_err(|source| LoadError::Manifest {
                path: path.to_path_buf(),
                source,
            })?;

        let entry = match &manifest.library {
            Some(library) => self.load_library(path, &dir.join(library))?,
            None => {
                let entry = manifest.entry.clone().unwrap_or_else(|| name.to_string());
                self.catalog
                    .get(&entry)
                    .ok_or_else(|| LoadError::MissingEntryPoint {
                        path: path.to_path_buf(),
                        entry,
                    })?
            }
        };

        Ok(WidgetDescriptor {
            name: name.to_string(),
            title: manifest.title.unwrap_or_else(|| name.to_string()),
            description: manifest.description,
            source: path.to_path_buf(),
            dependencies,
            entry,
        })
    }

    fn load_library(&self, manifest: &Path, library: &Path) -> Result<WidgetFactory, LoadError> {
        // Safety: widgets in the user's widget directory are trusted code
        let lib = unsafe { self.loader.load(library) }.map_err(|source| {
            if source.is_missing_entry_point() {
                LoadError::MissingEntryPoint {
                    path: manifest.to_path_buf(),
                    entry: format!("{} ({source})", library.display()),
                }
            } else {
                LoadError::Library {
                    path: library.to_path_buf(),
                    source,
                }
            }
        })?;

        Ok(Arc::new(
            move |_ctx: &WidgetContext| -> Result<Box<dyn Widget>, WidgetError> {
                Ok(Box::new(lib.instantiate()))
            },
        ))
    }
}

pub fn is_manifest(path: &Path) -> bool {
    path.extension().and_then(|s| s.to_str()) == Some(MANIFEST_EXTENSION)
        && path.file_name().and_then(|s| s.to_str()) != Some(RESERVED_MANIFEST)
}

fn widget_name(path: &Path) -> Result<String, LoadError> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .ok_or_else(|| LoadError::InvalidName {
            path: path.to_path_buf(),
        })
}

/// Register a widget type whose `new` takes the factory context
#[macro_export]
macro_rules! register_widget {
    ($catalog:expr, $name:expr, $widget_type:ty) => {
        $catalog.register(
            $name,
            ::std::sync::Arc::new(
                |ctx: &$crate::WidgetContext| -> ::std::result::Result<
                    Box<dyn $crate::Widget>,
                    $crate::WidgetError,
                > { Ok(Box::new(<$widget_type>::new(ctx))) },
            ),
        );
    };
}

/// Register a widget type built with `Default`
#[macro_export]
macro_rules! register_widget_default {
    ($catalog:expr, $name:expr, $widget_type:ty) => {
        $catalog.register(
            $name,
            ::std::sync::Arc::new(
                |_ctx: &$crate::WidgetContext| -> ::std::result::Result<
                    Box<dyn $crate::Widget>,
                    $crate::WidgetError,
                > { Ok(Box::new(<$widget_type>::default())) },
            ),
        );
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_filter() {
        assert!(is_manifest(Path::new("/w/clock.toml")));
        assert!(!is_manifest(Path::new("/w/_init.toml")));
        assert!(!is_manifest(Path::new("/w/clock_config.json")));
        assert!(!is_manifest(Path::new("/w/README")));
    }

    #[test]
    fn test_manifest_rejects_unknown_keys() {
        assert!(toml::from_str::<WidgetManifest>("entry = \"clock\"\ncolour = 1").is_err());
        let manifest: WidgetManifest = toml::from_str("# only comments\n").unwrap();
        assert!(manifest.entry.is_none());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_non_utf8_names_are_skipped() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("clock.toml"), "").unwrap();
        std::fs::write(dir.path().join(OsStr::from_bytes(b"bad\xff.toml")), "").unwrap();
        std::fs::write(dir.path().join(OsStr::from_bytes(b"odd\xfe.toml")), "").unwrap();

        let mut catalog = WidgetCatalog::new();
        crate::register_widget_default!(catalog, "clock", Blank);
        let outcome = WidgetRegistry::new(catalog).scan(dir.path()).unwrap();

        assert_eq!(outcome.widgets.keys().collect::<Vec<_>>(), vec!["clock"]);
        assert_eq!(outcome.skipped.len(), 2);
        assert!(
            outcome
                .skipped
                .iter()
                .all(|(_, e)| matches!(e, LoadError::InvalidName { .. }))
        );
    }

    #[derive(Default)]
    struct Blank;

    impl Widget for Blank {
        fn render(&mut self, _area: ratatui::layout::Rect, _buf: &mut ratatui::buffer::Buffer) {}
    }
}
