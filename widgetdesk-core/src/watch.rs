use crate::plugin::is_library;
use crate::registry::is_manifest;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("File watcher error: {0}")]
    Watcher(#[from] notify::Error),
}

/// Watches the widget directory so the host can rescan on change
pub struct WidgetDirWatcher {
    dir: PathBuf,
    watcher: RecommendedWatcher,
    rx: mpsc::Receiver<notify::Result<notify::Event>>,
}

impl WidgetDirWatcher {
    pub fn new(dir: &Path) -> Result<Self, WatchError> {
        let (tx, rx) = mpsc::channel();
        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            notify::Config::default(),
        )?;
        watcher.watch(dir, RecursiveMode::NonRecursive)?;

        Ok(Self {
            dir: dir.to_path_buf(),
            watcher,
            rx,
        })
    }

    /// Drain pending events; true if a manifest or widget library changed.
    /// Several events between two polls count as one change.
    pub fn poll_changes(&self) -> bool {
        let mut changed = false;

        while let Ok(event) = self.rx.try_recv() {
            let Ok(event) = event else { continue };
            if !(event.kind.is_create() || event.kind.is_modify() || event.kind.is_remove()) {
                continue;
            }

            if event.paths.iter().any(|p| is_widget_file(p)) {
                debug!(paths = ?event.paths, "widget directory changed");
                changed = true;
            }
        }

        changed
    }
}

impl Drop for WidgetDirWatcher {
    fn drop(&mut self) {
        let _ = self.watcher.unwatch(&self.dir);
    }
}

fn is_widget_file(path: &Path) -> bool {
    is_manifest(path) || is_library(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widget_file_filter() {
        assert!(is_widget_file(Path::new("/w/clock.toml")));
        assert!(!is_widget_file(Path::new("/w/clock_config.json")));
        assert!(!is_widget_file(Path::new("/w/_init.toml")));
    }
}
