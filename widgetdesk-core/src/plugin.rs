use crate::widget::{Event, EventResult, Size, Widget};
use crate::{Locale, WidgetConfig};
use libloading::Library;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// ABI version exported by widgets built with the plugin SDK
pub const WIDGET_ABI_VERSION: u32 = 1;

pub const SYMBOL_METADATA: &[u8] = b"widgetdesk_widget_metadata";
pub const SYMBOL_CREATE: &[u8] = b"widgetdesk_widget_create";
pub const SYMBOL_DESTROY: &[u8] = b"widgetdesk_widget_destroy";

#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Library loading error: {0}")]
    Loading(#[source] libloading::Error),
    #[error("Symbol {symbol} not exported: {source}")]
    MissingSymbol {
        symbol: String,
        #[source]
        source: libloading::Error,
    },
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("Widget ABI version mismatch: expected {}, got {}", expected, got)]
    VersionMismatch { expected: u32, got: u32 },
}

impl PluginError {
    /// The library loaded but does not expose a usable widget entry point
    pub fn is_missing_entry_point(&self) -> bool {
        matches!(
            self,
            PluginError::MissingSymbol { .. } | PluginError::VersionMismatch { .. }
        )
    }
}

#[repr(C)]
pub struct WidgetMetadata {
    pub abi_version: u32,
    pub name: *const u8,
    pub name_len: usize,
}

/// FFI-safe representation of a fat pointer (trait object)
#[repr(C)]
#[derive(Copy, Clone)]
pub struct FatPointer {
    pub data: *mut std::ffi::c_void,
    pub vtable: *mut std::ffi::c_void,
}

type CreateFn = extern "C" fn() -> FatPointer;
type DestroyFn = extern "C" fn(FatPointer);

/// A loaded widget library; shared by every instance created from it
pub struct WidgetLibrary {
    name: String,
    create: CreateFn,
    destroy: DestroyFn,
    // Must outlive the function pointers above
    _lib: Library,
    // Dropped after the library is unloaded
    _copy: TempCopy,
}

/// Private copy of a widget library, deleted on drop
struct TempCopy(PathBuf);

impl Drop for TempCopy {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.0) {
            debug!(path = %self.0.display(), error = %e, "could not remove library copy");
        }
    }
}

// Safety: the exported functions are plain `extern "C"` functions and the
// library handle itself is thread-safe to hold.
unsafe impl Send for WidgetLibrary {}
unsafe impl Sync for WidgetLibrary {}

impl WidgetLibrary {
    /// Name the library declared in its metadata
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instantiate(self: &Arc<Self>) -> PluginWidget {
        let fat_ptr = (self.create)();
        // Safety: `create` returns the halves of a `Box<dyn Widget>` built
        // against the same ABI version.
        unsafe { PluginWidget::new(fat_ptr, Arc::clone(self)) }
    }
}

/// Widget instance living in a dynamic library
pub struct PluginWidget {
    ptr: *mut dyn Widget,
    fat_ptr: FatPointer,
    library: Arc<WidgetLibrary>,
}

// Safety: the pointee is a `Widget`, which is `Send`, and the library stays
// loaded for as long as this value exists.
unsafe impl Send for PluginWidget {}

impl PluginWidget {
    unsafe fn new(fat_ptr: FatPointer, library: Arc<WidgetLibrary>) -> Self {
        let ptr: *mut dyn Widget = unsafe { std::mem::transmute([fat_ptr.data, fat_ptr.vtable]) };

        Self {
            ptr,
            fat_ptr,
            library,
        }
    }

    fn as_widget(&mut self) -> &mut dyn Widget {
        // Safety: the pointer is valid and the library keeps the code alive
        unsafe { &mut *self.ptr }
    }

    fn as_widget_const(&self) -> &dyn Widget {
        unsafe { &*self.ptr }
    }
}

impl Drop for PluginWidget {
    fn drop(&mut self) {
        // Deallocate with the library's allocator
        (self.library.destroy)(self.fat_ptr);
    }
}

impl Widget for PluginWidget {
    fn on_activate(&mut self, config: &WidgetConfig) {
        self.as_widget().on_activate(config)
    }

    fn on_update(&mut self, delta: Duration) {
        self.as_widget().on_update(delta)
    }

    fn on_event(&mut self, event: Event) -> EventResult {
        self.as_widget().on_event(event)
    }

    fn render(&mut self, area: ratatui::layout::Rect, buf: &mut ratatui::buffer::Buffer) {
        self.as_widget().render(area, buf)
    }

    fn render_focused(
        &mut self,
        area: ratatui::layout::Rect,
        buf: &mut ratatui::buffer::Buffer,
        focused: bool,
    ) {
        self.as_widget().render_focused(area, buf, focused)
    }

    fn preferred_size(&self) -> Option<Size> {
        self.as_widget_const().preferred_size()
    }

    fn needs_update(&self) -> bool {
        self.as_widget_const().needs_update()
    }

    fn on_locale_changed(&mut self, locale: &Locale) {
        self.as_widget().on_locale_changed(locale)
    }

    fn store_settings(&self, config: &mut WidgetConfig) {
        self.as_widget_const().store_settings(config)
    }

    fn on_close(&mut self) {
        self.as_widget().on_close()
    }
}

/// Loads widget libraries from temp copies so the originals stay writable.
///
/// Each copy lives as long as its [`WidgetLibrary`], so replaced libraries
/// do not pile up across rescans.
pub struct PluginLoader {
    temp_dir: PathBuf,
}

impl Default for PluginLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginLoader {
    pub fn new() -> Self {
        let temp_dir = std::env::temp_dir()
            .join("widgetdesk_plugins")
            .join(std::process::id().to_string());
        Self { temp_dir }
    }

    /// # Safety
    /// Loading a library runs its initializers; only load trusted widgets.
    pub unsafe fn load(&self, path: &Path) -> Result<Arc<WidgetLibrary>, PluginError> {
        let copy = TempCopy(self.copy_to_temp(path)?);
        let lib = unsafe { Library::new(&copy.0) }.map_err(PluginError::Loading)?;

        let metadata_fn = *unsafe { lib.get::<extern "C" fn() -> WidgetMetadata>(SYMBOL_METADATA) }
            .map_err(|source| missing(SYMBOL_METADATA, source))?;
        let metadata = metadata_fn();

        if metadata.abi_version != WIDGET_ABI_VERSION {
            return Err(PluginError::VersionMismatch {
                expected: WIDGET_ABI_VERSION,
                got: metadata.abi_version,
            });
        }

        let create = *unsafe { lib.get::<CreateFn>(SYMBOL_CREATE) }
            .map_err(|source| missing(SYMBOL_CREATE, source))?;
        let destroy = *unsafe { lib.get::<DestroyFn>(SYMBOL_DESTROY) }
            .map_err(|source| missing(SYMBOL_DESTROY, source))?;

        let name = std::str::from_utf8(unsafe {
            std::slice::from_raw_parts(metadata.name, metadata.name_len)
        })?
        .to_string();

        debug!(library = %path.display(), name = %name, "widget library loaded");

        Ok(Arc::new(WidgetLibrary {
            name,
            create,
            destroy,
            _lib: lib,
            _copy: copy,
        }))
    }

    fn copy_to_temp(&self, path: &Path) -> Result<PathBuf, PluginError> {
        let stem = path.file_stem().ok_or_else(|| {
            PluginError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Invalid widget library path",
            ))
        })?;

        std::fs::create_dir_all(&self.temp_dir)?;

        // Unique name so a rescan never overwrites a library still in use
        let temp_name = format!(
            "{}_{}.{}",
            stem.to_string_lossy(),
            rand::random::<u32>(),
            dll_extension()
        );

        let temp_path = self.temp_dir.join(temp_name);
        std::fs::copy(path, &temp_path)?;

        Ok(temp_path)
    }
}

impl Drop for PluginLoader {
    fn drop(&mut self) {
        // Fails while libraries are still mapped on Windows; nothing to do then
        let _ = std::fs::remove_dir_all(&self.temp_dir);
    }
}

fn missing(symbol: &[u8], source: libloading::Error) -> PluginError {
    PluginError::MissingSymbol {
        symbol: String::from_utf8_lossy(symbol).into_owned(),
        source,
    }
}

pub fn is_library(path: &Path) -> bool {
    path.extension().and_then(|s| s.to_str()) == Some(dll_extension())
}

pub fn dll_extension() -> &'static str {
    #[cfg(target_os = "windows")]
    return "dll";

    #[cfg(target_os = "macos")]
    return "dylib";

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    return "so";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_extension() {
        let lib = PathBuf::from(format!("clock.{}", dll_extension()));
        assert!(is_library(&lib));
        assert!(!is_library(Path::new("clock.toml")));
    }

    #[test]
    fn test_garbage_library_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(format!("broken.{}", dll_extension()));
        std::fs::write(&path, b"not a shared object").unwrap();

        let loader = PluginLoader {
            temp_dir: dir.path().join("tmp"),
        };
        let err = match unsafe { loader.load(&path) } {
            Ok(_) => panic!("garbage must not load"),
            Err(e) => e,
        };
        assert!(matches!(err, PluginError::Loading(_)));
        assert!(!err.is_missing_entry_point());

        let leftovers = std::fs::read_dir(dir.path().join("tmp")).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_temp_copy_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clock_1.so");
        std::fs::write(&path, b"copy").unwrap();

        drop(TempCopy(path.clone()));
        assert!(!path.exists());
    }
}
