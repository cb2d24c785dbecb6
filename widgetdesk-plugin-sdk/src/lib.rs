//! Building blocks for widgets shipped as dynamic libraries.
//!
//! A widget library is a `cdylib` that implements [`Widget`] for a
//! `Default` type and calls [`export_widget!`] once. A manifest in the
//! widget directory points at the built library:
//!
//! ```toml
//! # Dependencies:
//! #   requests==2.28.1
//! library = "libexample_widget.so"
//! title = "Example"
//! ```
//!
//! Host and widget must be built with the same compiler and the same
//! `widgetdesk-core` version; the ABI version in the metadata guards the
//! exported symbol set only.

pub use widgetdesk_core::plugin::{FatPointer, WIDGET_ABI_VERSION, WidgetMetadata};
pub use widgetdesk_core::{Event, EventResult, Locale, Size, Widget, WidgetConfig};

#[macro_export]
macro_rules! export_widget {
    ($widget_type:ty, $name:expr) => {
        #[unsafe(no_mangle)]
        pub extern "C" fn widgetdesk_widget_metadata() -> $crate::WidgetMetadata {
            $crate::WidgetMetadata {
                abi_version: $crate::WIDGET_ABI_VERSION,
                name: $name.as_ptr(),
                name_len: $name.len(),
            }
        }

        // Allocates with the library's allocator
        #[unsafe(no_mangle)]
        pub extern "C" fn widgetdesk_widget_create() -> $crate::FatPointer {
            let widget: Box<dyn $crate::Widget> = Box::new(<$widget_type>::default());
            let ptr = Box::into_raw(widget);
            // Split fat pointer into data and vtable components
            unsafe {
                let parts: [*mut std::ffi::c_void; 2] = std::mem::transmute(ptr);
                $crate::FatPointer {
                    data: parts[0],
                    vtable: parts[1],
                }
            }
        }

        // Frees with the library's allocator
        #[unsafe(no_mangle)]
        pub extern "C" fn widgetdesk_widget_destroy(ptr: $crate::FatPointer) {
            if !ptr.data.is_null() {
                unsafe {
                    let fat_ptr: *mut dyn $crate::Widget =
                        std::mem::transmute([ptr.data, ptr.vtable]);
                    let _ = Box::from_raw(fat_ptr);
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{buffer::Buffer, layout::Rect};

    #[derive(Default)]
    struct Dummy;

    impl Widget for Dummy {
        fn render(&mut self, _area: Rect, _buf: &mut Buffer) {}

        fn preferred_size(&self) -> Option<Size> {
            Some(Size {
                width: 20,
                height: 5,
            })
        }
    }

    export_widget!(Dummy, "dummy");

    #[test]
    fn test_exported_symbols() {
        let metadata = widgetdesk_widget_metadata();
        assert_eq!(metadata.abi_version, WIDGET_ABI_VERSION);
        let name = unsafe { std::slice::from_raw_parts(metadata.name, metadata.name_len) };
        assert_eq!(name, b"dummy");

        let ptr = widgetdesk_widget_create();
        let widget: *mut dyn Widget = unsafe { std::mem::transmute([ptr.data, ptr.vtable]) };
        let size = unsafe { (*widget).preferred_size() };
        assert_eq!(
            size,
            Some(Size {
                width: 20,
                height: 5
            })
        );
        widgetdesk_widget_destroy(ptr);
    }
}
