// widgetdesk-core/src/geometry.rs
//! Placement of widgets on the overlay, in terminal cells.

use ratatui::layout::Rect;

pub const MIN_WIDTH: u16 = 12;
pub const MIN_HEIGHT: u16 = 3;
pub const DEFAULT_WIDTH: u16 = 30;
pub const DEFAULT_HEIGHT: u16 = 8;
/// Side of the square resize handle in the bottom-right corner
pub const RESIZE_HANDLE: u16 = 1;

/// Screen rectangle of a placed widget. Positions are signed because saved
/// configs may hold coordinates from a larger screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub x: i32,
    pub y: i32,
    pub width: u16,
    pub height: u16,
}

impl Geometry {
    pub fn new(x: i32, y: i32, width: u16, height: u16) -> Self {
        Self {
            x,
            y,
            width: width.max(MIN_WIDTH),
            height: height.max(MIN_HEIGHT),
        }
    }

    /// Default slot for the `index`-th placed widget (1-based)
    pub fn cascade(index: usize, width: u16, height: u16) -> Self {
        let step = index as i32;
        Self::new(4 * step, 2 * step, width, height)
    }

    pub fn contains(&self, col: u16, row: u16) -> bool {
        let (col, row) = (i32::from(col), i32::from(row));
        col >= self.x
            && col < self.x + i32::from(self.width)
            && row >= self.y
            && row < self.y + i32::from(self.height)
    }

    pub fn in_resize_area(&self, col: u16, row: u16) -> bool {
        if !self.contains(col, row) {
            return false;
        }
        let right = self.x + i32::from(self.width);
        let bottom = self.y + i32::from(self.height);
        i32::from(col) >= right - i32::from(RESIZE_HANDLE)
            && i32::from(row) >= bottom - i32::from(RESIZE_HANDLE)
    }

    /// Keep the rectangle inside `area`, shrinking it if it does not fit
    pub fn clamp_to(self, area: Rect) -> Self {
        let width = self.width.min(area.width.max(MIN_WIDTH));
        let height = self.height.min(area.height.max(MIN_HEIGHT));
        let max_x = i32::from(area.x) + i32::from(area.width) - i32::from(width);
        let max_y = i32::from(area.y) + i32::from(area.height) - i32::from(height);

        Self {
            x: self.x.min(max_x).max(i32::from(area.x)),
            y: self.y.min(max_y).max(i32::from(area.y)),
            width,
            height,
        }
    }

    /// Visible part of the widget, `None` if it is entirely off-screen
    pub fn to_rect(self, area: Rect) -> Option<Rect> {
        let left = self.x.max(i32::from(area.x));
        let top = self.y.max(i32::from(area.y));
        let right = (self.x + i32::from(self.width)).min(i32::from(area.right()));
        let bottom = (self.y + i32::from(self.height)).min(i32::from(area.bottom()));

        if right <= left || bottom <= top {
            return None;
        }

        Some(Rect::new(
            left as u16,
            top as u16,
            (right - left) as u16,
            (bottom - top) as u16,
        ))
    }
}

/// Pointer interaction in progress on one widget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragMode {
    /// Pointer offset from the widget origin at press time
    Move { offset_x: i32, offset_y: i32 },
    Resize,
}

impl DragMode {
    pub fn begin(geometry: &Geometry, col: u16, row: u16) -> Self {
        if geometry.in_resize_area(col, row) {
            DragMode::Resize
        } else {
            DragMode::Move {
                offset_x: i32::from(col) - geometry.x,
                offset_y: i32::from(row) - geometry.y,
            }
        }
    }

    /// Geometry after the pointer moved to (`col`, `row`)
    pub fn apply(self, geometry: Geometry, col: u16, row: u16, area: Rect) -> Geometry {
        let (col, row) = (i32::from(col), i32::from(row));
        let next = match self {
            DragMode::Move { offset_x, offset_y } => Geometry {
                x: col - offset_x,
                y: row - offset_y,
                ..geometry
            },
            DragMode::Resize => {
                let width = (col - geometry.x + 1).clamp(i32::from(MIN_WIDTH), i32::from(u16::MAX));
                let height =
                    (row - geometry.y + 1).clamp(i32::from(MIN_HEIGHT), i32::from(u16::MAX));
                Geometry {
                    width: width as u16,
                    height: height as u16,
                    ..geometry
                }
            }
        };
        next.clamp_to(area)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCREEN: Rect = Rect {
        x: 0,
        y: 0,
        width: 100,
        height: 40,
    };

    #[test]
    fn test_new_enforces_minimum_size() {
        let g = Geometry::new(0, 0, 2, 1);
        assert_eq!((g.width, g.height), (MIN_WIDTH, MIN_HEIGHT));
    }

    #[test]
    fn test_cascade_positions() {
        assert_eq!(Geometry::cascade(1, 30, 8), Geometry::new(4, 2, 30, 8));
        assert_eq!(Geometry::cascade(3, 30, 8), Geometry::new(12, 6, 30, 8));
    }

    #[test]
    fn test_resize_area_is_bottom_right_corner() {
        let g = Geometry::new(10, 5, 20, 6);
        assert!(g.in_resize_area(29, 10));
        assert!(!g.in_resize_area(28, 10));
        assert!(!g.in_resize_area(30, 11));
        assert!(g.contains(10, 5));
        assert!(!g.contains(30, 5));
    }

    #[test]
    fn test_drag_moves_by_offset() {
        let g = Geometry::new(10, 5, 20, 6);
        let mode = DragMode::begin(&g, 12, 6);
        assert_eq!(
            mode,
            DragMode::Move {
                offset_x: 2,
                offset_y: 1
            }
        );

        let moved = mode.apply(g, 42, 20, SCREEN);
        assert_eq!((moved.x, moved.y), (40, 19));
        assert_eq!((moved.width, moved.height), (20, 6));
    }

    #[test]
    fn test_drag_clamps_to_screen() {
        let g = Geometry::new(10, 5, 20, 6);
        let mode = DragMode::begin(&g, 10, 5);
        let moved = mode.apply(g, 99, 39, SCREEN);
        assert_eq!((moved.x, moved.y), (80, 34));
    }

    #[test]
    fn test_resize_respects_minimum() {
        let g = Geometry::new(10, 5, 20, 6);
        let mode = DragMode::begin(&g, 29, 10);
        assert_eq!(mode, DragMode::Resize);

        let grown = mode.apply(g, 49, 14, SCREEN);
        assert_eq!((grown.width, grown.height), (40, 10));

        let shrunk = mode.apply(g, 11, 5, SCREEN);
        assert_eq!((shrunk.width, shrunk.height), (MIN_WIDTH, MIN_HEIGHT));
    }

    #[test]
    fn test_to_rect_clips_offscreen_parts() {
        let g = Geometry::new(-5, 38, 20, 6);
        assert_eq!(g.to_rect(SCREEN), Some(Rect::new(0, 38, 15, 2)));
        assert_eq!(Geometry::new(200, 0, 20, 6).to_rect(SCREEN), None);
    }
}
