//! Screen Module
//!
//! Per-screen state: root window, dimensions and the usable work area.

use crate::config::Gap;
use crate::shared::Geometry;
use crate::wm::adapter::{ScreenInfo, Window};

/// A managed screen
#[derive(Debug, Clone)]
pub struct Screen {
    pub index: usize,
    pub root: Window,
    pub width: u32,
    pub height: u32,
    /// Space reserved at the screen edges (panels, docks)
    pub gap: Gap,
}

impl Screen {
    pub fn new(info: &ScreenInfo, gap: Gap) -> Self {
        Self {
            index: info.index,
            root: info.root,
            width: info.width,
            height: info.height,
            gap,
        }
    }

    /// Entire screen
    pub fn view(&self) -> Geometry {
        Geometry::new(0, 0, self.width, self.height)
    }

    /// Screen minus the configured gaps
    pub fn work_area(&self) -> Geometry {
        let horizontal = self.gap.left + self.gap.right;
        let vertical = self.gap.top + self.gap.bottom;
        Geometry::new(
            self.gap.left as i32,
            self.gap.top as i32,
            self.width.saturating_sub(horizontal).max(1),
            self.height.saturating_sub(vertical).max(1),
        )
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn work_area_subtracts_gaps() {
        let info = ScreenInfo {
            index: 0,
            root: 1,
            width: 1280,
            height: 800,
        };
        let screen = Screen::new(
            &info,
            Gap {
                top: 20,
                bottom: 0,
                left: 10,
                right: 10,
            },
        );
        assert_eq!(screen.work_area(), Geometry::new(10, 20, 1260, 780));
        assert_eq!(screen.view(), Geometry::new(0, 0, 1280, 800));
    }
}
