//! Geometry primitives shared by the placement engine, the client registry
//! and the display adapter.

/// Window geometry (outer position, inner size)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Geometry {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Geometry {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Right edge (exclusive)
    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    /// Bottom edge (exclusive)
    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }

    /// Whether a point lies inside this rectangle
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }

    /// Center point of the rectangle
    pub fn center(&self) -> Point {
        Point::new(
            self.x + (self.width / 2) as i32,
            self.y + (self.height / 2) as i32,
        )
    }
}

/// A position in root coordinates (or relative to a window, depending on use)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_excludes_far_edges() {
        let geom = Geometry::new(10, 10, 100, 50);
        assert!(geom.contains(Point::new(10, 10)));
        assert!(geom.contains(Point::new(109, 59)));
        assert!(!geom.contains(Point::new(110, 30)));
        assert!(!geom.contains(Point::new(50, 60)));
    }

    #[test]
    fn center_of_odd_sizes_rounds_down() {
        assert_eq!(Geometry::new(0, 0, 101, 51).center(), Point::new(50, 25));
    }
}
