use serde::{Deserialize, Serialize};

/// A position in the normalized projected plane.
///
/// The clustering engine projects the world onto the unit square, so both
/// coordinates normally fall in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    /// Create a point from projected coordinates.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// The square root is left to the caller; distance comparisons do not
    /// need it.
    pub fn distance_squared(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

/// An axis-aligned rectangle in the projected plane.
///
/// The rectangle is closed: points lying exactly on an edge are contained.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Bounds {
    /// Create a rectangle from its extents.
    pub fn new(min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> Self {
        Self {
            min_x,
            max_x,
            min_y,
            max_y,
        }
    }

    /// The unit square the engine projects into.
    pub fn unit() -> Self {
        Self::new(0.0, 1.0, 0.0, 1.0)
    }

    /// A square window of side `span` centered on `center`.
    pub fn from_center_span(center: Point, span: f64) -> Self {
        let half_span = span / 2.0;
        Self::new(
            center.x - half_span,
            center.x + half_span,
            center.y - half_span,
            center.y + half_span,
        )
    }

    /// Whether `point` lies within the closed rectangle.
    pub fn contains(&self, point: &Point) -> bool {
        point.x >= self.min_x
            && point.x <= self.max_x
            && point.y >= self.min_y
            && point.y <= self.max_y
    }

    /// Whether two rectangles overlap (shared edges count).
    pub fn intersects(&self, other: &Bounds) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    /// Whether `other` lies entirely within this rectangle.
    pub fn contains_bounds(&self, other: &Bounds) -> bool {
        other.min_x >= self.min_x
            && other.max_x <= self.max_x
            && other.min_y >= self.min_y
            && other.max_y <= self.max_y
    }

    /// Horizontal midpoint.
    pub fn mid_x(&self) -> f64 {
        (self.min_x + self.max_x) / 2.0
    }

    /// Vertical midpoint.
    pub fn mid_y(&self) -> f64 {
        (self.min_y + self.max_y) / 2.0
    }

    /// The four quadrants of this rectangle, ordered NW, NE, SW, SE.
    pub fn quadrants(&self) -> [Bounds; 4] {
        let mx = self.mid_x();
        let my = self.mid_y();
        [
            Bounds::new(self.min_x, mx, self.min_y, my),
            Bounds::new(mx, self.max_x, self.min_y, my),
            Bounds::new(self.min_x, mx, my, self.max_y),
            Bounds::new(mx, self.max_x, my, self.max_y),
        ]
    }
}
