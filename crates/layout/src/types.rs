use serde::{Deserialize, Serialize};

/// Clamp a size or margin to a finite, non-negative value.
pub fn sanitize(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle in canvas units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const ZERO: Rect = Rect {
        x: 0.0,
        y: 0.0,
        width: 0.0,
        height: 0.0,
    };

    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Copy with width and height clamped to finite, non-negative values.
    pub fn normalized(&self) -> Self {
        Self {
            x: self.x,
            y: self.y,
            width: sanitize(self.width),
            height: sanitize(self.height),
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Grow by `amount` on every side.
    pub fn expand(&self, amount: f64) -> Self {
        Self {
            x: self.x - amount,
            y: self.y - amount,
            width: self.width + 2.0 * amount,
            height: self.height + 2.0 * amount,
        }
    }

    pub fn with_y(&self, y: f64) -> Self {
        Self { y, ..*self }
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }

    /// Smallest rectangle containing both.
    pub fn union(&self, other: &Rect) -> Self {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Self {
            x,
            y,
            width: self.right().max(other.right()) - x,
            height: self.bottom().max(other.bottom()) - y,
        }
    }

    pub fn bounding<'a>(rects: impl IntoIterator<Item = &'a Rect>) -> Option<Rect> {
        rects.into_iter().fold(None, |acc, rect| match acc {
            None => Some(*rect),
            Some(bounds) => Some(bounds.union(rect)),
        })
    }
}

/// One straight leg of a connector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub start: Point,
    pub end: Point,
}

impl Line {
    pub const fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }

    pub fn is_degenerate(&self) -> bool {
        self.start == self.end
    }

    pub fn bounds(&self) -> Rect {
        let x = self.start.x.min(self.end.x);
        let y = self.start.y.min(self.end.y);
        Rect::new(
            x,
            y,
            self.start.x.max(self.end.x) - x,
            self.start.y.max(self.end.y) - y,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CollisionResult {
    pub collides: bool,
    /// Overlap depth on each axis, only set when `collides` is true.
    pub penetration: Option<Point>,
}

impl CollisionResult {
    pub const CLEAR: CollisionResult = CollisionResult {
        collides: false,
        penetration: None,
    };

    pub const HIT: CollisionResult = CollisionResult {
        collides: true,
        penetration: None,
    };
}

/// Spacing between columns (`x`) and between stacked nodes (`y`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Padding {
    pub x: f64,
    pub y: f64,
}

impl Default for Padding {
    fn default() -> Self {
        Self { x: 100.0, y: 21.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SectionPadding {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl SectionPadding {
    pub const fn uniform(value: f64) -> Self {
        Self {
            top: value,
            right: value,
            bottom: value,
            left: value,
        }
    }
}

/// Which side of a node a connector attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionSide {
    Input,
    Output,
}

/// Elbow connector shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Orientation {
    /// Horizontal to the midpoint X, vertical, then horizontal into the target.
    HorizontalFirst,
    /// Vertical at the source X, then horizontal into the target.
    VerticalFirst,
}

impl Orientation {
    pub const ALL: [Orientation; 2] = [Orientation::HorizontalFirst, Orientation::VerticalFirst];
}

/// Result of an iteration-capped search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounded<T> {
    pub value: T,
    pub reached_cap: bool,
}

impl<T> Bounded<T> {
    pub fn settled(value: T) -> Self {
        Self {
            value,
            reached_cap: false,
        }
    }

    pub fn capped(value: T) -> Self {
        Self {
            value,
            reached_cap: true,
        }
    }
}
