//! Geometric primitives shared by the collision engine, the layout engine and
//! the pathfinder.
//!
//! All functions are pure. Margins and sizes are clamped to finite,
//! non-negative values before use, so a NaN or negative margin behaves like 0.

use crate::types::*;

/// Test two rectangles for overlap with a required clearance of `margin`.
///
/// Each rectangle grows by `margin / 2` on every side, so the total
/// separation needed between them is `margin`. Touching after expansion
/// counts as a collision.
pub fn rectangles_overlap(a: &Rect, b: &Rect, margin: f64) -> CollisionResult {
    let half = sanitize(margin) / 2.0;
    let a = a.normalized().expand(half);
    let b = b.normalized().expand(half);

    let separated = a.right() < b.x || b.right() < a.x || a.bottom() < b.y || b.bottom() < a.y;
    if separated {
        return CollisionResult::CLEAR;
    }

    let x_penetration = (a.right().min(b.right()) - a.x.max(b.x)).max(0.0);
    let y_penetration = (a.bottom().min(b.bottom()) - a.y.max(b.y)).max(0.0);

    CollisionResult {
        collides: true,
        penetration: Some(Point::new(x_penetration, y_penetration)),
    }
}

/// Test a segment against a rectangle grown by `margin` on every side.
pub fn line_intersects_rectangle(line: &Line, rect: &Rect, margin: f64) -> CollisionResult {
    let expanded = rect.normalized().expand(sanitize(margin));

    if point_in_rectangle(&line.start, &expanded) || point_in_rectangle(&line.end, &expanded) {
        return CollisionResult::HIT;
    }

    let top_left = Point::new(expanded.x, expanded.y);
    let top_right = Point::new(expanded.right(), expanded.y);
    let bottom_right = Point::new(expanded.right(), expanded.bottom());
    let bottom_left = Point::new(expanded.x, expanded.bottom());
    let edges = [
        Line::new(top_left, top_right),
        Line::new(top_right, bottom_right),
        Line::new(bottom_right, bottom_left),
        Line::new(bottom_left, top_left),
    ];

    if edges.iter().any(|edge| lines_intersect(line, edge)) {
        CollisionResult::HIT
    } else {
        CollisionResult::CLEAR
    }
}

/// Inclusive containment test.
pub fn point_in_rectangle(point: &Point, rect: &Rect) -> bool {
    point.x >= rect.x && point.x <= rect.right() && point.y >= rect.y && point.y <= rect.bottom()
}

/// Proper segment intersection.
///
/// Uses open parameter intervals, so segments that only meet at an endpoint
/// do not intersect. Parallel segments never intersect, collinear overlap
/// included.
pub fn lines_intersect(first: &Line, second: &Line) -> bool {
    let (a, b) = (first.start, first.end);
    let (c, d) = (second.start, second.end);

    let det = (b.x - a.x) * (d.y - c.y) - (d.x - c.x) * (b.y - a.y);
    if det == 0.0 || !det.is_finite() {
        return false;
    }

    let lambda = ((d.y - c.y) * (d.x - a.x) + (c.x - d.x) * (d.y - a.y)) / det;
    let gamma = ((a.y - b.y) * (d.x - a.x) + (b.x - a.x) * (d.y - a.y)) / det;

    (0.0 < lambda && lambda < 1.0) && (0.0 < gamma && gamma < 1.0)
}

/// Euclidean gap between two rectangles, 0 when they touch or overlap.
pub fn rectangle_distance(a: &Rect, b: &Rect) -> f64 {
    let a = a.normalized();
    let b = b.normalized();
    let dx = (a.x - b.right()).max(b.x - a.right()).max(0.0);
    let dy = (a.y - b.bottom()).max(b.y - a.bottom()).max(0.0);
    (dx * dx + dy * dy).sqrt()
}

/// All rectangles hit by the horizontal segment at `y` between the two x
/// values (in either order).
pub fn horizontal_line_collides_in_range(
    y: f64,
    x_start: f64,
    x_end: f64,
    rectangles: &[Rect],
    margin: f64,
) -> Vec<Rect> {
    let line = Line::new(
        Point::new(x_start.min(x_end), y),
        Point::new(x_start.max(x_end), y),
    );
    rectangles
        .iter()
        .filter(|rect| line_intersects_rectangle(&line, rect, margin).collides)
        .copied()
        .collect()
}
