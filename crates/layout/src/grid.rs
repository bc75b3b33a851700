use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::geometry::rectangles_overlap;
use crate::types::*;

pub const DEFAULT_GRID_SIZE: f64 = 20.0;
pub const DEFAULT_PATH_MARGIN: f64 = 20.0;
/// Cells expanded before the search gives up.
pub const PATHFINDER_ITERATIONS: usize = 2000;

/// Side length of the footprint square standing in for connector thickness.
const PROBE_SIZE: f64 = 4.0;

type Cell = (i64, i64);

/// Grid-snapped A* search around rectangular obstacles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pathfinder {
    grid_size: f64,
    margin: f64,
}

impl Default for Pathfinder {
    fn default() -> Self {
        Self::new(DEFAULT_GRID_SIZE, DEFAULT_PATH_MARGIN)
    }
}

impl Pathfinder {
    pub fn new(grid_size: f64, margin: f64) -> Self {
        let grid_size = if grid_size.is_finite() && grid_size > 0.0 {
            grid_size
        } else {
            DEFAULT_GRID_SIZE
        };
        Self {
            grid_size,
            margin: sanitize(margin),
        }
    }

    pub fn grid_size(&self) -> f64 {
        self.grid_size
    }

    fn snap(&self, point: &Point) -> Option<Cell> {
        let x = (point.x / self.grid_size).round();
        let y = (point.y / self.grid_size).round();
        (x.is_finite() && y.is_finite()).then_some((x as i64, y as i64))
    }

    fn cell_position(&self, (x, y): Cell) -> Point {
        Point::new(x as f64 * self.grid_size, y as f64 * self.grid_size)
    }

    fn is_blocked(&self, cell: Cell, obstacles: &[Rect]) -> bool {
        let center = self.cell_position(cell);
        let footprint = Rect::new(
            center.x - PROBE_SIZE / 2.0,
            center.y - PROBE_SIZE / 2.0,
            PROBE_SIZE,
            PROBE_SIZE,
        );
        obstacles
            .iter()
            .any(|obstacle| rectangles_overlap(&footprint, obstacle, self.margin).collides)
    }

    /// Waypoints on the grid from `start` to `end`, both snapped to the
    /// nearest cell. `None` when the goal is unreachable or the iteration
    /// cap is hit. The start cell itself is never tested for collisions.
    pub fn find_path(&self, start: Point, end: Point, obstacles: &[Rect]) -> Option<Vec<Point>> {
        let start = self.snap(&start)?;
        let goal = self.snap(&end)?;
        let heuristic = |(x, y): Cell| (x - goal.0).unsigned_abs() + (y - goal.1).unsigned_abs();

        // (f, h, x, y) keeps pops deterministic on ties.
        let mut open = BinaryHeap::new();
        open.push(Reverse((heuristic(start), heuristic(start), start.0, start.1)));

        let mut best_cost: HashMap<Cell, u64> = HashMap::from([(start, 0)]);
        let mut came_from: HashMap<Cell, Cell> = HashMap::new();
        let mut closed: HashSet<Cell> = HashSet::new();

        let mut iterations = 0;
        while let Some(Reverse((_, _, x, y))) = open.pop() {
            if iterations == PATHFINDER_ITERATIONS {
                tracing::debug!(iterations, "pathfinder gave up");
                return None;
            }
            iterations += 1;

            let current = (x, y);
            if current == goal {
                return Some(self.reconstruct(&came_from, current));
            }
            if !closed.insert(current) {
                continue;
            }

            let cost = best_cost.get(&current).copied().unwrap_or(0);
            for (dx, dy) in [(0, -1), (0, 1), (-1, 0), (1, 0)] {
                let next = (x + dx, y + dy);
                if closed.contains(&next) || self.is_blocked(next, obstacles) {
                    continue;
                }
                let next_cost = cost + 1;
                if best_cost.get(&next).is_some_and(|&known| known <= next_cost) {
                    continue;
                }
                best_cost.insert(next, next_cost);
                came_from.insert(next, current);
                let h = heuristic(next);
                open.push(Reverse((next_cost + h, h, next.0, next.1)));
            }
        }

        None
    }

    fn reconstruct(&self, came_from: &HashMap<Cell, Cell>, goal: Cell) -> Vec<Point> {
        let mut path = vec![self.cell_position(goal)];
        let mut current = goal;
        while let Some(&previous) = came_from.get(&current) {
            path.push(self.cell_position(previous));
            current = previous;
        }
        path.reverse();
        path
    }
}

/// Drop waypoints that lie on a straight run, keeping only the corners.
pub fn simplify_path(points: &[Point]) -> Vec<Point> {
    let mut simplified: Vec<Point> = Vec::with_capacity(points.len());
    for &point in points {
        if simplified.last() == Some(&point) {
            continue;
        }
        let straight = match simplified.as_slice() {
            [.., before, last] => {
                (before.x == last.x && last.x == point.x) || (before.y == last.y && last.y == point.y)
            }
            _ => false,
        };
        if straight {
            simplified.pop();
        }
        simplified.push(point);
    }
    simplified
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_orthogonal(path: &[Point]) -> bool {
        path.windows(2).all(|w| {
            let (dx, dy) = ((w[1].x - w[0].x).abs(), (w[1].y - w[0].y).abs());
            (dx == 0.0) != (dy == 0.0)
        })
    }

    #[test]
    fn straight_path_without_obstacles() {
        let finder = Pathfinder::default();
        let path = finder
            .find_path(Point::new(0.0, 0.0), Point::new(100.0, 0.0), &[])
            .unwrap();
        assert_eq!(path.first(), Some(&Point::new(0.0, 0.0)));
        assert_eq!(path.last(), Some(&Point::new(100.0, 0.0)));
        assert_eq!(path.len(), 6);
        assert!(is_orthogonal(&path));
    }

    #[test]
    fn endpoints_are_snapped() {
        let finder = Pathfinder::default();
        let path = finder
            .find_path(Point::new(9.0, 11.0), Point::new(41.0, 19.0), &[])
            .unwrap();
        assert_eq!(path.first(), Some(&Point::new(0.0, 20.0)));
        assert_eq!(path.last(), Some(&Point::new(40.0, 20.0)));
    }

    #[test]
    fn routes_around_an_obstacle() {
        let finder = Pathfinder::default();
        let wall = Rect::new(80.0, -60.0, 40.0, 120.0);
        let path = finder
            .find_path(Point::new(0.0, 0.0), Point::new(200.0, 0.0), &[wall])
            .unwrap();

        assert_eq!(path.last(), Some(&Point::new(200.0, 0.0)));
        assert!(is_orthogonal(&path));
        for point in &path[1..] {
            let footprint = Rect::new(point.x - 2.0, point.y - 2.0, 4.0, 4.0);
            assert!(!rectangles_overlap(&footprint, &wall, 20.0).collides);
        }
        assert!(path.iter().any(|p| p.y.abs() > 60.0));
    }

    #[test]
    fn enclosed_goal_is_unreachable() {
        let finder = Pathfinder::default();
        let blob = Rect::new(150.0, -50.0, 100.0, 100.0);
        assert_eq!(
            finder.find_path(Point::new(0.0, 0.0), Point::new(200.0, 0.0), &[blob]),
            None
        );
    }

    #[test]
    fn same_cell_is_a_single_point() {
        let finder = Pathfinder::default();
        let path = finder
            .find_path(Point::new(1.0, 1.0), Point::new(2.0, 2.0), &[])
            .unwrap();
        assert_eq!(path, vec![Point::new(0.0, 0.0)]);
    }

    #[test]
    fn simplify_keeps_corners() {
        let points = [
            Point::new(0.0, 0.0),
            Point::new(20.0, 0.0),
            Point::new(40.0, 0.0),
            Point::new(40.0, 20.0),
            Point::new(40.0, 20.0),
            Point::new(40.0, 40.0),
        ];
        assert_eq!(
            simplify_path(&points),
            vec![Point::new(0.0, 0.0), Point::new(40.0, 0.0), Point::new(40.0, 40.0)]
        );
    }
}
