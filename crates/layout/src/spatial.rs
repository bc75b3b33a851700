use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::geometry::rectangles_overlap;
use crate::types::*;

pub const DEFAULT_CELL_SIZE: f64 = 100.0;
/// Smaller configured cell sizes are raised to this.
pub const MIN_CELL_SIZE: f64 = 10.0;
/// Rectangles spanning more cells than this bypass the buckets.
pub const MAX_SPANNED_CELLS: u128 = 4096;

/// Uniform grid bucketing entity ids by the cells their bounding boxes span.
///
/// `query` returns candidates only; callers still run the exact test.
/// Oversized entries and queries fall back to a scan of the stored bounds.
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    cell_size: f64,
    cells: HashMap<(i64, i64), BTreeSet<String>>,
    bounds: BTreeMap<String, Rect>,
    oversized: BTreeSet<String>,
}

impl Default for SpatialGrid {
    fn default() -> Self {
        Self::new(DEFAULT_CELL_SIZE)
    }
}

impl SpatialGrid {
    pub fn new(cell_size: f64) -> Self {
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 {
            cell_size.max(MIN_CELL_SIZE)
        } else {
            DEFAULT_CELL_SIZE
        };
        Self {
            cell_size,
            cells: HashMap::new(),
            bounds: BTreeMap::new(),
            oversized: BTreeSet::new(),
        }
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    fn cell_range(&self, rect: &Rect) -> Option<(i64, i64, i64, i64)> {
        let rect = rect.normalized();
        if !rect.x.is_finite() || !rect.y.is_finite() {
            return None;
        }
        let start_x = (rect.x / self.cell_size).floor() as i64;
        let end_x = (rect.right() / self.cell_size).floor() as i64;
        let start_y = (rect.y / self.cell_size).floor() as i64;
        let end_y = (rect.bottom() / self.cell_size).floor() as i64;
        Some((start_x, end_x, start_y, end_y))
    }

    fn spanned_cells((start_x, end_x, start_y, end_y): (i64, i64, i64, i64)) -> u128 {
        let columns = (i128::from(end_x) - i128::from(start_x) + 1).unsigned_abs();
        let rows = (i128::from(end_y) - i128::from(start_y) + 1).unsigned_abs();
        columns.saturating_mul(rows)
    }

    pub fn insert(&mut self, id: &str, rect: &Rect) {
        let Some(range) = self.cell_range(rect) else {
            return;
        };
        self.bounds.insert(id.to_string(), rect.normalized());
        if Self::spanned_cells(range) > MAX_SPANNED_CELLS {
            self.oversized.insert(id.to_string());
            return;
        }
        let (start_x, end_x, start_y, end_y) = range;
        for cx in start_x..=end_x {
            for cy in start_y..=end_y {
                self.cells
                    .entry((cx, cy))
                    .or_default()
                    .insert(id.to_string());
            }
        }
    }

    /// Ids stored in any cell the rectangle spans, de-duplicated and sorted.
    pub fn query(&self, rect: &Rect) -> Vec<String> {
        let Some(range) = self.cell_range(rect) else {
            return Vec::new();
        };
        if Self::spanned_cells(range) > MAX_SPANNED_CELLS {
            return self.scan(rect, self.bounds.keys());
        }

        let (start_x, end_x, start_y, end_y) = range;
        let mut found = BTreeSet::new();
        for cx in start_x..=end_x {
            for cy in start_y..=end_y {
                if let Some(ids) = self.cells.get(&(cx, cy)) {
                    found.extend(ids.iter().cloned());
                }
            }
        }
        found.extend(self.scan(rect, self.oversized.iter()));
        found.into_iter().collect()
    }

    fn scan<'a>(&self, rect: &Rect, ids: impl Iterator<Item = &'a String>) -> Vec<String> {
        ids.filter(|id| {
            self.bounds
                .get(*id)
                .is_some_and(|bounds| rectangles_overlap(bounds, rect, 0.0).collides)
        })
        .cloned()
        .collect()
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.bounds.clear();
        self.oversized.clear();
    }

    /// Build a grid holding every rectangle of a position table.
    pub fn from_positions<'a>(
        cell_size: f64,
        positions: impl IntoIterator<Item = (&'a String, &'a Rect)>,
    ) -> Self {
        let mut grid = Self::new(cell_size);
        for (id, rect) in positions {
            grid.insert(id, rect);
        }
        grid
    }
}
