//! Collision engine: finds the first vertical position where a node neither
//! overlaps an already placed node nor forces one of its incoming connectors
//! through an unrelated node.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::geometry::*;
use crate::graph::Edge;
use crate::spatial::{DEFAULT_CELL_SIZE, SpatialGrid};
use crate::types::*;

pub const DEFAULT_MARGIN: f64 = 14.0;
pub const FINAL_GOOD_HEADER_HEIGHT: f64 = 24.0;

/// Passes of the node-vs-node push-down loop.
pub const NODE_OVERLAP_ITERATIONS: usize = 100;
/// Push-down steps of the connector search.
pub const EDGE_RETRY_LIMIT: usize = 50;
/// Push-down steps per subsection box.
pub const SUBSECTION_ITERATIONS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionConfig {
    pub node_to_node: bool,
    pub edge_to_node: bool,
    pub margin: f64,
    pub cell_size: f64,
    pub final_good_header: f64,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            node_to_node: true,
            edge_to_node: true,
            margin: DEFAULT_MARGIN,
            cell_size: DEFAULT_CELL_SIZE,
            final_good_header: FINAL_GOOD_HEADER_HEIGHT,
        }
    }
}

/// Position table and edge list of one layout run.
#[derive(Debug, Clone, Default)]
pub struct CollisionContext {
    pub node_positions: BTreeMap<String, Rect>,
    pub edges: Vec<Edge>,
    pub padding: Padding,
    /// Nodes whose input connector attaches below a header.
    pub final_goods: HashSet<String>,
}

impl CollisionContext {
    pub fn new(padding: Padding) -> Self {
        Self {
            padding,
            ..Default::default()
        }
    }

    pub fn record(&mut self, id: impl Into<String>, rect: Rect) {
        self.node_positions.insert(id.into(), rect);
    }

    pub fn position(&self, id: &str) -> Option<&Rect> {
        self.node_positions.get(id)
    }
}

/// Outcome of a placement search.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub y: f64,
    /// Clear orientation per placed parent. Empty when edges were not
    /// checked or the connector search was capped.
    pub orientations: Vec<(String, Orientation)>,
    /// Set when an iteration cap was hit and `y` is only the best found.
    pub degraded: bool,
}

/// A connector between two placed nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeRoute {
    pub orientation: Orientation,
    pub segments: Vec<Line>,
    /// False when no orientation avoided every third node.
    pub clear: bool,
}

impl EdgeRoute {
    /// Corner points from source to target.
    pub fn waypoints(&self) -> Vec<Point> {
        let mut points = Vec::with_capacity(self.segments.len() + 1);
        if let Some(first) = self.segments.first() {
            points.push(first.start);
        }
        points.extend(self.segments.iter().map(|segment| segment.end));
        points
    }
}

/// Segments of an elbow connector from `start` to `end`.
///
/// A shared X or Y collapses the elbow to one straight segment.
pub fn elbow_path(start: Point, end: Point, orientation: Orientation) -> Vec<Line> {
    if start == end {
        return Vec::new();
    }
    if start.x == end.x || start.y == end.y {
        return vec![Line::new(start, end)];
    }

    let segments = match orientation {
        Orientation::HorizontalFirst => {
            let mid_x = (start.x + end.x) / 2.0;
            let first = Point::new(mid_x, start.y);
            let second = Point::new(mid_x, end.y);
            vec![
                Line::new(start, first),
                Line::new(first, second),
                Line::new(second, end),
            ]
        }
        Orientation::VerticalFirst => {
            let corner = Point::new(start.x, end.y);
            vec![Line::new(start, corner), Line::new(corner, end)]
        }
    };

    segments
        .into_iter()
        .filter(|segment| !segment.is_degenerate())
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct CollisionEngine {
    config: CollisionConfig,
}

impl CollisionEngine {
    pub fn new(config: CollisionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CollisionConfig {
        &self.config
    }

    pub fn margin(&self) -> f64 {
        sanitize(self.config.margin)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn find_conflict_free_y(
        &self,
        node_id: &str,
        x: f64,
        initial_y: f64,
        width: f64,
        height: f64,
        context: &CollisionContext,
        parent_ids: &[String],
    ) -> f64 {
        self.find_conflict_free_placement(node_id, x, initial_y, width, height, context, parent_ids)
            .y
    }

    /// Lowest Y at or below `initial_y` where the node fits.
    ///
    /// Never fails: when a search runs into its cap the best position found
    /// is returned with `degraded` set.
    #[allow(clippy::too_many_arguments)]
    pub fn find_conflict_free_placement(
        &self,
        node_id: &str,
        x: f64,
        initial_y: f64,
        width: f64,
        height: f64,
        context: &CollisionContext,
        parent_ids: &[String],
    ) -> Placement {
        let initial_y = if initial_y.is_finite() { initial_y } else { 0.0 };
        let x = if x.is_finite() { x } else { 0.0 };
        let width = sanitize(width);
        let height = sanitize(height);

        let parents: Vec<(&str, Rect)> = parent_ids
            .iter()
            .filter(|id| id.as_str() != node_id)
            .filter_map(|id| context.position(id).map(|rect| (id.as_str(), *rect)))
            .collect();

        let has_obstacles = context.node_positions.keys().any(|id| id != node_id);
        if !has_obstacles && parents.is_empty() {
            return Placement {
                y: initial_y,
                orientations: Vec::new(),
                degraded: false,
            };
        }

        let grid = SpatialGrid::from_positions(
            self.config.cell_size,
            context
                .node_positions
                .iter()
                .filter(|(id, _)| id.as_str() != node_id),
        );
        let candidate = Candidate {
            id: node_id,
            x,
            width,
            height,
        };

        let mut y = initial_y;
        let mut degraded = false;

        if self.config.node_to_node {
            let resolved = self.resolve_node_overlaps(&candidate, y, context, &grid);
            degraded |= resolved.reached_cap;
            y = resolved.value;
        }

        let mut orientations = Vec::new();
        if self.config.edge_to_node && !parents.is_empty() {
            let routed = self.resolve_edge_overlaps(&candidate, y, context, &grid, &parents);
            degraded |= routed.reached_cap;
            let (routed_y, chosen) = routed.value;
            orientations = chosen;

            if routed_y > y {
                y = routed_y;
                if self.config.node_to_node {
                    let resolved = self.resolve_node_overlaps(&candidate, y, context, &grid);
                    degraded |= resolved.reached_cap;
                    y = resolved.value;
                }
            }
        }

        if degraded {
            warn!(node = node_id, y, "no conflict-free position found, using best effort");
        } else {
            debug!(node = node_id, initial_y, y, ?orientations, "placed node");
        }

        Placement {
            y,
            orientations,
            degraded,
        }
    }

    fn resolve_node_overlaps(
        &self,
        candidate: &Candidate<'_>,
        start_y: f64,
        context: &CollisionContext,
        grid: &SpatialGrid,
    ) -> Bounded<f64> {
        let margin = self.margin();
        let padding_y = sanitize(context.padding.y);
        let mut y = start_y;

        for _ in 0..NODE_OVERLAP_ITERATIONS {
            let rect = candidate.rect(y);
            let mut push_to: Option<f64> = None;

            for id in grid.query(&rect.expand(margin)) {
                let Some(placed) = context.position(&id) else {
                    continue;
                };
                if rectangles_overlap(&rect, placed, margin).collides {
                    let target = placed.bottom() + padding_y + margin;
                    push_to = Some(push_to.map_or(target, |current| current.max(target)));
                }
            }

            match push_to {
                None => return Bounded::settled(y),
                Some(target) => y = if target > y { target } else { y + 1.0 },
            }
        }

        Bounded::capped(y)
    }

    /// Lowest Y from `start_y` where every parent reaches the candidate
    /// through at least one orientation. Parents are judged separately, so
    /// two parents may settle on different orientations.
    fn resolve_edge_overlaps(
        &self,
        candidate: &Candidate<'_>,
        start_y: f64,
        context: &CollisionContext,
        grid: &SpatialGrid,
        parents: &[(&str, Rect)],
    ) -> Bounded<(f64, Vec<(String, Orientation)>)> {
        let padding_y = sanitize(context.padding.y);
        let mut y = start_y;

        for _ in 0..EDGE_RETRY_LIMIT {
            let rect = candidate.rect(y);
            let target = self.node_connection_point(candidate.id, &rect, ConnectionSide::Input, context);
            let mut chosen = Vec::with_capacity(parents.len());
            let mut push_below: Option<f64> = None;

            for (parent_id, parent_rect) in parents {
                let start = self.node_connection_point(parent_id, parent_rect, ConnectionSide::Output, context);
                let mut least_blocked: Option<f64> = None;
                let mut clear = None;

                for orientation in Orientation::ALL {
                    match self.lowest_blocker(parent_id, start, target, orientation, context, grid) {
                        None => {
                            clear = Some(orientation);
                            break;
                        }
                        Some(bottom) => {
                            least_blocked = Some(least_blocked.map_or(bottom, |current| current.min(bottom)));
                        }
                    }
                }

                match (clear, least_blocked) {
                    (Some(orientation), _) => chosen.push((parent_id.to_string(), orientation)),
                    (None, Some(bottom)) => {
                        push_below = Some(push_below.map_or(bottom, |current| current.max(bottom)));
                    }
                    (None, None) => {}
                }
            }

            match push_below {
                None => return Bounded::settled((y, chosen)),
                Some(bottom) => {
                    let target = bottom + padding_y + 2.0 * self.margin();
                    y = if target > y { target } else { y + 1.0 };
                }
            }
        }

        Bounded::capped((y, Vec::new()))
    }

    /// Bottom of the lowest node the elbow from `start` to `end` runs
    /// into, ignoring the parent it leaves from.
    fn lowest_blocker(
        &self,
        parent_id: &str,
        start: Point,
        end: Point,
        orientation: Orientation,
        context: &CollisionContext,
        grid: &SpatialGrid,
    ) -> Option<f64> {
        let margin = self.margin();
        let mut lowest: Option<f64> = None;

        for segment in elbow_path(start, end, orientation) {
            for id in grid.query(&segment.bounds().expand(margin)) {
                if id == parent_id {
                    continue;
                }
                let Some(obstacle) = context.position(&id) else {
                    continue;
                };
                if line_intersects_rectangle(&segment, obstacle, margin).collides {
                    let bottom = obstacle.bottom();
                    lowest = Some(lowest.map_or(bottom, |current| current.max(bottom)));
                }
            }
        }

        lowest
    }

    /// Attachment point of a connector on a node.
    ///
    /// Outputs leave from the right-middle. Inputs enter at the left-middle,
    /// except final goods, which are entered below their header.
    pub fn node_connection_point(
        &self,
        node_id: &str,
        rect: &Rect,
        side: ConnectionSide,
        context: &CollisionContext,
    ) -> Point {
        let rect = rect.normalized();
        match side {
            ConnectionSide::Output => Point::new(rect.right(), rect.y + rect.height / 2.0),
            ConnectionSide::Input if context.final_goods.contains(node_id) => {
                let header = sanitize(self.config.final_good_header).min(rect.height);
                Point::new(rect.x, rect.y + header + (rect.height - header) / 2.0)
            }
            ConnectionSide::Input => Point::new(rect.x, rect.y + rect.height / 2.0),
        }
    }

    /// Connector between two recorded nodes, `None` if either is unplaced.
    pub fn route_edge(&self, from: &str, to: &str, context: &CollisionContext) -> Option<EdgeRoute> {
        let from_rect = context.position(from)?;
        let to_rect = context.position(to)?;
        let start = self.node_connection_point(from, from_rect, ConnectionSide::Output, context);
        let end = self.node_connection_point(to, to_rect, ConnectionSide::Input, context);
        let margin = self.margin();

        let obstacles: Vec<&Rect> = context
            .node_positions
            .iter()
            .filter(|(id, _)| id.as_str() != from && id.as_str() != to)
            .map(|(_, rect)| rect)
            .collect();

        for orientation in Orientation::ALL {
            let segments = elbow_path(start, end, orientation);
            let blocked = segments.iter().any(|segment| {
                obstacles
                    .iter()
                    .any(|rect| line_intersects_rectangle(segment, rect, margin).collides)
            });
            if !blocked {
                return Some(EdgeRoute {
                    orientation,
                    segments,
                    clear: true,
                });
            }
        }

        debug!(from, to, "no clear connector route");
        Some(EdgeRoute {
            orientation: Orientation::HorizontalFirst,
            segments: elbow_path(start, end, Orientation::HorizontalFirst),
            clear: false,
        })
    }

    /// Bounding box of `rects` grown by `padding`; a zero rect when empty.
    pub fn calculate_subsection_bounds(&self, rects: &[Rect], padding: SectionPadding) -> Rect {
        let normalized: Vec<Rect> = rects.iter().map(Rect::normalized).collect();
        let Some(bounds) = Rect::bounding(&normalized) else {
            return Rect::ZERO;
        };
        Rect::new(
            bounds.x - padding.left,
            bounds.y - padding.top,
            bounds.width + padding.left + padding.right,
            bounds.height + padding.top + padding.bottom,
        )
    }

    pub fn check_overlap(&self, a: &Rect, b: &Rect) -> bool {
        rectangles_overlap(a, b, self.margin()).collides
    }

    /// Stack subsection boxes so none overlaps an earlier one.
    ///
    /// Boxes are handled in order; an overlapping box moves to one unit past
    /// `bottom + margin` of the lowest box it hits, since touching at the
    /// margin already counts as overlap.
    pub fn resolve_subsection_overlaps(&self, boxes: &[(String, Rect)]) -> Vec<(String, Rect)> {
        let margin = self.margin();
        let mut resolved: Vec<(String, Rect)> = Vec::with_capacity(boxes.len());

        for (id, rect) in boxes {
            let mut current = *rect;
            let mut steps = 0;
            while let Some(bottom) = resolved
                .iter()
                .filter(|(_, other)| self.check_overlap(&current, other))
                .map(|(_, other)| other.bottom())
                .reduce(f64::max)
            {
                if steps == SUBSECTION_ITERATIONS {
                    warn!(subsection = %id, "subsection still overlaps after push-down");
                    break;
                }
                let target = bottom + margin + 1.0;
                current.y = if target > current.y { target } else { current.y + 1.0 };
                steps += 1;
            }
            resolved.push((id.clone(), current));
        }

        resolved
    }
}

struct Candidate<'a> {
    id: &'a str,
    x: f64,
    width: f64,
    height: f64,
}

impl Candidate<'_> {
    fn rect(&self, y: f64) -> Rect {
        Rect::new(self.x, y, self.width, self.height)
    }
}
