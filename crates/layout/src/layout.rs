use std::collections::HashMap;

use tracing::debug;

use crate::collision::*;
use crate::columns::assign_columns;
use crate::config::LayoutConfig;
use crate::graph::{Edge, Graph, Node, NodeKind};
use crate::types::*;

/// Sweeps of the crossing-reduction pass.
pub const OPTIMIZE_SWEEPS: usize = 10;

/// Subsection padding when the group holds input nodes, leaving room for
/// the section title above them.
pub const INPUT_SUBSECTION_PADDING: SectionPadding = SectionPadding {
    top: 80.0,
    right: 60.0,
    bottom: 60.0,
    left: 70.0,
};
pub const SUBSECTION_PADDING: SectionPadding = SectionPadding::uniform(40.0);

/// Per-run layout state: node sizes, columns, parents and the position
/// table shared with the collision engine.
#[derive(Debug, Clone)]
pub struct LayoutEngine {
    config: LayoutConfig,
    collision: CollisionEngine,
    context: CollisionContext,
    node_heights: HashMap<String, f64>,
    node_kinds: HashMap<String, NodeKind>,
    node_columns: HashMap<String, usize>,
    parents: HashMap<String, Vec<String>>,
    subsection_of: HashMap<String, usize>,
}

impl Default for LayoutEngine {
    fn default() -> Self {
        Self::new(LayoutConfig::default())
    }
}

impl LayoutEngine {
    pub fn new(config: LayoutConfig) -> Self {
        Self {
            collision: CollisionEngine::new(config.collision),
            context: CollisionContext::new(config.padding),
            config,
            node_heights: HashMap::new(),
            node_kinds: HashMap::new(),
            node_columns: HashMap::new(),
            parents: HashMap::new(),
            subsection_of: HashMap::new(),
        }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn collision_engine(&self) -> &CollisionEngine {
        &self.collision
    }

    pub fn context(&self) -> &CollisionContext {
        &self.context
    }

    /// Record total rendered height and kind of every node.
    pub fn calculate_node_heights<'a>(&mut self, nodes: impl IntoIterator<Item = Node<'a>>) {
        for node in nodes {
            let kind = node.kind();
            let base = match kind {
                NodeKind::InitialSink => self.config.input_box.height,
                NodeKind::Action | NodeKind::FinalGood => self.config.node_box.height,
            };
            let rows = node.attribute_rows() as f64;
            let attributes = if rows > 0.0 {
                let gap = self.config.attribute_gap;
                rows * (self.config.attribute_box.height + gap) + gap
            } else {
                0.0
            };

            self.node_heights
                .insert(node.id().to_string(), sanitize(base) + attributes);
            self.node_kinds.insert(node.id().to_string(), kind);
            if kind == NodeKind::FinalGood {
                self.context.final_goods.insert(node.id().to_string());
            }
        }
    }

    /// Assign columns and remember parents and subsection membership.
    pub fn calculate_columns(&mut self, graph: &Graph) -> Vec<Vec<String>> {
        let plan = assign_columns(graph);
        self.node_columns = plan.node_columns;
        self.parents = plan.parents;
        self.context.edges = graph.edges.clone();

        self.subsection_of.clear();
        for (index, subsection) in graph.subsections.iter().enumerate() {
            for member in &subsection.node_ids {
                self.subsection_of.entry(member.clone()).or_insert(index);
            }
        }

        plan.columns
    }

    pub fn column_x(&self, column: usize) -> f64 {
        self.config.origin.x + column as f64 * (self.config.node_box.width + self.config.padding.x)
    }

    pub fn node_width(&self, id: &str) -> f64 {
        match self.node_kinds.get(id) {
            Some(NodeKind::InitialSink) => self.config.input_box.width,
            _ => self.config.node_box.width,
        }
    }

    pub fn node_height(&self, id: &str) -> f64 {
        self.node_heights.get(id).copied().unwrap_or(0.0)
    }

    pub fn node_kind(&self, id: &str) -> Option<NodeKind> {
        self.node_kinds.get(id).copied()
    }

    pub fn node_column(&self, id: &str) -> Option<usize> {
        self.node_columns.get(id).copied()
    }

    pub fn node_position(&self, id: &str) -> Option<&Rect> {
        self.context.position(id)
    }

    pub fn parents_of(&self, id: &str) -> &[String] {
        self.parents.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn record_node_position(&mut self, id: &str, rect: Rect) {
        self.context.record(id, rect);
    }

    pub fn find_conflict_free_y(
        &self,
        id: &str,
        column: usize,
        y_initial: f64,
        parent_ids: &[String],
        prev_in_column: Option<&Rect>,
    ) -> f64 {
        self.find_placement(id, column, y_initial, parent_ids, prev_in_column)
            .y
    }

    /// Placement of `id` in `column`, never above the previous node of the
    /// same column.
    pub fn find_placement(
        &self,
        id: &str,
        column: usize,
        y_initial: f64,
        parent_ids: &[String],
        prev_in_column: Option<&Rect>,
    ) -> Placement {
        let mut start = if y_initial.is_finite() { y_initial } else { 0.0 };
        if let Some(prev) = prev_in_column {
            start = start.max(prev.bottom() + sanitize(self.config.padding.y) + self.collision.margin());
        }

        self.collision.find_conflict_free_placement(
            id,
            self.column_x(column),
            start,
            self.node_width(id),
            self.node_height(id),
            &self.context,
            parent_ids,
        )
    }

    pub fn node_connection_point(&self, id: &str, side: ConnectionSide) -> Option<Point> {
        let rect = self.context.position(id)?;
        Some(self.collision.node_connection_point(id, rect, side, &self.context))
    }

    /// Frame around the recorded members of a subsection.
    pub fn calculate_subsection_bounds(&self, node_ids: &[String]) -> Rect {
        let rects: Vec<Rect> = node_ids
            .iter()
            .filter_map(|id| self.context.position(id).copied())
            .collect();
        let has_inputs = node_ids
            .iter()
            .any(|id| self.node_kind(id) == Some(NodeKind::InitialSink));
        let padding = if has_inputs {
            INPUT_SUBSECTION_PADDING
        } else {
            SUBSECTION_PADDING
        };
        self.collision.calculate_subsection_bounds(&rects, padding)
    }

    /// Reduce connector crossings by swapping vertically adjacent nodes of
    /// the same column and subsection. Returns the number of swaps kept.
    pub fn optimize_layout(&mut self, edges: &[Edge], padding_y: f64) -> usize {
        let padding_y = sanitize(padding_y);
        let mut crossings = self.count_crossings(edges);
        let mut kept = 0;

        let mut by_column: HashMap<usize, Vec<String>> = HashMap::new();
        for (id, column) in &self.node_columns {
            if self.context.position(id).is_some() {
                by_column.entry(*column).or_default().push(id.clone());
            }
        }
        let mut columns: Vec<(usize, Vec<String>)> = by_column.into_iter().collect();
        columns.sort_by_key(|(column, _)| *column);

        for sweep in 0..OPTIMIZE_SWEEPS {
            if crossings == 0 {
                break;
            }
            let mut improved = false;

            for (_, ids) in columns.iter_mut() {
                ids.sort_by(|a, b| {
                    let ya = self.context.position(a).map_or(0.0, |r| r.y);
                    let yb = self.context.position(b).map_or(0.0, |r| r.y);
                    ya.total_cmp(&yb).then_with(|| a.cmp(b))
                });

                for i in 0..ids.len().saturating_sub(1) {
                    let (upper, lower) = (ids[i].clone(), ids[i + 1].clone());
                    if self.subsection_of.get(&upper) != self.subsection_of.get(&lower) {
                        continue;
                    }
                    let (Some(&a), Some(&b)) = (self.context.position(&upper), self.context.position(&lower))
                    else {
                        continue;
                    };

                    let gap = (b.y - a.bottom()).max(padding_y);
                    let raised = b.with_y(a.y);
                    let lowered = a.with_y(a.y + b.height + gap);
                    if lowered.bottom() > b.bottom() {
                        continue;
                    }

                    self.context.record(upper.as_str(), lowered);
                    self.context.record(lower.as_str(), raised);
                    let after = self.count_crossings(edges);
                    if after < crossings {
                        debug!(sweep, upper = %upper, lower = %lower, crossings = after, "kept swap");
                        crossings = after;
                        kept += 1;
                        improved = true;
                        ids.swap(i, i + 1);
                    } else {
                        self.context.record(upper.as_str(), a);
                        self.context.record(lower.as_str(), b);
                    }
                }
            }

            if !improved {
                break;
            }
        }

        kept
    }

    /// Pairs of edges whose vertical order flips between their ends.
    pub fn count_crossings(&self, edges: &[Edge]) -> usize {
        let spans: Vec<(&Edge, usize, f64, usize, f64)> = edges
            .iter()
            .filter_map(|edge| {
                let from_col = self.node_column(edge.from_id())?;
                let to_col = self.node_column(edge.to_id())?;
                let from = self.context.position(edge.from_id())?;
                let to = self.context.position(edge.to_id())?;
                Some((edge, from_col, from.center().y, to_col, to.center().y))
            })
            .collect();

        let mut count = 0;
        for (i, first) in spans.iter().enumerate() {
            for second in &spans[i + 1..] {
                let (e1, s1, y1s, t1, y1e) = *first;
                let (e2, s2, y2s, t2, y2e) = *second;
                let shares_node = e1.from_id() == e2.from_id()
                    || e1.from_id() == e2.to_id()
                    || e1.to_id() == e2.from_id()
                    || e1.to_id() == e2.to_id();
                if shares_node || s1.max(s2) >= t1.min(t2) {
                    continue;
                }
                if (y1s - y2s) * (y1e - y2e) < 0.0 {
                    count += 1;
                }
            }
        }
        count
    }
}
