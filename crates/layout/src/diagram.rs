//! Whole-diagram layout: validation, column placement, crossing reduction,
//! subsection frames, connector routing and the legend.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::LayoutConfig;
use crate::error::LayoutError;
use crate::graph::{Graph, Node, NodeKind};
use crate::grid::{Pathfinder, simplify_path};
use crate::layout::LayoutEngine;
use crate::legend::{Legend, build_legend};
use crate::types::*;
use crate::validate::validate;

pub const DEFAULT_SECTION_TITLE: &str = "EconomyFlowChart Section";

/// Role of an attribute row beneath an action node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeTag {
    Source,
    Sink,
    Value,
}

impl AttributeTag {
    /// Text prefix shown before the attribute name.
    pub fn prefix(&self) -> &'static str {
        match self {
            AttributeTag::Source => "+ ",
            AttributeTag::Sink => "- ",
            AttributeTag::Value => "",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeTag::Source => "source",
            AttributeTag::Sink => "sink",
            AttributeTag::Value => "value",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeRow {
    pub tag: AttributeTag,
    pub name: String,
    pub rect: Rect,
}

impl AttributeRow {
    pub fn text(&self) -> String {
        format!("{}{}", self.tag.prefix(), self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedNode {
    pub id: String,
    pub label: String,
    pub kind: NodeKind,
    pub column: usize,
    /// Main box plus attribute rows.
    pub rect: Rect,
    pub box_rect: Rect,
    /// Height of the header strip on top of `box_rect`, 0 unless a final good.
    pub header_height: f64,
    pub attributes: Vec<AttributeRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoutedEdge {
    pub from: String,
    pub to: String,
    pub points: Vec<Point>,
    pub orientation: Orientation,
    /// False when the connector still crosses an unrelated node.
    pub clear: bool,
    /// Connectors into final goods are drawn dashed.
    pub dashed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubsectionBox {
    pub id: String,
    pub label: String,
    pub color: Option<String>,
    pub rect: Rect,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagram {
    pub title: String,
    pub nodes: Vec<PlacedNode>,
    pub edges: Vec<RoutedEdge>,
    pub subsections: Vec<SubsectionBox>,
    /// Frame of the main section.
    pub bounds: Rect,
    pub legend: Option<Legend>,
    /// Nodes whose placement only reached a best-effort position.
    pub degraded: Vec<String>,
}

impl Diagram {
    pub fn node(&self, id: &str) -> Option<&PlacedNode> {
        self.nodes.iter().find(|node| node.id == id)
    }
}

/// Lay out a graph end to end.
pub fn layout_graph(graph: &Graph, config: &LayoutConfig) -> Result<Diagram, LayoutError> {
    validate(graph)?;

    let mut engine = LayoutEngine::new(config.clone());
    engine.calculate_node_heights(graph.all_nodes());
    let columns = engine.calculate_columns(graph);

    let degraded = place_columns(&mut engine, &columns);

    if config.optimize {
        let swaps = engine.optimize_layout(&graph.edges, config.padding.y);
        debug!(swaps, "crossing reduction finished");
    }

    let subsections = frame_subsections(&mut engine, graph);

    let pathfinder = Pathfinder::default();
    let edges = graph
        .edges
        .iter()
        .filter_map(|edge| {
            let route = engine.collision_engine().route_edge(edge.from_id(), edge.to_id(), engine.context())?;
            let mut points = route.waypoints();
            let mut clear = route.clear;
            if !clear {
                if let Some(detour) = detour(&pathfinder, &engine, edge.from_id(), edge.to_id(), &points) {
                    points = detour;
                    clear = true;
                }
            }
            Some(RoutedEdge {
                from: edge.from_id().to_string(),
                to: edge.to_id().to_string(),
                points,
                orientation: route.orientation,
                clear,
                dashed: engine.node_kind(edge.to_id()) == Some(NodeKind::FinalGood),
            })
        })
        .collect::<Vec<_>>();

    let nodes: Vec<PlacedNode> = graph
        .all_nodes()
        .filter_map(|node| place_node(&engine, node))
        .collect();

    let bounds = Rect::bounding(nodes.iter().map(|node| &node.rect))
        .map(|rect| rect.expand(sanitize(config.section_padding)))
        .unwrap_or(Rect::ZERO);

    let legend = if config.legend {
        build_legend(graph, config, &bounds)
    } else {
        None
    };

    let title = graph
        .name
        .as_ref()
        .map(|name| format!("{name} Economy"))
        .unwrap_or_else(|| DEFAULT_SECTION_TITLE.to_string());

    info!(
        nodes = nodes.len(),
        edges = edges.len(),
        subsections = subsections.len(),
        degraded = degraded.len(),
        "diagram laid out"
    );

    Ok(Diagram {
        title,
        nodes,
        edges,
        subsections,
        bounds,
        legend,
        degraded,
    })
}

/// Place every column top to bottom, ordering each column by the mean Y of
/// its already placed parents. Returns the ids of degraded placements.
fn place_columns(engine: &mut LayoutEngine, columns: &[Vec<String>]) -> Vec<String> {
    let origin_y = engine.config().origin.y;
    let mut degraded = Vec::new();

    for (column, ids) in columns.iter().enumerate() {
        let mut targets: Vec<(&String, f64)> = ids
            .iter()
            .map(|id| {
                let parent_ys: Vec<f64> = engine
                    .parents_of(id)
                    .iter()
                    .filter_map(|parent| engine.node_position(parent))
                    .map(|rect| rect.y)
                    .collect();
                let target = if parent_ys.is_empty() {
                    origin_y
                } else {
                    parent_ys.iter().sum::<f64>() / parent_ys.len() as f64
                };
                (id, target)
            })
            .collect();
        targets.sort_by(|a, b| a.1.total_cmp(&b.1));

        let mut previous: Option<Rect> = None;
        for (id, target) in targets {
            let placement = engine.find_placement(id, column, target, engine.parents_of(id), previous.as_ref());
            if placement.degraded {
                degraded.push(id.clone());
            }
            let rect = Rect::new(
                engine.column_x(column),
                placement.y,
                engine.node_width(id),
                engine.node_height(id),
            );
            engine.record_node_position(id, rect);
            previous = Some(rect);
        }
    }

    degraded
}

/// Frame each subsection, stacking frames that overlap. Members move with
/// their frame only when that cannot collide with any other node.
fn frame_subsections(engine: &mut LayoutEngine, graph: &Graph) -> Vec<SubsectionBox> {
    let mut framed: Vec<(usize, Vec<String>, Rect)> = Vec::new();
    for (index, subsection) in graph.subsections.iter().enumerate() {
        let mut seen = HashSet::new();
        let members: Vec<String> = subsection
            .node_ids
            .iter()
            .filter(|id| engine.node_position(id).is_some() && seen.insert(id.as_str()))
            .cloned()
            .collect();
        if members.is_empty() {
            continue;
        }
        let rect = engine.calculate_subsection_bounds(&members);
        framed.push((index, members, rect));
    }

    let boxes: Vec<(String, Rect)> = framed
        .iter()
        .map(|(index, _, rect)| (graph.subsections[*index].id.clone(), *rect))
        .collect();
    let resolved = engine.collision_engine().resolve_subsection_overlaps(&boxes);

    let mut membership_count: HashMap<&str, usize> = HashMap::new();
    for (_, members, _) in &framed {
        for member in members {
            *membership_count.entry(member.as_str()).or_default() += 1;
        }
    }

    let mut result = Vec::with_capacity(framed.len());
    for ((index, members, original), (_, moved)) in framed.iter().zip(resolved) {
        let subsection = &graph.subsections[*index];
        let dy = moved.y - original.y;
        let mut rect = *original;

        if dy != 0.0 {
            let shared = members.iter().any(|id| membership_count[id.as_str()] > 1);
            if !shared && shift_members(engine, members, dy) {
                rect = moved;
            } else {
                warn!(subsection = %subsection.id, dy, "kept overlapping subsection frame in place");
            }
        }

        result.push(SubsectionBox {
            id: subsection.id.clone(),
            label: subsection.label.clone(),
            color: subsection.color.clone(),
            rect,
            members: members.clone(),
        });
    }
    result
}

/// Move `members` down by `dy` if none of them would then overlap a node
/// outside the group.
fn shift_members(engine: &mut LayoutEngine, members: &[String], dy: f64) -> bool {
    let moved: Vec<(&String, Rect)> = members
        .iter()
        .filter_map(|id| engine.node_position(id).map(|rect| (id, rect.translate(0.0, dy))))
        .collect();

    let collision = engine.collision_engine();
    let blocked = engine
        .context()
        .node_positions
        .iter()
        .filter(|(id, _)| !members.contains(id))
        .any(|(_, other)| moved.iter().any(|(_, rect)| collision.check_overlap(rect, other)));
    if blocked {
        return false;
    }

    for (id, rect) in moved {
        engine.record_node_position(id, rect);
    }
    true
}

/// Grid route around every other node for a connector whose elbows are
/// blocked. The grid path is joined to the exact endpoints orthogonally.
fn detour(
    pathfinder: &Pathfinder,
    engine: &LayoutEngine,
    from: &str,
    to: &str,
    elbow: &[Point],
) -> Option<Vec<Point>> {
    let (&start, &end) = (elbow.first()?, elbow.last()?);
    let obstacles: Vec<Rect> = engine
        .context()
        .node_positions
        .iter()
        .filter(|(id, _)| id.as_str() != from && id.as_str() != to)
        .map(|(_, rect)| *rect)
        .collect();

    let grid = pathfinder.find_path(start, end, &obstacles)?;
    let (&first, &last) = (grid.first()?, grid.last()?);

    let mut points = vec![start, Point::new(first.x, start.y)];
    points.extend(grid);
    points.push(Point::new(last.x, end.y));
    points.push(end);
    debug!(from, to, waypoints = points.len(), "connector detoured on the grid");
    Some(simplify_path(&points))
}

fn place_node(engine: &LayoutEngine, node: Node<'_>) -> Option<PlacedNode> {
    let rect = *engine.node_position(node.id())?;
    let config = engine.config();
    let kind = node.kind();
    let box_height = match kind {
        NodeKind::InitialSink => config.input_box.height,
        NodeKind::Action | NodeKind::FinalGood => config.node_box.height,
    };
    let box_rect = Rect::new(rect.x, rect.y, rect.width, sanitize(box_height));
    let header_height = match kind {
        NodeKind::FinalGood => config.final_good_header().min(box_rect.height),
        NodeKind::InitialSink | NodeKind::Action => 0.0,
    };

    let mut attributes = Vec::new();
    if let Node::Act(act) = node {
        if node.attribute_rows() > 0 {
            let tagged = act
                .sources
                .iter()
                .map(|name| (AttributeTag::Source, name))
                .chain(act.sinks.iter().map(|name| (AttributeTag::Sink, name)))
                .chain(act.values.iter().map(|name| (AttributeTag::Value, name)));
            let step = config.attribute_box.height + config.attribute_gap;
            for (row, (tag, name)) in tagged.enumerate() {
                attributes.push(AttributeRow {
                    tag,
                    name: name.clone(),
                    rect: Rect::new(
                        rect.x,
                        box_rect.bottom() + config.attribute_gap + row as f64 * step,
                        config.attribute_box.width,
                        config.attribute_box.height,
                    ),
                });
            }
        }
    }

    Some(PlacedNode {
        id: node.id().to_string(),
        label: node.label().to_string(),
        kind,
        column: engine.node_column(node.id()).unwrap_or(0),
        rect,
        box_rect,
        header_height,
        attributes,
    })
}
