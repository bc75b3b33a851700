//! Reading a drawn [`Scene`] back into a [`Graph`].

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::diagram::{AttributeTag, DEFAULT_SECTION_TITLE};
use crate::error::SyncError;
use crate::geometry::point_in_rectangle;
use crate::graph::{Act, Edge, Graph, Input, InputKind, NodeKind, Subsection};
use crate::scene::Scene;
use crate::surface::{BoxSpec, BoxTag, SectionRole};
use crate::types::*;

/// Horizontal slack when matching an attribute row to the box above it.
const PARENT_X_TOLERANCE: f64 = 5.0;
const COLOR_TOLERANCE: i32 = 5;

/// Classify an attribute row that carries no explicit tag, first by its
/// `+`/`-` text prefix, then by its fill colour.
pub fn legacy_attribute_guess(text: &str, fill: &str) -> Option<AttributeTag> {
    match text.trim_start().chars().next() {
        Some('+') => return Some(AttributeTag::Source),
        Some('-') => return Some(AttributeTag::Sink),
        _ => {}
    }

    let (r, g, _) = parse_hex(fill)?;
    let near = |value: u8, center: i32| (i32::from(value) - center).abs() <= COLOR_TOLERANCE;
    if near(r, 75) && near(g, 175) {
        Some(AttributeTag::Source)
    } else if near(r, 218) && near(g, 84) {
        Some(AttributeTag::Sink)
    } else if near(r, 236) && near(g, 159) {
        Some(AttributeTag::Value)
    } else {
        None
    }
}

fn parse_hex(color: &str) -> Option<(u8, u8, u8)> {
    let hex = color.strip_prefix('#')?;
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}

/// Attribute name without its `+`/`-` prefix.
fn attribute_name(text: &str) -> String {
    let trimmed = text.trim();
    trimmed
        .strip_prefix(['+', '-'])
        .map(str::trim_start)
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}

struct NodeBox<'a> {
    id: &'a str,
    kind: NodeKind,
    spec: &'a BoxSpec,
}

/// Node box directly above `row`: same column within tolerance, starting
/// higher, and with the smallest non-negative gap to the row.
fn attribute_parent<'a>(row: &Rect, nodes: &'a [NodeBox<'a>]) -> Option<&'a NodeBox<'a>> {
    nodes
        .iter()
        .filter(|node| (node.spec.rect.x - row.x).abs() < PARENT_X_TOLERANCE && row.y > node.spec.rect.y)
        .map(|node| (node, row.y - node.spec.rect.bottom()))
        .filter(|(_, gap)| *gap >= 0.0)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(node, _)| node)
}

/// Rebuild a graph from the tagged primitives of a scene.
pub fn reconstruct(scene: &Scene) -> Result<Graph, SyncError> {
    let nodes: Vec<NodeBox<'_>> = scene
        .boxes()
        .filter_map(|(_, spec)| match &spec.tag {
            BoxTag::Node { id, kind } => Some(NodeBox {
                id: id.as_str(),
                kind: *kind,
                spec,
            }),
            _ => None,
        })
        .collect();
    if nodes.is_empty() {
        return Err(SyncError::NothingToReconstruct);
    }

    // Phase 1: attribute rows, ordered top to bottom within each parent
    let mut rows: Vec<(&str, f64, AttributeTag, String)> = Vec::new();
    for (_, spec) in scene.boxes() {
        let tag = match &spec.tag {
            BoxTag::Attribute(Some(tag)) => Some(*tag),
            BoxTag::Attribute(None) | BoxTag::Plain => legacy_attribute_guess(&spec.text, &spec.fill),
            _ => continue,
        };
        let Some(tag) = tag else {
            debug!(text = %spec.text, "skipping unclassified box");
            continue;
        };
        let Some(parent) = attribute_parent(&spec.rect, &nodes) else {
            debug!(text = %spec.text, "attribute row has no parent box");
            continue;
        };
        rows.push((parent.id, spec.rect.y, tag, attribute_name(&spec.text)));
    }
    rows.sort_by(|a, b| a.1.total_cmp(&b.1));

    let mut attributes: HashMap<&str, Vec<(AttributeTag, String)>> = HashMap::new();
    for (parent, _, tag, name) in rows {
        attributes.entry(parent).or_default().push((tag, name));
    }

    // Phase 2: nodes
    let mut graph = Graph::default();
    for node in &nodes {
        let label = node.spec.text.clone();
        match node.kind {
            NodeKind::InitialSink => graph.inputs.push(Input {
                id: node.id.to_string(),
                label,
                kind: InputKind::InitialSink,
            }),
            NodeKind::Action | NodeKind::FinalGood => {
                let mut act = if node.kind == NodeKind::FinalGood {
                    Act::final_good(node.id, label)
                } else {
                    Act::new(node.id, label)
                };
                for (tag, name) in attributes.remove(node.id).unwrap_or_default() {
                    match tag {
                        AttributeTag::Source => act.sources.push(name),
                        AttributeTag::Sink => act.sinks.push(name),
                        AttributeTag::Value => act.values.push(name),
                    }
                }
                graph.nodes.push(act);
            }
        }
    }

    // Phase 3: edges between node boxes, first occurrence wins
    let ids_by_handle: HashMap<usize, &str> = scene
        .boxes()
        .filter_map(|(handle, spec)| match &spec.tag {
            BoxTag::Node { id, .. } => Some((handle, id.as_str())),
            _ => None,
        })
        .collect();
    let mut seen = HashSet::new();
    for (_, connector) in scene.connectors() {
        let (Some(from), Some(to)) = (ids_by_handle.get(&connector.from), ids_by_handle.get(&connector.to)) else {
            continue;
        };
        if seen.insert((*from, *to)) {
            graph.edges.push(Edge::new(*from, *to));
        }
    }

    // Phase 4: subsections and the diagram title
    for (_, section) in scene.sections() {
        match &section.role {
            SectionRole::Subsection { id } => {
                let node_ids = nodes
                    .iter()
                    .filter(|node| point_in_rectangle(&node.spec.rect.center(), &section.rect))
                    .map(|node| node.id.to_string())
                    .collect();
                graph.subsections.push(Subsection {
                    id: id.clone(),
                    label: section.title.clone(),
                    node_ids,
                    color: Some(section.fill.to_uppercase()),
                });
            }
            SectionRole::Main if section.title != DEFAULT_SECTION_TITLE => {
                let name = section.title.strip_suffix(" Economy").unwrap_or(&section.title);
                graph.name = Some(name.to_string());
            }
            SectionRole::Main | SectionRole::Legend => {}
        }
    }

    debug!(
        inputs = graph.inputs.len(),
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        "reconstructed graph"
    );
    Ok(graph)
}
