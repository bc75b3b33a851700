use std::collections::{HashMap, HashSet};

use petgraph::algo::toposort;
use petgraph::graph::DiGraph;

use crate::config::is_valid_color;
use crate::error::{ValidationError, ValidationIssue};
use crate::graph::Graph;

/// Check a graph before layout, collecting every issue instead of stopping
/// at the first.
pub fn validate(graph: &Graph) -> Result<(), ValidationError> {
    let mut issues = Vec::new();

    let mut ids: HashSet<&str> = HashSet::new();
    for node in graph.all_nodes() {
        if node.id().is_empty() {
            issues.push(ValidationIssue::EmptyId {
                label: node.label().to_string(),
            });
        } else if !ids.insert(node.id()) {
            issues.push(ValidationIssue::DuplicateId {
                id: node.id().to_string(),
            });
        }
    }

    let mut dag: DiGraph<&str, ()> = DiGraph::new();
    let indices: HashMap<&str, _> = ids.iter().map(|id| (*id, dag.add_node(*id))).collect();

    for edge in &graph.edges {
        let (from, to) = (edge.from_id(), edge.to_id());
        let mut dangling = false;
        for endpoint in [from, to] {
            if !ids.contains(endpoint) {
                dangling = true;
                issues.push(ValidationIssue::UnknownEdgeEndpoint {
                    from: from.to_string(),
                    to: to.to_string(),
                    missing: endpoint.to_string(),
                });
            }
        }
        if dangling {
            continue;
        }
        if from == to {
            issues.push(ValidationIssue::SelfLoop { id: from.to_string() });
            continue;
        }
        dag.add_edge(indices[from], indices[to], ());
    }

    if let Err(cycle) = toposort(&dag, None) {
        issues.push(ValidationIssue::Cycle {
            id: dag[cycle.node_id()].to_string(),
        });
    }

    let mut subsection_ids: HashSet<&str> = HashSet::new();
    for subsection in &graph.subsections {
        if !subsection_ids.insert(&subsection.id) {
            issues.push(ValidationIssue::DuplicateSubsection {
                id: subsection.id.clone(),
            });
        }
        for member in &subsection.node_ids {
            if !ids.contains(member.as_str()) {
                issues.push(ValidationIssue::UnknownSubsectionMember {
                    subsection: subsection.id.clone(),
                    node: member.clone(),
                });
            }
        }
        if let Some(color) = &subsection.color {
            if !is_valid_color(color) {
                issues.push(ValidationIssue::InvalidColor {
                    subsection: subsection.id.clone(),
                    color: color.clone(),
                });
            }
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { issues })
    }
}
