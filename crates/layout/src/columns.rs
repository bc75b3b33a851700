//! Column assignment: longest-path leveling of the dependency DAG, with
//! final goods pushed to the far right and declared subsections kept in
//! contiguous, ordered column bands.

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap, HashSet, VecDeque};

use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use tracing::debug;

use crate::graph::{Graph, NodeKind};

/// Columns in left-to-right order, plus the parents of every node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnPlan {
    pub columns: Vec<Vec<String>>,
    pub node_columns: HashMap<String, usize>,
    pub parents: HashMap<String, Vec<String>>,
}

struct Dag {
    ids: Vec<String>,
    kinds: Vec<NodeKind>,
    children: Vec<Vec<usize>>,
    edges: Vec<(usize, usize)>,
}

impl Dag {
    fn new(graph: &Graph) -> Self {
        let mut ids = Vec::new();
        let mut kinds = Vec::new();
        let mut index: HashMap<&str, usize> = HashMap::new();
        for node in graph.all_nodes() {
            if index.contains_key(node.id()) {
                continue;
            }
            index.insert(node.id(), ids.len());
            ids.push(node.id().to_string());
            kinds.push(node.kind());
        }

        let mut children = vec![Vec::new(); ids.len()];
        let mut seen = HashSet::new();
        let mut edges = Vec::new();
        for edge in &graph.edges {
            let (Some(&from), Some(&to)) = (index.get(edge.from_id()), index.get(edge.to_id())) else {
                continue;
            };
            if from == to || !seen.insert((from, to)) {
                continue;
            }
            children[from].push(to);
            edges.push((from, to));
        }

        Self {
            ids,
            kinds,
            children,
            edges,
        }
    }

    fn len(&self) -> usize {
        self.ids.len()
    }

    /// Kahn's algorithm in declaration order. Nodes on a cycle are left out.
    fn topological_order(&self) -> Vec<usize> {
        let mut in_degree = vec![0usize; self.len()];
        for &(_, to) in &self.edges {
            in_degree[to] += 1;
        }
        let mut queue: VecDeque<usize> = (0..self.len()).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(self.len());
        while let Some(u) = queue.pop_front() {
            order.push(u);
            for &v in &self.children[u] {
                in_degree[v] -= 1;
                if in_degree[v] == 0 {
                    queue.push_back(v);
                }
            }
        }
        order
    }
}

/// Assign every node of `graph` to a column.
pub fn assign_columns(graph: &Graph) -> ColumnPlan {
    let dag = Dag::new(graph);
    let order = dag.topological_order();

    // Phase 1: longest-path leveling
    let mut column = vec![0usize; dag.len()];
    for &u in &order {
        for &v in &dag.children[u] {
            column[v] = column[v].max(column[u] + 1);
        }
    }

    // Phase 2: final goods to the right of everything else
    let is_final = |i: usize| dag.kinds[i] == NodeKind::FinalGood;
    let rightmost = (0..dag.len())
        .filter(|&i| !is_final(i))
        .map(|i| column[i])
        .max()
        .unwrap_or(0);
    for i in (0..dag.len()).filter(|&i| is_final(i)) {
        column[i] = rightmost + 1;
    }

    // Phase 3: subsection bands
    if !graph.subsections.is_empty() {
        let membership = subsection_membership(graph, &dag);
        shift_subsections(graph, &dag, &membership, &mut column);

        let ungrouped_final: Vec<usize> = (0..dag.len())
            .filter(|&i| is_final(i) && membership[i].is_none())
            .collect();
        let rightmost = (0..dag.len())
            .filter(|i| !ungrouped_final.contains(i))
            .map(|i| column[i])
            .max();
        if let Some(rightmost) = rightmost {
            for &i in &ungrouped_final {
                column[i] = column[i].max(rightmost + 1);
            }
        }
    }

    // Phase 4: every edge points right
    for &u in &order {
        for &v in &dag.children[u] {
            if column[v] <= column[u] {
                column[v] = column[u] + 1;
            }
        }
    }

    // Phase 5: drop empty columns
    let used: BTreeSet<usize> = column.iter().copied().collect();
    let rank: HashMap<usize, usize> = used.iter().enumerate().map(|(r, &c)| (c, r)).collect();
    let mut columns = vec![Vec::new(); used.len()];
    let mut node_columns = HashMap::with_capacity(dag.len());
    for (i, id) in dag.ids.iter().enumerate() {
        let compact = rank[&column[i]];
        columns[compact].push(id.clone());
        node_columns.insert(id.clone(), compact);
    }

    let mut parents: HashMap<String, Vec<String>> =
        dag.ids.iter().map(|id| (id.clone(), Vec::new())).collect();
    for &(from, to) in &dag.edges {
        if let Some(list) = parents.get_mut(&dag.ids[to]) {
            list.push(dag.ids[from].clone());
        }
    }

    debug!(columns = columns.len(), nodes = dag.len(), "assigned columns");

    ColumnPlan {
        columns,
        node_columns,
        parents,
    }
}

/// First subsection listing each node, by subsection index.
fn subsection_membership(graph: &Graph, dag: &Dag) -> Vec<Option<usize>> {
    let index: HashMap<&str, usize> = dag
        .ids
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();
    let mut membership = vec![None; dag.len()];
    for (group, subsection) in graph.subsections.iter().enumerate() {
        for member in &subsection.node_ids {
            if let Some(&i) = index.get(member.as_str()) {
                membership[i].get_or_insert(group);
            }
        }
    }
    membership
}

fn shift_subsections(graph: &Graph, dag: &Dag, membership: &[Option<usize>], column: &mut [usize]) {
    // Column span of every non-empty group.
    let mut spans: HashMap<usize, (usize, usize)> = HashMap::new();
    for (i, group) in membership.iter().enumerate() {
        if let Some(group) = group {
            let span = spans.entry(*group).or_insert((column[i], column[i]));
            span.0 = span.0.min(column[i]);
            span.1 = span.1.max(column[i]);
        }
    }
    if spans.is_empty() {
        return;
    }

    let mut base: Vec<usize> = spans.keys().copied().collect();
    base.sort_by_key(|group| (spans[group].0, *group));

    let order = group_order(dag, membership, &base);

    let mut cursor = 0usize;
    for group in order {
        let (min, max) = spans[&group];
        let shift = cursor.saturating_sub(min);
        if shift > 0 {
            debug!(
                subsection = %graph.subsections[group].id,
                shift,
                "shifting subsection columns"
            );
            for (i, member) in membership.iter().enumerate() {
                if *member == Some(group) {
                    column[i] += shift;
                }
            }
        }
        cursor = max + shift + 2;
    }
}

/// Topological order of the group graph, ties broken by `base` rank.
/// Falls back to `base` when groups depend on each other cyclically.
fn group_order(dag: &Dag, membership: &[Option<usize>], base: &[usize]) -> Vec<usize> {
    let mut groups: DiGraph<usize, ()> = DiGraph::new();
    let nodes: HashMap<usize, NodeIndex> = base.iter().map(|&g| (g, groups.add_node(g))).collect();
    let rank: HashMap<usize, usize> = base.iter().enumerate().map(|(r, &g)| (g, r)).collect();

    let mut linked = HashSet::new();
    for &(from, to) in &dag.edges {
        if let (Some(a), Some(b)) = (membership[from], membership[to]) {
            if a != b && linked.insert((a, b)) {
                groups.add_edge(nodes[&a], nodes[&b], ());
            }
        }
    }

    if is_cyclic_directed(&groups) {
        debug!("subsection dependencies are cyclic, keeping declaration order");
        return base.to_vec();
    }

    let mut in_degree: HashMap<NodeIndex, usize> = groups
        .node_indices()
        .map(|n| (n, groups.neighbors_directed(n, Direction::Incoming).count()))
        .collect();
    let mut ready: BinaryHeap<Reverse<(usize, usize)>> = base
        .iter()
        .filter(|&&g| in_degree[&nodes[&g]] == 0)
        .map(|&g| Reverse((rank[&g], g)))
        .collect();

    let mut order = Vec::with_capacity(base.len());
    while let Some(Reverse((_, group))) = ready.pop() {
        order.push(group);
        for next in groups.neighbors_directed(nodes[&group], Direction::Outgoing) {
            if let Some(degree) = in_degree.get_mut(&next) {
                *degree -= 1;
                if *degree == 0 {
                    let g = groups[next];
                    ready.push(Reverse((rank[&g], g)));
                }
            }
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Act, Edge, Input, InputKind, Subsection};

    fn input(id: &str) -> Input {
        Input {
            id: id.into(),
            label: id.into(),
            kind: InputKind::InitialSink,
        }
    }

    fn subsection(id: &str, members: &[&str]) -> Subsection {
        Subsection {
            id: id.into(),
            label: id.into(),
            node_ids: members.iter().map(|m| m.to_string()).collect(),
            color: None,
        }
    }

    #[test]
    fn simple_chain_levels() {
        let graph = Graph {
            inputs: vec![input("time")],
            nodes: vec![Act::new("play", "Play"), Act::final_good("win", "Win")],
            edges: vec![Edge::new("time", "play"), Edge::new("play", "win")],
            ..Default::default()
        };
        let plan = assign_columns(&graph);
        assert_eq!(plan.node_columns["time"], 0);
        assert_eq!(plan.node_columns["play"], 1);
        assert_eq!(plan.node_columns["win"], 2);
        assert_eq!(plan.parents["win"], vec!["play".to_string()]);
    }

    #[test]
    fn longest_path_wins() {
        let graph = Graph {
            nodes: vec![Act::new("a", "A"), Act::new("b", "B"), Act::new("c", "C")],
            edges: vec![Edge::new("a", "b"), Edge::new("b", "c"), Edge::new("a", "c")],
            ..Default::default()
        };
        let plan = assign_columns(&graph);
        assert_eq!(plan.columns, vec![vec!["a"], vec!["b"], vec!["c"]]);
    }

    #[test]
    fn final_goods_are_rightmost() {
        let graph = Graph {
            nodes: vec![
                Act::new("a", "A"),
                Act::final_good("early", "Early"),
                Act::new("b", "B"),
                Act::new("c", "C"),
            ],
            edges: vec![Edge::new("a", "early"), Edge::new("a", "b"), Edge::new("b", "c")],
            ..Default::default()
        };
        let plan = assign_columns(&graph);
        assert_eq!(plan.node_columns["early"], 3);
        assert_eq!(plan.columns.last().unwrap(), &vec!["early".to_string()]);
    }

    #[test]
    fn unknown_edges_are_ignored_and_isolated_nodes_start_left() {
        let graph = Graph {
            nodes: vec![Act::new("a", "A"), Act::new("lonely", "Lonely")],
            edges: vec![Edge::new("a", "ghost")],
            ..Default::default()
        };
        let plan = assign_columns(&graph);
        assert_eq!(plan.columns, vec![vec!["a", "lonely"]]);
    }

    #[test]
    fn subsections_get_separate_bands() {
        // Two independent groups that would share columns 0..1.
        let graph = Graph {
            nodes: vec![
                Act::new("a1", "A1"),
                Act::new("a2", "A2"),
                Act::new("b1", "B1"),
                Act::new("b2", "B2"),
            ],
            edges: vec![Edge::new("a1", "a2"), Edge::new("b1", "b2")],
            subsections: vec![subsection("a", &["a1", "a2"]), subsection("b", &["b1", "b2"])],
            ..Default::default()
        };
        let plan = assign_columns(&graph);
        let col = |id: &str| plan.node_columns[id];
        assert_eq!((col("a1"), col("a2")), (0, 1));
        assert!(col("b1") > col("a2"));
        assert_eq!(col("b2"), col("b1") + 1);
    }

    #[test]
    fn dependent_subsection_is_placed_after_its_source() {
        // "late" is declared first but consumes from "early".
        let graph = Graph {
            nodes: vec![
                Act::new("x", "X"),
                Act::new("y", "Y"),
                Act::new("p", "P"),
                Act::new("q", "Q"),
            ],
            edges: vec![Edge::new("p", "q"), Edge::new("q", "y"), Edge::new("x", "y")],
            subsections: vec![subsection("late", &["x", "y"]), subsection("early", &["p", "q"])],
            ..Default::default()
        };
        let plan = assign_columns(&graph);
        let col = |id: &str| plan.node_columns[id];
        assert!(col("x") > col("q"));
        assert!(col("y") > col("x"));
        assert!(col("q") > col("p"));
    }

    #[test]
    fn columns_are_monotonic_after_shifting() {
        let graph = Graph {
            inputs: vec![input("in")],
            nodes: vec![
                Act::new("a", "A"),
                Act::new("b", "B"),
                Act::new("free", "Free"),
                Act::final_good("goal", "Goal"),
            ],
            edges: vec![
                Edge::new("in", "a"),
                Edge::new("in", "b"),
                Edge::new("a", "free"),
                Edge::new("b", "goal"),
                Edge::new("free", "goal"),
            ],
            subsections: vec![subsection("first", &["in", "a"]), subsection("second", &["b"])],
            ..Default::default()
        };
        let plan = assign_columns(&graph);
        for edge in &graph.edges {
            assert!(plan.node_columns[edge.from_id()] < plan.node_columns[edge.to_id()]);
        }
        let last = plan.columns.len() - 1;
        assert_eq!(plan.node_columns["goal"], last);
        assert!(plan.columns.iter().all(|column| !column.is_empty()));
    }

    #[test]
    fn cyclic_group_dependencies_keep_base_order() {
        let graph = Graph {
            nodes: vec![
                Act::new("a1", "A1"),
                Act::new("b1", "B1"),
                Act::new("a2", "A2"),
                Act::new("b2", "B2"),
            ],
            edges: vec![Edge::new("a1", "b1"), Edge::new("b1", "a2"), Edge::new("a2", "b2")],
            subsections: vec![subsection("a", &["a1", "a2"]), subsection("b", &["b1", "b2"])],
            ..Default::default()
        };
        let plan = assign_columns(&graph);
        for edge in &graph.edges {
            assert!(plan.node_columns[edge.from_id()] < plan.node_columns[edge.to_id()]);
        }
    }
}
