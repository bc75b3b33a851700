use std::collections::{BTreeSet, HashSet};

use econflow_layout::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_test::traced_test;

fn input(id: &str, label: &str) -> Input {
    Input {
        id: id.to_string(),
        label: label.to_string(),
        kind: InputKind::InitialSink,
    }
}

fn economy() -> Graph {
    let mut grind = Act::new("grind", "Grind Dungeons");
    grind.sources = vec!["Gold".into(), "XP".into()];
    grind.sinks = vec!["Energy".into()];
    let mut shop = Act::new("shop", "Visit Shop");
    shop.sinks = vec!["Gold".into()];
    shop.values = vec!["Sword".into()];
    let mut craft = Act::new("craft", "Craft Gear");
    craft.sinks = vec!["Ore".into(), "Gold".into()];
    craft.values = vec!["Armor".into()];
    let mut level = Act::new("level", "Level Up");
    level.sinks = vec!["XP".into()];

    Graph {
        name: Some("RPG".into()),
        inputs: vec![input("time", "Time"), input("money", "Money")],
        nodes: vec![
            grind,
            shop,
            craft,
            level,
            Act::new("mine", "Mine Ore"),
            Act::final_good("boss", "Defeat Boss"),
        ],
        edges: vec![
            Edge::new("time", "grind"),
            Edge::new("time", "mine"),
            Edge::new("money", "shop"),
            Edge::new("grind", "shop"),
            Edge::new("grind", "level"),
            Edge::new("mine", "craft"),
            Edge::new("shop", "craft"),
            Edge::new("craft", "boss"),
            Edge::new("level", "boss"),
        ],
        subsections: vec![Subsection {
            id: "gear".into(),
            label: "Gear Loop".into(),
            node_ids: vec!["shop".into(), "craft".into()],
            color: Some("#3366CC".into()),
        }],
    }
}

fn assert_no_overlaps(diagram: &Diagram) {
    for (i, a) in diagram.nodes.iter().enumerate() {
        for b in &diagram.nodes[i + 1..] {
            assert!(
                !rectangles_overlap(&a.rect, &b.rect, 0.0).collides,
                "{} {:?} overlaps {} {:?}",
                a.id,
                a.rect,
                b.id,
                b.rect
            );
        }
    }
}

fn assert_edges_point_right(diagram: &Diagram, graph: &Graph) {
    for edge in &graph.edges {
        let from = diagram.node(edge.from_id()).unwrap();
        let to = diagram.node(edge.to_id()).unwrap();
        assert!(from.column < to.column, "{} -> {} does not point right", from.id, to.id);
    }
}

#[test]
fn test_push_down_below_existing_node() {
    let engine = CollisionEngine::new(CollisionConfig::default());
    let mut context = CollisionContext::new(Padding { x: 100.0, y: 21.0 });
    context.record("existing", Rect::new(0.0, 50.0, 144.0, 72.0));

    let y = engine.find_conflict_free_y("candidate", 0.0, 60.0, 144.0, 72.0, &context, &[]);
    assert_eq!(y, 157.0);
}

#[test]
fn test_connector_clears_blocker() {
    let engine = CollisionEngine::new(CollisionConfig {
        margin: 10.0,
        ..Default::default()
    });
    let mut context = CollisionContext::new(Padding::default());
    let parent = Rect::new(0.0, 0.0, 144.0, 90.0);
    let blocker = Rect::new(200.0, 20.0, 144.0, 90.0);
    context.record("parent", parent);
    context.record("blocker", blocker);

    let placement =
        engine.find_conflict_free_placement("child", 400.0, 0.0, 144.0, 90.0, &context, &["parent".to_string()]);
    assert!(placement.y.is_finite());
    assert!(placement.y >= 0.0);

    context.record("child", Rect::new(400.0, placement.y, 144.0, 90.0));
    let route = engine.route_edge("parent", "child", &context).unwrap();
    assert!(route.clear);
    for segment in &route.segments {
        assert!(!line_intersects_rectangle(segment, &blocker, 10.0).collides);
    }
}

#[test]
fn test_column_leveling() {
    let mut engine = LayoutEngine::default();
    let graph = Graph {
        inputs: vec![input("time", "Time")],
        nodes: vec![Act::new("play", "Play"), Act::final_good("win", "Win")],
        edges: vec![Edge::new("time", "play"), Edge::new("play", "win")],
        ..Default::default()
    };
    engine.calculate_node_heights(graph.all_nodes());
    let columns = engine.calculate_columns(&graph);

    assert_eq!(columns.len(), 3);
    assert_eq!(engine.node_column("time"), Some(0));
    assert_eq!(engine.node_column("play"), Some(1));
    assert_eq!(engine.node_column("win"), Some(2));
}

#[test]
fn test_subsection_bounds_with_inputs() {
    let mut engine = LayoutEngine::default();
    let graph = Graph {
        inputs: vec![input("a", "A"), input("b", "B")],
        ..Default::default()
    };
    engine.calculate_node_heights(graph.all_nodes());
    engine.record_node_position("a", Rect::new(0.0, 0.0, 144.0, 72.0));
    engine.record_node_position("b", Rect::new(0.0, 100.0, 144.0, 72.0));

    let bounds = engine.calculate_subsection_bounds(&["a".to_string(), "b".to_string()]);
    assert_eq!(bounds, Rect::new(-70.0, -80.0, 274.0, 312.0));
}

#[test]
fn test_full_economy_layout() {
    let graph = economy();
    let diagram = layout_graph(&graph, &LayoutConfig::default()).unwrap();

    assert_eq!(diagram.title, "RPG Economy");
    assert_eq!(diagram.nodes.len(), graph.node_count());
    assert_eq!(diagram.edges.len(), graph.edges.len());
    assert!(diagram.degraded.is_empty());
    assert_no_overlaps(&diagram);
    assert_edges_point_right(&diagram, &graph);

    let boss = diagram.node("boss").unwrap();
    let rightmost = diagram.nodes.iter().map(|node| node.column).max().unwrap();
    assert_eq!(boss.column, rightmost);

    for edge in &diagram.edges {
        assert!(edge.points.len() >= 2);
        assert_eq!(edge.dashed, edge.to == "boss");
    }

    let legend = diagram.legend.as_ref().unwrap();
    let titles: Vec<&str> = legend.columns.iter().map(|column| column.title.as_str()).collect();
    assert_eq!(titles, vec!["Sinks", "Sources", "Stores of Value"]);
    let sinks: Vec<&str> = legend.columns[0].items.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(sinks, vec!["Energy", "Gold", "Ore", "XP"]);
}

#[test]
fn test_optimize_flag_keeps_invariants() {
    let graph = economy();
    let config = LayoutConfig {
        optimize: false,
        ..Default::default()
    };
    let diagram = layout_graph(&graph, &config).unwrap();
    assert_no_overlaps(&diagram);
    assert_edges_point_right(&diagram, &graph);
}

#[test]
fn test_scene_round_trip() {
    let graph = economy();
    let diagram = layout_graph(&graph, &LayoutConfig::default()).unwrap();
    let mut scene = Scene::new();
    realize(&diagram, &Palette::default(), &mut scene).unwrap();

    let synced = reconstruct(&scene).unwrap();
    assert_eq!(synced.name.as_deref(), Some("RPG"));

    let original_inputs: Vec<(&str, &str)> = graph.inputs.iter().map(|i| (i.id.as_str(), i.label.as_str())).collect();
    let synced_inputs: Vec<(&str, &str)> = synced.inputs.iter().map(|i| (i.id.as_str(), i.label.as_str())).collect();
    assert_eq!(original_inputs, synced_inputs);

    assert_eq!(synced.nodes.len(), graph.nodes.len());
    for act in &graph.nodes {
        let back = synced.nodes.iter().find(|node| node.id == act.id).unwrap();
        assert_eq!(back.label, act.label);
        assert_eq!(back.kind, act.kind);
        assert_eq!(back.sources, act.sources);
        assert_eq!(back.sinks, act.sinks);
        assert_eq!(back.values, act.values);
    }

    let original_edges: BTreeSet<&Edge> = graph.edges.iter().collect();
    let synced_edges: BTreeSet<&Edge> = synced.edges.iter().collect();
    assert_eq!(original_edges, synced_edges);

    let gear = &synced.subsections[0];
    assert_eq!(gear.id, "gear");
    assert_eq!(gear.label, "Gear Loop");
    assert_eq!(gear.color.as_deref(), Some("#3366CC"));
    let members: BTreeSet<&str> = gear.node_ids.iter().map(String::as_str).collect();
    assert!(members.contains("shop") && members.contains("craft"));
}

#[test]
fn test_graph_json_round_trip() {
    let graph = economy();
    let json = graph.to_json_pretty().unwrap();
    assert!(json.contains("\"nodeIds\""));
    assert!(json.contains("[\n      \"time\",\n      \"grind\"\n    ]"));
    assert_eq!(Graph::from_json(&json).unwrap(), graph);
}

#[test]
fn test_invalid_graph_reports_every_issue() {
    let mut graph = economy();
    graph.edges.push(Edge::new("boss", "grind"));
    graph.edges.push(Edge::new("mine", "nowhere"));
    graph.subsections[0].color = Some("blue".into());

    let Err(LayoutError::Invalid(error)) = layout_graph(&graph, &LayoutConfig::default()) else {
        panic!("invalid graph was laid out");
    };
    assert!(error.issues.iter().any(|issue| matches!(issue, ValidationIssue::Cycle { .. })));
    assert!(
        error
            .issues
            .iter()
            .any(|issue| matches!(issue, ValidationIssue::UnknownEdgeEndpoint { missing, .. } if missing == "nowhere"))
    );
    assert!(error.issues.iter().any(|issue| matches!(issue, ValidationIssue::InvalidColor { .. })));
}

#[test]
#[traced_test]
fn test_capped_search_warns() {
    let engine = CollisionEngine::new(CollisionConfig::default());
    let mut context = CollisionContext::new(Padding { x: 100.0, y: 21.0 });
    // A tower where every push lands on a lower box; each push clears at most two.
    for i in 0..(NODE_OVERLAP_ITERATIONS * 3) {
        context.record(format!("block{i}"), Rect::new(0.0, i as f64 * 120.0, 144.0, 100.0));
    }

    let placement = engine.find_conflict_free_placement("late", 0.0, 0.0, 144.0, 100.0, &context, &[]);
    assert!(placement.degraded);
    assert!(placement.y.is_finite());
    assert!(logs_contain("no conflict-free position found"));
}

fn random_graph(seed: u64) -> Graph {
    let mut rng = StdRng::seed_from_u64(seed);
    let currencies = ["Gold", "Gems", "XP", "Energy", "Wood", "Stone"];
    let pick = |rng: &mut StdRng, count: usize| -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for _ in 0..count {
            let name = currencies[rng.random_range(0..currencies.len())].to_string();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    };

    let inputs: Vec<Input> = (0..rng.random_range(1..=3))
        .map(|i| input(&format!("in{i}"), &format!("Input {i}")))
        .collect();
    let mut nodes: Vec<Act> = (0..rng.random_range(4..=14))
        .map(|i| {
            let mut act = Act::new(format!("act{i}"), format!("Action {i}"));
            let (sources, sinks, values) = (rng.random_range(0..=2), rng.random_range(0..=2), rng.random_range(0..=1));
            act.sources = pick(&mut rng, sources);
            act.sinks = pick(&mut rng, sinks);
            act.values = pick(&mut rng, values);
            act
        })
        .collect();
    let finals = rng.random_range(1..=2);
    nodes.extend((0..finals).map(|i| Act::final_good(format!("final{i}"), format!("Goal {i}"))));

    // Sources come strictly before targets in this order, so the graph is acyclic.
    let order: Vec<String> = inputs
        .iter()
        .map(|i| i.id.clone())
        .chain(nodes.iter().map(|n| n.id.clone()))
        .collect();
    let first_final = order.len() - finals;
    let mut edges = Vec::new();
    let mut seen = HashSet::new();
    for target in inputs.len()..order.len() {
        let fan_in = rng.random_range(1..=2);
        for _ in 0..fan_in {
            let source = rng.random_range(0..target.min(first_final));
            if seen.insert((source, target)) {
                edges.push(Edge::new(order[source].clone(), order[target].clone()));
            }
        }
    }

    let subsections = if rng.random_bool(0.5) && nodes.len() > 3 {
        vec![Subsection {
            id: "cluster".into(),
            label: "Cluster".into(),
            node_ids: vec![nodes[1].id.clone(), nodes[2].id.clone()],
            color: None,
        }]
    } else {
        Vec::new()
    };

    Graph {
        name: Some(format!("Random {seed}")),
        inputs,
        nodes,
        edges,
        subsections,
    }
}

#[test]
fn test_random_graphs_never_overlap() {
    for seed in 0..25 {
        let graph = random_graph(seed);
        let diagram = layout_graph(&graph, &LayoutConfig::default())
            .unwrap_or_else(|error| panic!("seed {seed}: {error}"));
        assert_eq!(diagram.nodes.len(), graph.node_count(), "seed {seed}");
        assert_no_overlaps(&diagram);
        assert_edges_point_right(&diagram, &graph);
    }
}

#[test]
fn test_svg_output() {
    let diagram = layout_graph(&economy(), &LayoutConfig::default()).unwrap();
    let mut surface = SvgSurface::new();
    let realized = realize(&diagram, &Palette::default(), &mut surface).unwrap();
    assert_eq!(realized.nodes.len(), diagram.nodes.len());
    assert_eq!(realized.subsections.len(), 1);

    let svg = surface.document().to_string();
    for node in &diagram.nodes {
        assert!(svg.contains(&node.label), "missing label {}", node.label);
    }
    assert!(svg.contains("Stores of Value"));
}

#[test]
fn test_tiny_cell_size_stays_usable() {
    let graph = economy();
    let mut config = LayoutConfig::default();
    config.collision.cell_size = 0.05;
    let diagram = layout_graph(&graph, &config).unwrap();
    assert_eq!(diagram.nodes.len(), graph.node_count());
    assert_no_overlaps(&diagram);
}

#[test]
fn test_glob_import_keeps_std_result() -> Result<(), Box<dyn std::error::Error>> {
    let graph = Graph::from_json(&economy().to_json_pretty()?)?;
    let diagram = layout_graph(&graph, &LayoutConfig::default())?;
    assert!(!diagram.nodes.is_empty());
    Ok(())
}
