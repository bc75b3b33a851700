//! Economy graph model as exchanged in JSON.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum InputKind {
    #[default]
    #[serde(rename = "initial_sink_node", alias = "SINK_RED")]
    InitialSink,
}

/// A resource entering the economy (time, money, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Input {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub kind: InputKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActKind {
    #[serde(alias = "finalGood")]
    FinalGood,
    #[default]
    #[serde(other)]
    Action,
}

impl ActKind {
    fn is_action(&self) -> bool {
        matches!(self, ActKind::Action)
    }
}

/// An activity node; each attribute list renders as stacked rows under the box.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Act {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sinks: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
    #[serde(default, skip_serializing_if = "ActKind::is_action")]
    pub kind: ActKind,
}

impl Act {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            ..Default::default()
        }
    }

    pub fn final_good(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            kind: ActKind::FinalGood,
            ..Self::new(id, label)
        }
    }

    pub fn attribute_count(&self) -> usize {
        self.sources.len() + self.sinks.len() + self.values.len()
    }
}

/// Flattened node classification used by layout and rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    InitialSink,
    Action,
    FinalGood,
}

/// Borrowed view over either node class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Node<'a> {
    Input(&'a Input),
    Act(&'a Act),
}

impl<'a> Node<'a> {
    pub fn id(&self) -> &'a str {
        match self {
            Node::Input(input) => &input.id,
            Node::Act(act) => &act.id,
        }
    }

    pub fn label(&self) -> &'a str {
        match self {
            Node::Input(input) => &input.label,
            Node::Act(act) => &act.label,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Input(input) => match input.kind {
                InputKind::InitialSink => NodeKind::InitialSink,
            },
            Node::Act(act) => match act.kind {
                ActKind::Action => NodeKind::Action,
                ActKind::FinalGood => NodeKind::FinalGood,
            },
        }
    }

    /// Number of stacked attribute rows rendered below the main box.
    pub fn attribute_rows(&self) -> usize {
        match self {
            Node::Input(_) => 0,
            Node::Act(act) => match act.kind {
                ActKind::Action => act.attribute_count(),
                ActKind::FinalGood => 0,
            },
        }
    }
}

/// Directed dependency `from -> to`, serialized as `["from", "to"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge(pub String, pub String);

impl Edge {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self(from.into(), to.into())
    }

    pub fn from_id(&self) -> &str {
        &self.0
    }

    pub fn to_id(&self) -> &str {
        &self.1
    }
}

/// Named visual grouping of existing nodes; it references nodes, never owns them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subsection {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub node_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Graph {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub inputs: Vec<Input>,
    #[serde(default)]
    pub nodes: Vec<Act>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subsections: Vec<Subsection>,
}

impl Graph {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Every node, inputs first, in declaration order.
    pub fn all_nodes(&self) -> impl Iterator<Item = Node<'_>> {
        self.inputs
            .iter()
            .map(Node::Input)
            .chain(self.nodes.iter().map(Node::Act))
    }

    pub fn node(&self, id: &str) -> Option<Node<'_>> {
        self.all_nodes().find(|node| node.id() == id)
    }

    pub fn node_count(&self) -> usize {
        self.inputs.len() + self.nodes.len()
    }
}
