use std::fmt;

/// One problem found while validating a graph.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationIssue {
    #[error("node with label {label:?} has an empty id")]
    EmptyId { label: String },

    #[error("duplicate node id: {id}")]
    DuplicateId { id: String },

    #[error("edge {from} -> {to} references unknown node {missing}")]
    UnknownEdgeEndpoint {
        from: String,
        to: String,
        missing: String,
    },

    #[error("edge {id} -> {id} is a self loop")]
    SelfLoop { id: String },

    #[error("edges form a cycle through node {id}")]
    Cycle { id: String },

    #[error("duplicate subsection id: {id}")]
    DuplicateSubsection { id: String },

    #[error("subsection {subsection} references unknown node {node}")]
    UnknownSubsectionMember { subsection: String, node: String },

    #[error("subsection {subsection} has invalid colour {color:?}, expected #RRGGBB")]
    InvalidColor { subsection: String, color: String },
}

/// Every issue found in a graph, in discovery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "graph has {} validation issue(s)", self.issues.len())?;
        for issue in &self.issues {
            write!(f, "\n  - {issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error("scene contains no tagged node boxes")]
    NothingToReconstruct,
}

#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    #[error("unknown surface handle {0}")]
    UnknownHandle(usize),

    #[error("cannot group an empty selection")]
    EmptyGroup,

    #[error("failed to write svg: {0}")]
    Io(#[from] std::io::Error),
}
