//! Column layout and collision avoidance for economy flow diagrams.
//!
//! A [`Graph`] of inputs, actions and final goods is placed left to right in
//! dependency columns, pushed apart until no two boxes overlap, connected by
//! elbow connectors that avoid unrelated boxes, and finally drawn onto any
//! [`Surface`].

pub mod collision;
pub mod columns;
pub mod config;
pub mod diagram;
pub mod error;
pub mod geometry;
pub mod graph;
pub mod grid;
pub mod layout;
pub mod legend;
pub mod scene;
pub mod spatial;
pub mod surface;
pub mod svg;
pub mod sync;
pub mod types;
pub mod validate;

pub use collision::*;
pub use columns::*;
pub use config::*;
pub use diagram::*;
pub use error::*;
pub use geometry::*;
pub use graph::*;
pub use grid::*;
pub use layout::*;
pub use legend::*;
pub use scene::*;
pub use spatial::*;
pub use surface::*;
pub use self::svg::SvgSurface;
pub use sync::*;
pub use types::*;
pub use validate::*;
