//! Drawing surfaces and the translation of a laid out [`Diagram`] into
//! surface primitives.

use std::collections::HashMap;

use crate::config::Palette;
use crate::diagram::{AttributeTag, Diagram, PlacedNode};
use crate::error::SurfaceError;
use crate::graph::NodeKind;
use crate::legend::Legend;
use crate::types::*;

pub const FINAL_GOOD_TITLE: &str = "Final Good";
pub const DEFAULT_FONT_SIZE: f64 = 12.0;
pub const SMALL_FONT_SIZE: f64 = 10.0;
pub const SUBSECTION_FILL_OPACITY: f64 = 0.15;
const TEXT_LIGHT: &str = "#FFFFFF";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlign {
    #[default]
    Center,
    Left,
}

/// What a box stands for, so a scene can be read back into a graph.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BoxTag {
    #[default]
    Plain,
    Node { id: String, kind: NodeKind },
    FinalGoodHeader { id: String },
    /// Attribute row; `None` for rows drawn without an explicit role.
    Attribute(Option<AttributeTag>),
    Legend,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoxSpec {
    pub rect: Rect,
    pub text: String,
    pub fill: String,
    pub text_color: String,
    pub stroke: Option<String>,
    pub align: TextAlign,
    pub font_size: f64,
    pub tag: BoxTag,
}

/// Connector between two boxes. Surfaces draw connectors beneath boxes
/// regardless of creation order.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectorSpec<H> {
    pub from: H,
    pub to: H,
    pub points: Vec<Point>,
    pub color: String,
    pub dashed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionRole {
    Main,
    Subsection { id: String },
    Legend,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SectionSpec {
    pub rect: Rect,
    pub title: String,
    pub fill: String,
    pub fill_opacity: f64,
    pub role: SectionRole,
}

pub trait Surface {
    type Handle: Clone;

    fn create_box(&mut self, spec: &BoxSpec) -> Result<Self::Handle, SurfaceError>;

    fn create_connector(&mut self, spec: &ConnectorSpec<Self::Handle>) -> Result<Self::Handle, SurfaceError>;

    fn create_section(&mut self, spec: &SectionSpec) -> Result<Self::Handle, SurfaceError>;

    /// Group existing items under `name`. Empty groups are an error.
    fn group(&mut self, name: &str, members: &[Self::Handle]) -> Result<Self::Handle, SurfaceError>;
}

/// Handles of everything [`realize`] drew.
#[derive(Debug, Clone)]
pub struct Realized<H> {
    pub root: H,
    pub main_section: H,
    /// Main box of each node, by node id.
    pub nodes: HashMap<String, H>,
    pub connectors: Vec<H>,
    pub subsections: Vec<H>,
    pub legend: Option<H>,
}

/// Font size for a label of `len` characters in a box `width` wide.
pub fn font_size_for(width: f64, len: usize) -> f64 {
    if (width > 120.0 && len > 40) || (width < 120.0 && len > 20) {
        SMALL_FONT_SIZE
    } else {
        DEFAULT_FONT_SIZE
    }
}

fn text_box(rect: Rect, text: String, fill: &str, text_color: &str, tag: BoxTag) -> BoxSpec {
    BoxSpec {
        font_size: font_size_for(rect.width, text.chars().count()),
        rect,
        text,
        fill: fill.to_string(),
        text_color: text_color.to_string(),
        stroke: None,
        align: TextAlign::Center,
        tag,
    }
}

fn attribute_fill(palette: &Palette, tag: AttributeTag) -> &str {
    match tag {
        AttributeTag::Source => &palette.source,
        AttributeTag::Sink => &palette.sink,
        AttributeTag::Value => &palette.xp,
    }
}

/// Draw a diagram: sections first, then nodes, connectors and the legend.
pub fn realize<S: Surface>(
    diagram: &Diagram,
    palette: &Palette,
    surface: &mut S,
) -> Result<Realized<S::Handle>, SurfaceError> {
    let main_section = surface.create_section(&SectionSpec {
        rect: diagram.bounds,
        title: diagram.title.clone(),
        fill: palette.main.clone(),
        fill_opacity: 1.0,
        role: SectionRole::Main,
    })?;

    let mut subsections = Vec::with_capacity(diagram.subsections.len());
    for subsection in &diagram.subsections {
        let handle = surface.create_section(&SectionSpec {
            rect: subsection.rect,
            title: subsection.label.clone(),
            fill: subsection.color.clone().unwrap_or_else(|| palette.stroke.clone()),
            fill_opacity: SUBSECTION_FILL_OPACITY,
            role: SectionRole::Subsection {
                id: subsection.id.clone(),
            },
        })?;
        subsections.push(handle);
    }

    let mut nodes = HashMap::with_capacity(diagram.nodes.len());
    let mut node_groups = Vec::with_capacity(diagram.nodes.len());
    for node in &diagram.nodes {
        let (main, parts) = draw_node(node, palette, surface)?;
        node_groups.push(surface.group(&node.id, &parts)?);
        nodes.insert(node.id.clone(), main);
    }

    let mut connectors = Vec::with_capacity(diagram.edges.len());
    for edge in &diagram.edges {
        let (Some(from), Some(to)) = (nodes.get(&edge.from), nodes.get(&edge.to)) else {
            continue;
        };
        let handle = surface.create_connector(&ConnectorSpec {
            from: from.clone(),
            to: to.clone(),
            points: edge.points.clone(),
            color: palette.connector.clone(),
            dashed: edge.dashed,
        })?;
        connectors.push(handle);
    }

    let mut members = vec![main_section.clone()];
    members.extend(subsections.iter().cloned());
    members.extend(node_groups);
    members.extend(connectors.iter().cloned());
    let root = surface.group(&diagram.title, &members)?;

    let legend = match &diagram.legend {
        Some(legend) => Some(draw_legend(legend, palette, surface)?),
        None => None,
    };

    Ok(Realized {
        root,
        main_section,
        nodes,
        connectors,
        subsections,
        legend,
    })
}

/// Returns the node's main box and every part drawn for it.
fn draw_node<S: Surface>(
    node: &PlacedNode,
    palette: &Palette,
    surface: &mut S,
) -> Result<(S::Handle, Vec<S::Handle>), SurfaceError> {
    let tag = BoxTag::Node {
        id: node.id.clone(),
        kind: node.kind,
    };
    let mut parts = Vec::with_capacity(node.attributes.len() + 2);

    let main = match node.kind {
        NodeKind::InitialSink => {
            let spec = text_box(node.box_rect, node.label.clone(), &palette.sink, TEXT_LIGHT, tag);
            surface.create_box(&spec)?
        }
        NodeKind::Action => {
            let mut spec = text_box(node.box_rect, node.label.clone(), &palette.main, &palette.header, tag);
            spec.stroke = Some(palette.stroke.clone());
            surface.create_box(&spec)?
        }
        NodeKind::FinalGood => {
            let header_height = node.header_height;
            let header_rect = Rect::new(node.box_rect.x, node.box_rect.y, node.box_rect.width, header_height);
            let body_rect = Rect::new(
                node.box_rect.x,
                node.box_rect.y + header_height,
                node.box_rect.width,
                node.box_rect.height - header_height,
            );
            let header = text_box(
                header_rect,
                FINAL_GOOD_TITLE.to_string(),
                &palette.header,
                TEXT_LIGHT,
                BoxTag::FinalGoodHeader { id: node.id.clone() },
            );
            parts.push(surface.create_box(&header)?);
            let body = text_box(body_rect, node.label.clone(), &palette.final_good, &palette.header, tag);
            surface.create_box(&body)?
        }
    };
    parts.push(main.clone());

    for row in &node.attributes {
        let mut spec = text_box(
            row.rect,
            row.text(),
            attribute_fill(palette, row.tag),
            TEXT_LIGHT,
            BoxTag::Attribute(Some(row.tag)),
        );
        spec.align = TextAlign::Left;
        parts.push(surface.create_box(&spec)?);
    }

    Ok((main, parts))
}

fn draw_legend<S: Surface>(legend: &Legend, palette: &Palette, surface: &mut S) -> Result<S::Handle, SurfaceError> {
    let mut members = vec![surface.create_section(&SectionSpec {
        rect: legend.bounds,
        title: "Legend".to_string(),
        fill: palette.main.clone(),
        fill_opacity: 1.0,
        role: SectionRole::Legend,
    })?];

    for column in &legend.columns {
        let fill = attribute_fill(palette, column.tag);
        members.push(surface.create_box(&text_box(
            column.header,
            column.title.clone(),
            fill,
            TEXT_LIGHT,
            BoxTag::Legend,
        ))?);
        for (name, rect) in &column.items {
            let mut spec = text_box(*rect, name.clone(), fill, TEXT_LIGHT, BoxTag::Legend);
            spec.align = TextAlign::Left;
            members.push(surface.create_box(&spec)?);
        }
    }

    surface.group("Legend", &members)
}
