//! [`Surface`] that renders to an SVG document.

use std::path::Path as FsPath;

use svg::Document;
use svg::node::element::{Group, Path, Rectangle, Text};

use crate::error::SurfaceError;
use crate::surface::{BoxSpec, ConnectorSpec, SectionSpec, Surface, TextAlign};
use crate::types::*;

const DOCUMENT_MARGIN: f64 = 20.0;
const TEXT_INSET: f64 = 6.0;
const SECTION_TITLE_SIZE: f64 = 28.0;
const SECTION_TITLE_INSET: f64 = 40.0;
const CONNECTOR_WIDTH: f64 = 2.0;
const FONT_FAMILY: &str = "Arial, sans-serif";

/// Paint order. Connectors sit beneath boxes whatever order they arrive in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layer {
    Sections,
    Connectors,
    Boxes,
}

#[derive(Debug, Clone)]
enum SvgItem {
    Element {
        layer: Layer,
        element: Group,
        classes: Vec<String>,
    },
    Group(Vec<usize>),
}

#[derive(Debug, Clone, Default)]
pub struct SvgSurface {
    items: Vec<SvgItem>,
    extent: Option<Rect>,
}

impl SvgSurface {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, layer: Layer, element: Group, area: Rect) -> usize {
        self.extent = Some(match self.extent {
            Some(extent) => extent.union(&area),
            None => area,
        });
        self.items.push(SvgItem::Element {
            layer,
            element,
            classes: Vec::new(),
        });
        self.items.len() - 1
    }

    fn check(&self, handle: usize) -> Result<(), SurfaceError> {
        if handle < self.items.len() {
            Ok(())
        } else {
            Err(SurfaceError::UnknownHandle(handle))
        }
    }

    /// Element indices under `handle`, following nested groups.
    fn leaves(&self, handle: usize, out: &mut Vec<usize>) {
        match &self.items[handle] {
            SvgItem::Element { .. } => out.push(handle),
            SvgItem::Group(members) => {
                for &member in members {
                    self.leaves(member, out);
                }
            }
        }
    }

    pub fn document(&self) -> Document {
        let extent = self.extent.unwrap_or(Rect::ZERO).expand(DOCUMENT_MARGIN);
        let mut document = Document::new()
            .set(
                "viewBox",
                format!("{} {} {} {}", extent.x, extent.y, extent.width, extent.height),
            )
            .set("width", extent.width)
            .set("height", extent.height);

        for wanted in [Layer::Sections, Layer::Connectors, Layer::Boxes] {
            for item in &self.items {
                let SvgItem::Element {
                    layer,
                    element,
                    classes,
                } = item
                else {
                    continue;
                };
                if *layer != wanted {
                    continue;
                }
                let element = if classes.is_empty() {
                    element.clone()
                } else {
                    element.clone().set("class", classes.join(" "))
                };
                document = document.add(element);
            }
        }
        document
    }

    pub fn save(&self, path: impl AsRef<FsPath>) -> Result<(), SurfaceError> {
        svg::save(path, &self.document())?;
        Ok(())
    }
}

fn rectangle(rect: &Rect, fill: &str) -> Rectangle {
    Rectangle::new()
        .set("x", rect.x)
        .set("y", rect.y)
        .set("width", rect.width)
        .set("height", rect.height)
        .set("fill", fill)
}

fn class_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join("-")
}

impl Surface for SvgSurface {
    type Handle = usize;

    fn create_box(&mut self, spec: &BoxSpec) -> Result<usize, SurfaceError> {
        let mut rect = rectangle(&spec.rect, &spec.fill);
        if let Some(stroke) = &spec.stroke {
            rect = rect.set("stroke", stroke.as_str()).set("stroke-width", 1);
        }

        let (x, anchor) = match spec.align {
            TextAlign::Center => (spec.rect.center().x, "middle"),
            TextAlign::Left => (spec.rect.x + TEXT_INSET, "start"),
        };
        let text = Text::new(spec.text.as_str())
            .set("x", x)
            .set("y", spec.rect.center().y)
            .set("dominant-baseline", "middle")
            .set("text-anchor", anchor)
            .set("font-family", FONT_FAMILY)
            .set("font-size", spec.font_size)
            .set("fill", spec.text_color.as_str());

        Ok(self.push(Layer::Boxes, Group::new().add(rect).add(text), spec.rect))
    }

    fn create_connector(&mut self, spec: &ConnectorSpec<usize>) -> Result<usize, SurfaceError> {
        self.check(spec.from)?;
        self.check(spec.to)?;

        let mut d = String::new();
        for (i, point) in spec.points.iter().enumerate() {
            let command = if i == 0 { 'M' } else { 'L' };
            d.push_str(&format!("{command} {} {} ", point.x, point.y));
        }
        let mut path = Path::new()
            .set("d", d.trim_end())
            .set("fill", "none")
            .set("stroke", spec.color.as_str())
            .set("stroke-width", CONNECTOR_WIDTH);
        if spec.dashed {
            path = path.set("stroke-dasharray", "10,10");
        }

        let area = Rect::bounding(
            spec.points
                .iter()
                .map(|point| Rect::new(point.x, point.y, 0.0, 0.0))
                .collect::<Vec<_>>()
                .iter(),
        )
        .unwrap_or(Rect::ZERO);
        Ok(self.push(Layer::Connectors, Group::new().add(path), area))
    }

    fn create_section(&mut self, spec: &SectionSpec) -> Result<usize, SurfaceError> {
        let rect = rectangle(&spec.rect, &spec.fill).set("fill-opacity", spec.fill_opacity);
        let title = Text::new(spec.title.as_str())
            .set("x", spec.rect.x + SECTION_TITLE_INSET)
            .set("y", spec.rect.y + SECTION_TITLE_INSET)
            .set("font-family", FONT_FAMILY)
            .set("font-size", SECTION_TITLE_SIZE)
            .set("fill", "#000000");
        Ok(self.push(Layer::Sections, Group::new().add(rect).add(title), spec.rect))
    }

    fn group(&mut self, name: &str, members: &[usize]) -> Result<usize, SurfaceError> {
        if members.is_empty() {
            return Err(SurfaceError::EmptyGroup);
        }
        for &member in members {
            self.check(member)?;
        }

        let class = class_name(name);
        let mut leaves = Vec::new();
        for &member in members {
            self.leaves(member, &mut leaves);
        }
        for leaf in leaves {
            if let SvgItem::Element { classes, .. } = &mut self.items[leaf] {
                classes.push(class.clone());
            }
        }

        self.items.push(SvgItem::Group(members.to_vec()));
        Ok(self.items.len() - 1)
    }
}
