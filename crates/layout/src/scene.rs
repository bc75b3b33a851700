//! In-memory [`Surface`] that records every primitive it is asked to draw.

use crate::error::SurfaceError;
use crate::surface::{BoxSpec, ConnectorSpec, SectionSpec, Surface};

#[derive(Debug, Clone, PartialEq)]
pub enum SceneItem {
    Box(BoxSpec),
    Connector(ConnectorSpec<usize>),
    Section(SectionSpec),
    Group { name: String, members: Vec<usize> },
}

/// Recorded primitives, addressed by their creation index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    items: Vec<SceneItem>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[SceneItem] {
        &self.items
    }

    pub fn get(&self, handle: usize) -> Option<&SceneItem> {
        self.items.get(handle)
    }

    pub fn boxes(&self) -> impl Iterator<Item = (usize, &BoxSpec)> {
        self.items.iter().enumerate().filter_map(|(handle, item)| match item {
            SceneItem::Box(spec) => Some((handle, spec)),
            _ => None,
        })
    }

    pub fn connectors(&self) -> impl Iterator<Item = (usize, &ConnectorSpec<usize>)> {
        self.items.iter().enumerate().filter_map(|(handle, item)| match item {
            SceneItem::Connector(spec) => Some((handle, spec)),
            _ => None,
        })
    }

    pub fn sections(&self) -> impl Iterator<Item = (usize, &SectionSpec)> {
        self.items.iter().enumerate().filter_map(|(handle, item)| match item {
            SceneItem::Section(spec) => Some((handle, spec)),
            _ => None,
        })
    }

    pub fn group_named(&self, name: &str) -> Option<&[usize]> {
        self.items.iter().find_map(|item| match item {
            SceneItem::Group { name: group, members } if group == name => Some(members.as_slice()),
            _ => None,
        })
    }

    fn check(&self, handle: usize) -> Result<(), SurfaceError> {
        if handle < self.items.len() {
            Ok(())
        } else {
            Err(SurfaceError::UnknownHandle(handle))
        }
    }

    fn push(&mut self, item: SceneItem) -> usize {
        self.items.push(item);
        self.items.len() - 1
    }
}

impl Surface for Scene {
    type Handle = usize;

    fn create_box(&mut self, spec: &BoxSpec) -> Result<usize, SurfaceError> {
        Ok(self.push(SceneItem::Box(spec.clone())))
    }

    fn create_connector(&mut self, spec: &ConnectorSpec<usize>) -> Result<usize, SurfaceError> {
        self.check(spec.from)?;
        self.check(spec.to)?;
        Ok(self.push(SceneItem::Connector(spec.clone())))
    }

    fn create_section(&mut self, spec: &SectionSpec) -> Result<usize, SurfaceError> {
        Ok(self.push(SceneItem::Section(spec.clone())))
    }

    fn group(&mut self, name: &str, members: &[usize]) -> Result<usize, SurfaceError> {
        if members.is_empty() {
            return Err(SurfaceError::EmptyGroup);
        }
        for &member in members {
            self.check(member)?;
        }
        Ok(self.push(SceneItem::Group {
            name: name.to_string(),
            members: members.to_vec(),
        }))
    }
}
