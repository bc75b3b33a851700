use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::collision::CollisionConfig;
use crate::types::*;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Geometry of a layout run. Every field has a default, so a config file
/// only needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub input_box: Size,
    pub node_box: Size,
    pub attribute_box: Size,
    /// Vertical gap between the main box and each attribute row.
    pub attribute_gap: f64,
    pub padding: Padding,
    /// Top-left corner of column 0.
    pub origin: Point,
    /// Margin between the outermost nodes and the main section frame.
    pub section_padding: f64,
    pub collision: CollisionConfig,
    /// Run the crossing-reduction pass after placement.
    pub optimize: bool,
    pub legend: bool,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            input_box: Size::new(144.0, 90.0),
            node_box: Size::new(144.0, 90.0),
            attribute_box: Size::new(112.0, 20.0),
            attribute_gap: 5.0,
            padding: Padding::default(),
            origin: Point::new(40.0, 40.0),
            section_padding: 100.0,
            collision: CollisionConfig::default(),
            optimize: true,
            legend: true,
        }
    }
}

impl LayoutConfig {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn final_good_header(&self) -> f64 {
        sanitize(self.collision.final_good_header).min(sanitize(self.node_box.height))
    }
}

/// `#RRGGBB`, case-insensitive.
pub fn is_valid_color(color: &str) -> bool {
    color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    pub sink: String,
    pub source: String,
    pub xp: String,
    #[serde(rename = "final")]
    pub final_good: String,
    pub main: String,
    pub header: String,
    pub connector: String,
    pub stroke: String,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            sink: "#DA5433".into(),
            source: "#4CAF50".into(),
            xp: "#EC9F53".into(),
            final_good: "#F5C95C".into(),
            main: "#FFFFFF".into(),
            header: "#000000".into(),
            connector: "#757575".into(),
            stroke: "#CCCCCC".into(),
        }
    }
}

impl Palette {
    /// Defaults with the user-chosen `sink`, `source`, `xp` and `final`
    /// colours applied. Unknown keys and malformed colours are ignored.
    pub fn with_overrides(overrides: &HashMap<String, String>) -> Self {
        let mut palette = Self::default();
        for (key, value) in overrides {
            if !is_valid_color(value) {
                tracing::debug!(key = %key, value = %value, "ignoring invalid colour override");
                continue;
            }
            let slot = match key.as_str() {
                "sink" => &mut palette.sink,
                "source" => &mut palette.source,
                "xp" => &mut palette.xp,
                "final" => &mut palette.final_good,
                _ => continue,
            };
            *slot = value.clone();
        }
        palette
    }
}
