use std::collections::BTreeSet;

use crate::config::LayoutConfig;
use crate::diagram::AttributeTag;
use crate::graph::Graph;
use crate::types::*;

const ITEM_SPACING: f64 = 5.0;
const HEADER_MARGIN_BOTTOM: f64 = 10.0;
const COLUMN_GAP: f64 = 50.0;
/// Horizontal distance between the legend and the main section.
const LEGEND_GAP: f64 = 50.0;
const LEGEND_INSET_X: f64 = 40.0;
const LEGEND_PADDING: SectionPadding = SectionPadding {
    top: 80.0,
    right: 60.0,
    bottom: 60.0,
    left: 70.0,
};

/// Distinct attribute names of a graph, sorted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Currencies {
    pub sinks: BTreeSet<String>,
    pub sources: BTreeSet<String>,
    pub values: BTreeSet<String>,
}

impl Currencies {
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty() && self.sources.is_empty() && self.values.is_empty()
    }
}

pub fn extract_currencies(graph: &Graph) -> Currencies {
    let mut currencies = Currencies::default();
    for act in &graph.nodes {
        currencies.sinks.extend(act.sinks.iter().cloned());
        currencies.sources.extend(act.sources.iter().cloned());
        currencies.values.extend(act.values.iter().cloned());
    }
    currencies
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegendColumn {
    pub tag: AttributeTag,
    pub title: String,
    pub header: Rect,
    pub items: Vec<(String, Rect)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Legend {
    pub bounds: Rect,
    pub columns: Vec<LegendColumn>,
}

fn title(tag: AttributeTag) -> &'static str {
    match tag {
        AttributeTag::Sink => "Sinks",
        AttributeTag::Source => "Sources",
        AttributeTag::Value => "Stores of Value",
    }
}

/// Legend listing every currency by role, placed left of `main_section`
/// and aligned with its top. `None` when the graph has no attributes.
pub fn build_legend(graph: &Graph, config: &LayoutConfig, main_section: &Rect) -> Option<Legend> {
    let currencies = extract_currencies(graph);
    if currencies.is_empty() {
        return None;
    }

    let header_size = config.node_box;
    let item_size = config.attribute_box;
    let column_step = header_size.width + COLUMN_GAP;

    let groups = [
        (AttributeTag::Sink, &currencies.sinks),
        (AttributeTag::Source, &currencies.sources),
        (AttributeTag::Value, &currencies.values),
    ];

    // Lay columns out relative to the legend's top-left corner first.
    let mut columns = Vec::new();
    let mut x = LEGEND_INSET_X;
    let mut content_height: f64 = 0.0;
    for (tag, items) in groups {
        if items.is_empty() {
            continue;
        }
        let header = Rect::new(x, LEGEND_PADDING.top, header_size.width, header_size.height);
        let mut y = header.bottom() + HEADER_MARGIN_BOTTOM;
        let mut rows = Vec::with_capacity(items.len());
        for item in items {
            rows.push((item.clone(), Rect::new(x, y, item_size.width, item_size.height)));
            y += item_size.height + ITEM_SPACING;
        }
        content_height = content_height.max(y - LEGEND_PADDING.top);
        columns.push(LegendColumn {
            tag,
            title: title(tag).to_string(),
            header,
            items: rows,
        });
        x += column_step;
    }

    let width = x - LEGEND_INSET_X + LEGEND_PADDING.right;
    let height = content_height + LEGEND_PADDING.top + LEGEND_PADDING.bottom;
    let origin_x = main_section.x - width - LEGEND_GAP;
    let origin_y = main_section.y;

    for column in &mut columns {
        column.header = column.header.translate(origin_x, origin_y);
        for (_, rect) in &mut column.items {
            *rect = rect.translate(origin_x, origin_y);
        }
    }

    Some(Legend {
        bounds: Rect::new(origin_x, origin_y, width, height),
        columns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Act;

    fn graph() -> Graph {
        let mut a = Act::new("a", "A");
        a.sinks = vec!["Gold".into(), "Energy".into()];
        a.sources = vec!["XP".into()];
        let mut b = Act::new("b", "B");
        b.sinks = vec!["Gold".into()];
        Graph {
            nodes: vec![a, b],
            ..Default::default()
        }
    }

    #[test]
    fn currencies_are_sorted_and_unique() {
        let currencies = extract_currencies(&graph());
        assert_eq!(
            currencies.sinks.iter().collect::<Vec<_>>(),
            vec!["Energy", "Gold"]
        );
        assert_eq!(currencies.sources.len(), 1);
        assert!(currencies.values.is_empty());
    }

    #[test]
    fn legend_geometry() {
        let main = Rect::new(0.0, 0.0, 500.0, 500.0);
        let legend = build_legend(&graph(), &LayoutConfig::default(), &main).unwrap();

        // Two non-empty columns: 2 * (144 + 50) + 60.
        assert_eq!(legend.bounds.width, 448.0);
        assert_eq!(legend.bounds.x, -498.0);
        assert_eq!(legend.bounds.y, 0.0);
        // Tallest column: header 90 + 10 + 2 * 25, plus padding 80 + 60.
        assert_eq!(legend.bounds.height, 150.0 + 140.0);

        let sinks = &legend.columns[0];
        assert_eq!(sinks.title, "Sinks");
        assert_eq!(sinks.header, Rect::new(-458.0, 80.0, 144.0, 90.0));
        assert_eq!(sinks.items[0].0, "Energy");
        assert_eq!(sinks.items[1].1, Rect::new(-458.0, 205.0, 112.0, 20.0));
        assert_eq!(legend.columns[1].title, "Sources");
    }

    #[test]
    fn no_attributes_means_no_legend() {
        let graph = Graph {
            nodes: vec![Act::new("a", "A")],
            ..Default::default()
        };
        assert!(build_legend(&graph, &LayoutConfig::default(), &Rect::ZERO).is_none());
    }
}
