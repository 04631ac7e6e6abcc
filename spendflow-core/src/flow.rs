//! Derive weighted Sankey edges from a hierarchy.
//!
//! Links are recomputed on every read and never persisted; the node list
//! and parent/child map are the durable shape.

use serde::{Deserialize, Serialize};

use crate::hierarchy::SankeyHierarchy;

/// Cyclic edge palette. Keyed by a category's position among categories,
/// not by its node index, so colors stay stable when transactions are
/// interleaved.
pub const FIXED_COLORS: [&str; 10] = [
    "#FF5733", // red
    "#33FF57", // green
    "#3357FF", // blue
    "#FF33A1", // pink
    "#FF8C33", // orange
    "#33FFF5", // cyan
    "#8C33FF", // purple
    "#FFD433", // yellow
    "#33FF8C", // lime
    "#FF3333", // dark red
];

/// One weighted edge of the diagram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SankeyLink {
    pub source: usize,
    pub target: usize,
    pub value: f64,
    pub color: String,
    /// Visual weight for category->transaction edges; root edges leave it
    /// unset and take the renderer's default.
    #[serde(rename = "strokeWidth", skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
}

/// Round to one decimal, half away from zero.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Walk the parent/child map and emit category->transaction edges plus a
/// root->category edge per category.
///
/// Category totals sum `abs(cost)` so refunds widen rather than shrink a
/// category's band. A child index with no matching node counts as cost 0;
/// partial data still renders.
pub fn calculate_links(hierarchy: &SankeyHierarchy) -> Vec<SankeyLink> {
    let mut links = Vec::new();
    let mut color_counter = 0usize;

    for (&parent_index, child_indices) in &hierarchy.map {
        let color = FIXED_COLORS[color_counter % FIXED_COLORS.len()];
        let mut parent_sum = 0.0;

        for &child_index in child_indices {
            let cost = hierarchy
                .node(child_index)
                .and_then(|n| n.cost)
                .unwrap_or(0.0);
            parent_sum += cost.abs();

            links.push(SankeyLink {
                source: parent_index,
                target: child_index,
                value: round1(cost),
                color: color.to_string(),
                stroke_width: Some((cost / 100.0).max(5.0)),
            });
        }

        links.push(SankeyLink {
            source: 0,
            target: parent_index,
            value: round1(parent_sum),
            color: color.to_string(),
            stroke_width: None,
        });

        color_counter += 1;
    }

    links
}
