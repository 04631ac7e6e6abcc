//! Storage-boundary shape for Sankey nodes.
//!
//! Links are always recomputed from nodes + map, so this is the only
//! per-node shape that crosses into durable storage. Sentinel defaults
//! ("None"/"Unknown"/current timestamp) are applied here, never inside
//! the core.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use spendflow_core::SankeyHierarchy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedNode {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    pub index: usize,
    pub isleaf: bool,
    pub visible: bool,
    pub date: String,
    pub location: String,
    pub bank: String,
}

pub fn to_persisted(hierarchy: &SankeyHierarchy) -> Vec<PersistedNode> {
    hierarchy
        .nodes
        .iter()
        .map(|node| {
            let isleaf = hierarchy.is_leaf(node.index);
            PersistedNode {
                name: node.name.clone(),
                cost: node.cost,
                index: node.index,
                isleaf,
                visible: !isleaf,
                date: node
                    .date
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| Utc::now().format("%Y-%m-%d").to_string()),
                location: node.location.clone().unwrap_or_else(|| "None".to_string()),
                bank: node.bank.clone().unwrap_or_else(|| "Unknown".to_string()),
            }
        })
        .collect()
}
