//! Build the two-level Sankey node graph from a flat record list.
//!
//! Layout: synthetic root "Expenses" at index 0, one node per distinct
//! category, one leaf node per transaction. A single counter assigns
//! indices in scan order, so the same input always yields the same graph.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::transaction::TransactionRecord;

/// Category index -> ordered child (transaction) indices.
///
/// BTreeMap keeps iteration in ascending category index order, which is
/// also first-seen order since indices are assigned monotonically.
pub type ParentChildMap = BTreeMap<usize, Vec<usize>>;

/// A node in the Sankey graph. `cost` is present only on leaves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SankeyNode {
    pub index: usize,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<chrono::NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank: Option<String>,
}

/// Output of one hierarchy build: node list plus the parent/child index map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SankeyHierarchy {
    pub nodes: Vec<SankeyNode>,
    pub map: ParentChildMap,
}

impl SankeyHierarchy {
    /// A node is a leaf iff it is not the root and owns no children.
    pub fn is_leaf(&self, index: usize) -> bool {
        index != 0 && !self.map.contains_key(&index)
    }

    pub fn node(&self, index: usize) -> Option<&SankeyNode> {
        self.nodes.iter().find(|n| n.index == index)
    }
}

/// Convert an ordered list of categorized records into nodes + map.
///
/// First encounter of a category label claims the next index; its
/// transactions follow with their own indices. Repeated labels reuse the
/// existing category node. The index counter is local to this call, so
/// concurrent builds never interfere.
pub fn build_hierarchy(records: &[TransactionRecord]) -> SankeyHierarchy {
    let mut nodes = Vec::with_capacity(records.len() + 1);
    let mut map: ParentChildMap = BTreeMap::new();
    let mut category_indices: HashMap<&str, usize> = HashMap::new();
    let mut current_index = 0usize;

    nodes.push(SankeyNode {
        index: current_index,
        name: "Expenses".to_string(),
        cost: None,
        date: None,
        location: None,
        bank: None,
    });
    current_index += 1;

    for record in records {
        let parent_index = match category_indices.get(record.parent_tag.as_str()) {
            Some(&idx) => idx,
            None => {
                let idx = current_index;
                category_indices.insert(record.parent_tag.as_str(), idx);
                nodes.push(SankeyNode {
                    index: idx,
                    name: record.parent_tag.clone(),
                    cost: None,
                    date: None,
                    location: None,
                    bank: None,
                });
                map.insert(idx, Vec::new());
                current_index += 1;
                idx
            }
        };

        let transaction_index = current_index;
        nodes.push(SankeyNode {
            index: transaction_index,
            name: record.name.clone(),
            cost: Some(record.cost),
            date: record.date,
            location: record.location.clone(),
            bank: record.bank.clone(),
        });
        map.entry(parent_index).or_default().push(transaction_index);
        current_index += 1;
    }

    SankeyHierarchy { nodes, map }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::TransactionRecord;

    fn record(name: &str, cost: f64, tag: &str) -> TransactionRecord {
        TransactionRecord {
            name: name.to_string(),
            cost,
            index: "0".to_string(),
            parent_tag: tag.to_string(),
            date: None,
            location: None,
            bank: None,
            raw_text: String::new(),
        }
    }

    #[test]
    fn test_two_category_scenario() {
        let records = vec![
            record("Starbucks", 5.50, "Food & Dining"),
            record("Shell Gas", 40.00, "Transportation"),
        ];
        let h = build_hierarchy(&records);

        let names: Vec<&str> = h.nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Expenses", "Food & Dining", "Starbucks", "Transportation", "Shell Gas"]
        );
        assert_eq!(h.nodes[0].index, 0);
        assert_eq!(h.nodes[2].cost, Some(5.5));
        assert_eq!(h.nodes[4].cost, Some(40.0));

        assert_eq!(h.map.get(&1), Some(&vec![2]));
        assert_eq!(h.map.get(&3), Some(&vec![4]));
    }

    #[test]
    fn test_repeated_category_reuses_index() {
        let records = vec![
            record("Starbucks", 5.50, "Food & Dining"),
            record("Chipotle", 12.00, "Food & Dining"),
            record("Shell Gas", 40.00, "Transportation"),
            record("Dunkin", 3.25, "Food & Dining"),
        ];
        let h = build_hierarchy(&records);

        // Only one "Food & Dining" node
        let food_nodes: Vec<_> = h.nodes.iter().filter(|n| n.name == "Food & Dining").collect();
        assert_eq!(food_nodes.len(), 1);
        assert_eq!(food_nodes[0].index, 1);
        // Children in input order
        assert_eq!(h.map.get(&1), Some(&vec![2, 3, 6]));
        assert_eq!(h.map.get(&4), Some(&vec![5]));
    }

    #[test]
    fn test_deterministic_rebuild() {
        let records = vec![
            record("Netflix", 15.49, "Entertainment & Recreation"),
            record("Uber", 23.10, "Transportation"),
            record("Hulu", 7.99, "Entertainment & Recreation"),
        ];
        let a = build_hierarchy(&records);
        let b = build_hierarchy(&records);
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn test_is_leaf() {
        let records = vec![record("Starbucks", 5.50, "Food & Dining")];
        let h = build_hierarchy(&records);
        assert!(!h.is_leaf(0));
        assert!(!h.is_leaf(1));
        assert!(h.is_leaf(2));
    }

    #[test]
    fn test_empty_input_yields_root_only() {
        let h = build_hierarchy(&[]);
        assert_eq!(h.nodes.len(), 1);
        assert_eq!(h.nodes[0].name, "Expenses");
        assert!(h.map.is_empty());
    }
}
