//! End-to-end pipeline coverage that skips the LLM: aggregator
//! transactions in, serialized {nodes, links} graph out.

use std::io::Write;

use spendflow_core::{build_hierarchy, calculate_links};
use spendflow_ingest::{AggregatorTransaction, read_csv_rows, records_from_aggregator};

fn sample_transactions() -> Vec<AggregatorTransaction> {
    serde_json::from_str(
        r#"[
            {"transaction_id": "t1", "account_id": "chase-1", "name": "Starbucks",
             "amount": 5.50, "date": "2026-01-05",
             "category": ["Food and Drink", "Food & Dining"]},
            {"transaction_id": "t2", "account_id": "chase-1", "name": "Blue Bottle",
             "amount": 7.25, "date": "2026-01-08",
             "category": ["Food and Drink", "Food & Dining"]},
            {"transaction_id": "t3", "account_id": "chase-1", "name": "Shell Gas",
             "amount": 40.00, "date": "2026-01-06",
             "category": ["Travel", "Transportation"]},
            {"transaction_id": "t4", "account_id": "chase-1", "name": "Gas Refund",
             "amount": -10.00, "date": "2026-01-09",
             "category": ["Travel", "Transportation"]}
        ]"#,
    )
    .unwrap()
}

#[test]
fn test_aggregator_to_graph() {
    let records = records_from_aggregator(&sample_transactions());
    assert_eq!(records.len(), 4);

    let hierarchy = build_hierarchy(&records);
    // Root + 2 categories + 4 leaves
    assert_eq!(hierarchy.nodes.len(), 7);
    assert_eq!(hierarchy.nodes[0].name, "Expenses");

    let links = calculate_links(&hierarchy);
    // One edge per leaf plus one root edge per category
    assert_eq!(links.len(), 6);

    // Flow is conserved: root outflow equals the sum of leaf inflows
    let root_total: f64 = links.iter().filter(|l| l.source == 0).map(|l| l.value).sum();
    let leaf_total: f64 = links.iter().filter(|l| l.source != 0).map(|l| l.value).sum();
    assert!((root_total - leaf_total).abs() < 1e-9);
    // Refund magnitude widens the Transportation flow: 40 + 10
    assert!((root_total - 62.8).abs() < 1e-9);
}

#[test]
fn test_graph_serializes_with_expected_shape() {
    let records = records_from_aggregator(&sample_transactions());
    let hierarchy = build_hierarchy(&records);
    let links = calculate_links(&hierarchy);

    let json = serde_json::json!({ "nodes": hierarchy.nodes, "links": links });

    let nodes = json["nodes"].as_array().unwrap();
    assert!(nodes[0]["cost"].is_null() || nodes[0].get("cost").is_none());
    assert_eq!(nodes[2]["cost"], 5.50);
    assert_eq!(nodes[2]["bank"], "chase-1");

    let links = json["links"].as_array().unwrap();
    for link in links {
        assert!(link["color"].as_str().unwrap().starts_with('#'));
        if link["source"] == 0 {
            // Root edges never carry a stroke width
            assert!(link.get("strokeWidth").is_none() || link["strokeWidth"].is_null());
        } else {
            assert!(link["strokeWidth"].as_f64().unwrap() >= 5.0);
        }
    }
}

#[test]
fn test_csv_file_to_rows() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "Date,Description,Amount").unwrap();
    writeln!(file, "01/05/2026,STARBUCKS #1234,5.50").unwrap();
    writeln!(file).unwrap();
    writeln!(file, "01/06/2026,SHELL OIL,40.00").unwrap();
    file.flush().unwrap();

    let rows = read_csv_rows(file.path()).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].field("Amount"), Some("5.50"));
    assert_eq!(rows[1].field("description"), Some("SHELL OIL"));
}
