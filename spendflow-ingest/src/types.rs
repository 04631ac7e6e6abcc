//! Source-kind variants for one raw transaction row.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use spendflow_core::TransactionRecord;

/// One raw row, tagged by where it came from. Everything converges on
/// [`TransactionRecord`] after categorization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RawRow {
    /// A CSV row as ordered header/value pairs (columns vary by bank)
    Csv { fields: Vec<(String, String)> },
    /// A row recovered from statement PDF text by the extraction step
    PdfExtracted {
        date: String,
        description: String,
        amount: f64,
    },
    /// An already-fetched aggregator transaction
    Aggregator(AggregatorTransaction),
}

impl RawRow {
    /// Serialize the row to the opaque string handed to the LLM.
    pub fn raw_text(&self) -> String {
        match self {
            RawRow::Csv { fields } => {
                let mut out = String::from("{");
                for (i, (key, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(&Value::String(key.clone()).to_string());
                    out.push_str(": ");
                    out.push_str(&Value::String(value.clone()).to_string());
                }
                out.push('}');
                out
            }
            RawRow::PdfExtracted {
                date,
                description,
                amount,
            } => format!(
                "{{\"Date\": {}, \"Description\": {}, \"Amount\": {amount}}}",
                Value::String(date.clone()),
                Value::String(description.clone()),
            ),
            RawRow::Aggregator(txn) => serde_json::to_string(txn).unwrap_or_default(),
        }
    }

    /// Look up a CSV field by case-insensitive header name.
    pub fn field(&self, name: &str) -> Option<&str> {
        match self {
            RawRow::Csv { fields } => fields
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }
}

/// Transaction shape at the aggregator sync boundary (Plaid/Teller-like).
/// Every field is optional; the wire protocol itself is out of scope.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AggregatorTransaction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iso_currency_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default)]
    pub pending: bool,
    /// Category hints, broadest first (aggregators ship their own taxonomy)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub category: Vec<String>,
}

/// Parse the date formats that show up in statements and LLM output.
pub fn parse_flexible_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    // %y before %Y: chrono's %Y accepts two digits, so "01/05/26" would
    // otherwise parse as year 26
    for fmt in ["%Y-%m-%d", "%m/%d/%y", "%m/%d/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    // Tolerate a timestamp suffix (aggregators sometimes send full ISO)
    s.get(..10).and_then(|p| NaiveDate::parse_from_str(p, "%Y-%m-%d").ok())
}

/// Convert aggregator transactions that already carry category hints into
/// records directly, bypassing the LLM. The most specific (last) hint wins;
/// rows without hints land in "Uncategorized". Non-finite amounts are
/// dropped.
pub fn records_from_aggregator(transactions: &[AggregatorTransaction]) -> Vec<TransactionRecord> {
    transactions
        .iter()
        .enumerate()
        .filter(|(_, t)| t.amount.is_some_and(f64::is_finite))
        .map(|(i, t)| {
            let parent_tag = t
                .category
                .iter()
                .rev()
                .find(|c| !c.trim().is_empty())
                .cloned()
                .unwrap_or_else(|| "Uncategorized".to_string());
            let name = t
                .name
                .clone()
                .or_else(|| t.merchant_name.clone())
                .unwrap_or_else(|| format!("Transaction {}", i + 1));

            TransactionRecord {
                raw_text: serde_json::to_string(t).unwrap_or_default(),
                cost: t.amount.unwrap_or(0.0).abs(),
                index: t
                    .transaction_id
                    .clone()
                    .unwrap_or_else(|| (i + 1).to_string()),
                parent_tag,
                date: t.date.as_deref().and_then(parse_flexible_date),
                location: t.merchant_name.clone().or_else(|| t.name.clone()),
                bank: t.account_id.clone(),
                name,
            }
        })
        .collect()
}
