//! Normalized transaction records, independent of source (CSV row,
//! PDF-extracted row, or aggregator sync).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One spend event after categorization.
///
/// Records are built by the categorizer (or directly from aggregator
/// category hints), validated once, and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Concise merchant/description name
    pub name: String,
    /// Non-negative amount
    pub cost: f64,
    /// Source-assigned identifier ("0" when the source has none)
    pub index: String,
    /// Parent category label, drawn from the caller-supplied tag list
    pub parent_tag: String,
    pub date: Option<NaiveDate>,
    pub location: Option<String>,
    pub bank: Option<String>,
    /// Original row serialized, kept only as LLM input / audit trail
    #[serde(default)]
    pub raw_text: String,
}

impl TransactionRecord {
    /// Validity predicate applied before a record enters the pipeline.
    ///
    /// A failing record is filtered out of its batch, not raised as an
    /// error: statement data is noisy and junk rows (headers, blanks,
    /// mangled extractions) are expected.
    pub fn is_valid(&self) -> bool {
        !self.name.trim().is_empty()
            && self.cost.is_finite()
            && self.cost >= 0.0
            && !self.index.trim().is_empty()
            && !self.parent_tag.trim().is_empty()
    }
}
