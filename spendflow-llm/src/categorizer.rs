//! Turn raw statement rows into validated transaction records via the
//! configured LLM.
//!
//! Two extraction paths: a structured batch call (one request per chunk
//! of rows, JSON schema output) and a line-oriented single-row fallback
//! used when a batch response comes back unparseable. Rows whose
//! extraction fails validation are dropped rather than raised; noisy
//! statement data is expected to contain junk.

use std::sync::Mutex;

use serde::Deserialize;
use serde_json::{Value, json};

use spendflow_core::TransactionRecord;
use spendflow_ingest::{RawRow, parse_flexible_date};

use crate::batch::{BatchOptions, process_in_batches};
use crate::error::LlmError;
use crate::provider::{JsonSchema, LlmProvider, LlmResponse};

const SYSTEM_PROMPT: &str = "You are a financial transaction categorization assistant. \
Extract transaction details accurately and consistently.";

/// Pipeline output: validated records plus how many input rows were
/// dropped on the way (kept observable even though callers usually only
/// consume `records`).
#[derive(Debug, Clone)]
pub struct Categorized {
    pub records: Vec<TransactionRecord>,
    pub dropped: usize,
    /// Dollar cost of the provider calls, summed from reported token
    /// usage. Zero for local providers.
    pub estimated_cost: f64,
}

pub struct Categorizer<P> {
    provider: P,
    parent_tags: Vec<String>,
    spent: Mutex<f64>,
}

impl<P: LlmProvider + Sync> Categorizer<P> {
    pub fn new(provider: P, parent_tags: Vec<String>) -> Self {
        Self {
            provider,
            parent_tags,
            spent: Mutex::new(0.0),
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Running dollar total across every call this categorizer has made.
    pub fn estimated_cost(&self) -> f64 {
        self.spent.lock().map(|s| *s).unwrap_or(0.0)
    }

    fn record_usage(&self, response: &LlmResponse) {
        if let Some(usage) = &response.usage
            && let Ok(mut spent) = self.spent.lock()
        {
            *spent += self.provider.calculate_cost(usage);
        }
    }

    /// Categorize every row, batched and rate-limited per `opts`.
    /// `on_progress` receives cumulative (processed, total) row counts.
    pub async fn categorize_all(
        &self,
        rows: Vec<RawRow>,
        opts: &BatchOptions,
        on_progress: impl Fn(usize, usize),
    ) -> Result<Categorized, LlmError> {
        let total = rows.len();
        let spent_before = self.estimated_cost();
        let records = process_in_batches(rows, opts, on_progress, |chunk, index| {
            self.categorize_batch(chunk, index)
        })
        .await?;

        // Usually one record per row, so the difference is the drop count.
        // Saturate because a provider can hallucinate extra objects that
        // pass validation, yielding more records than input rows.
        let dropped = total.saturating_sub(records.len());
        Ok(Categorized {
            records,
            dropped,
            estimated_cost: self.estimated_cost() - spent_before,
        })
    }

    /// One structured call for a chunk of rows. Falls back to per-row
    /// extraction when the response is not the JSON we asked for.
    pub async fn categorize_batch(
        &self,
        rows: Vec<RawRow>,
        _batch_index: usize,
    ) -> Result<Vec<TransactionRecord>, LlmError> {
        let prompt = self.batch_prompt(&rows);
        let response = self
            .provider
            .complete_with_schema(&prompt, &batch_schema(), Some(SYSTEM_PROMPT))
            .await?;
        self.record_usage(&response);

        let payload: BatchPayload = match serde_json::from_str(response.content.trim()) {
            Ok(payload) => payload,
            Err(_) => return self.categorize_rows_individually(&rows).await,
        };

        let records = payload
            .transactions
            .into_iter()
            .filter_map(|txn| {
                let record = txn.into_record(&rows);
                record.is_valid().then_some(record)
            })
            .collect();
        Ok(records)
    }

    async fn categorize_rows_individually(
        &self,
        rows: &[RawRow],
    ) -> Result<Vec<TransactionRecord>, LlmError> {
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(record) = self.categorize_row(row).await? {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Single-row extraction: free-text response parsed as `key: value`
    /// lines. Returns `None` when the extracted record fails validation.
    pub async fn categorize_row(
        &self,
        row: &RawRow,
    ) -> Result<Option<TransactionRecord>, LlmError> {
        let raw_text = row.raw_text();
        let prompt = self.single_row_prompt(&raw_text);
        let response = self.provider.complete(&prompt, Some(SYSTEM_PROMPT)).await?;
        self.record_usage(&response);

        let record = parse_field_lines(&response.content, raw_text);
        Ok(record.is_valid().then_some(record))
    }

    fn single_row_prompt(&self, raw_text: &str) -> String {
        format!(
            "Here is a single transaction record:\n\n\
             {raw_text}\n\n\
             From this record, extract the following details and return them in the exact format shown.\n\
             The name should be a concise version of what the transaction is.\n\
             Choose the best parent tag for this transaction from this list ONLY: {tags}\n\
             Extract the merchant location/address if available.\n\n\
             IMPORTANT: provide every field. If one is not available, use a reasonable default:\n\
             - if no index is provided, use \"0\"\n\
             - cost must be a positive number\n\
             - always choose a parenttag from the provided list\n\n\
             name: <item name>\n\
             cost: <item price as a number>\n\
             index: <index of the transaction or 0>\n\
             parenttag: <category from the parent tag list>\n\
             date: <transaction date>\n\
             location: <merchant location or \"Unknown\">\n\
             bank: <financial institution or \"Unknown\">\n\n\
             Note: if the transaction is a credit card payment, the parenttag should be \"Credit Card Payments\".",
            tags = self.parent_tags.join(", "),
        )
    }

    fn batch_prompt(&self, rows: &[RawRow]) -> String {
        // Compact form keeps token usage down on large chunks
        let compact: Vec<Value> = rows
            .iter()
            .enumerate()
            .map(|(i, row)| json!({ "i": i, "d": row.raw_text() }))
            .collect();

        format!(
            "Process {count} transactions. Extract for each:\n\n\
             Categories (choose one): {tags}\n\n\
             Transactions:\n{data}\n\n\
             Extract:\n\
             - name: concise merchant name\n\
             - price: positive number\n\
             - date: transaction date\n\
             - parenttag: category from the list above\n\
             - index: from input 'i'\n\
             - location: merchant location or \"Unknown\"\n\
             - bank: financial institution from the data or \"Unknown\"\n\n\
             Return all {count} transactions with every field present.",
            count = rows.len(),
            tags = self.parent_tags.join(", "),
            data = Value::Array(compact),
        )
    }
}

/// Schema for the batch extraction response.
fn batch_schema() -> JsonSchema {
    JsonSchema {
        name: "transactions_list".to_string(),
        strict: true,
        schema: json!({
            "type": "object",
            "properties": {
                "transactions": {
                    "type": "array",
                    "description": "A list of transactions.",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": { "type": "string", "description": "The name of the transaction." },
                            "price": { "type": "number", "description": "The cost of the transaction." },
                            "date": { "type": "string", "description": "The date of the transaction." },
                            "parenttag": { "type": "string", "description": "The parent tag from the provided list." },
                            "index": { "type": "number", "description": "The index of the transaction." },
                            "location": { "type": "string", "description": "The location or merchant address." },
                            "bank": { "type": "string", "description": "The bank or financial institution name." }
                        },
                        "required": ["name", "price", "date", "parenttag", "index", "location", "bank"],
                        "additionalProperties": false
                    }
                }
            },
            "required": ["transactions"],
            "additionalProperties": false
        }),
    }
}

#[derive(Debug, Deserialize)]
struct BatchPayload {
    #[serde(default)]
    transactions: Vec<ExtractedTransaction>,
}

/// One object from the batch response. Everything is lenient here; the
/// validity predicate decides what survives.
#[derive(Debug, Deserialize)]
struct ExtractedTransaction {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    price: Option<Value>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    parenttag: Option<String>,
    #[serde(default)]
    index: Option<Value>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    bank: Option<String>,
}

impl ExtractedTransaction {
    fn into_record(self, rows: &[RawRow]) -> TransactionRecord {
        let cost = self
            .price
            .as_ref()
            .and_then(parse_amount_value)
            .map(f64::abs)
            .unwrap_or(f64::NAN);

        // 'index' echoes the input position; recover the raw row from it
        let row_position = self.index.as_ref().and_then(|v| v.as_u64());
        let raw_text = row_position
            .and_then(|i| rows.get(i as usize))
            .map(RawRow::raw_text)
            .unwrap_or_default();

        TransactionRecord {
            name: self.name.unwrap_or_default().trim().to_string(),
            cost,
            index: match self.index {
                Some(Value::Number(n)) => n.to_string(),
                Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
                _ => "0".to_string(),
            },
            parent_tag: self.parenttag.unwrap_or_default().trim().to_string(),
            date: self.date.as_deref().and_then(parse_flexible_date),
            location: normalize_optional(self.location),
            bank: normalize_optional(self.bank),
            raw_text,
        }
    }
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && s != "Unknown" && s != "None")
}

/// Accept numbers or currency-formatted strings ("$1,234.56").
fn parse_amount_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.replace(['$', ','], "").trim().parse().ok(),
        _ => None,
    }
}

/// Parse a free-text completion as `key: value` lines, case-insensitive
/// keys, ignoring any commentary around the required lines.
fn parse_field_lines(content: &str, raw_text: String) -> TransactionRecord {
    let mut record = TransactionRecord {
        name: String::new(),
        cost: f64::NAN,
        index: "0".to_string(),
        parent_tag: String::new(),
        date: None,
        location: None,
        bank: None,
        raw_text,
    };

    for line in content.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim().to_lowercase().as_str() {
            "name" => record.name = value.to_string(),
            "cost" => {
                if let Ok(parsed) = value.replace(['$', ','], "").parse::<f64>() {
                    record.cost = parsed.abs();
                }
            }
            "index" => {
                if !value.is_empty() {
                    record.index = value.to_string();
                }
            }
            "parenttag" => record.parent_tag = value.to_string(),
            "date" => record.date = parse_flexible_date(value),
            "location" => record.location = normalize_optional(Some(value.to_string())),
            "bank" => record.bank = normalize_optional(Some(value.to_string())),
            _ => {}
        }
    }

    record
}
