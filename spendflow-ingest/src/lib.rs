//! spendflow-ingest: raw statement rows from their various sources
//! (CSV uploads, PDF text extraction, aggregator sync payloads),
//! normalized enough for the categorization pipeline to consume.

pub mod csv_rows;
pub mod types;

pub use csv_rows::{read_csv_rows, read_csv_rows_from_reader};
pub use types::{AggregatorTransaction, RawRow, parse_flexible_date, records_from_aggregator};
