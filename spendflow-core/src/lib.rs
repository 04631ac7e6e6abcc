//! spendflow-core: data model and pure transformations for the spend pipeline
//!
//! Categorized transactions flow in, a two-level Sankey graph flows out.
//! Nothing in this crate does I/O or suspends; the LLM and network side
//! lives in spendflow-llm.

pub mod flow;
pub mod hierarchy;
pub mod recurring;
pub mod transaction;

pub use flow::{FIXED_COLORS, SankeyLink, calculate_links, round1};
pub use hierarchy::{ParentChildMap, SankeyHierarchy, SankeyNode, build_hierarchy};
pub use recurring::{Frequency, RecurringGroup, detect_recurring, find_group_for};
pub use transaction::TransactionRecord;
