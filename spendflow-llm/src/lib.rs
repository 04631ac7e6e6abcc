//! spendflow-llm: LLM-backed transaction categorization.
//!
//! A provider-agnostic completion layer (OpenAI, Anthropic, Ollama, and
//! OpenAI-compatible endpoints), the categorizer that turns raw rows into
//! validated [`spendflow_core::TransactionRecord`]s, and the batch
//! orchestrator that keeps large uploads inside provider rate limits.

pub mod anthropic;
pub mod batch;
pub mod categorizer;
pub mod error;
pub mod ollama;
pub mod openai;
pub mod provider;

pub use batch::{BatchOptions, process_in_batches, retry_with_backoff};
pub use categorizer::{Categorized, Categorizer};
pub use error::LlmError;
pub use provider::{
    AnyProvider, JsonSchema, LlmProvider, LlmResponse, ProviderConfig, ProviderKind, TokenUsage,
};
