//! Provider-agnostic completion interface and the factory that picks a
//! concrete backend from configuration.
//!
//! Which provider runs is purely a config decision; the categorizer and
//! orchestrator only ever see the [`LlmProvider`] capability set.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::anthropic::AnthropicProvider;
use crate::error::LlmError;
use crate::ollama::OllamaProvider;
use crate::openai::{OpenAiCompatProvider, OpenAiProvider};

/// Token counts reported by a hosted provider, used for cost estimation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// Normalized completion result. Local providers report no usage.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub usage: Option<TokenUsage>,
}

/// JSON schema for structured extraction. Hosted-schema-native providers
/// enforce it server-side; the rest get it appended to the prompt.
#[derive(Debug, Clone, Serialize)]
pub struct JsonSchema {
    pub name: String,
    pub strict: bool,
    pub schema: Value,
}

impl JsonSchema {
    /// Textual fallback for providers without native schema enforcement.
    pub fn append_to_prompt(&self, prompt: &str) -> String {
        format!(
            "{prompt}\n\nYou MUST respond with valid JSON that matches this exact schema:\n{}\n\nRespond ONLY with the JSON object, no additional text.",
            serde_json::to_string_pretty(&self.schema).unwrap_or_default()
        )
    }
}

/// Capability set every backend exposes. Dispatch goes through
/// [`AnyProvider`], so implementations stay free of boxing.
pub trait LlmProvider {
    fn complete(
        &self,
        prompt: &str,
        system: Option<&str>,
    ) -> impl Future<Output = Result<LlmResponse, LlmError>> + Send;

    fn complete_with_schema(
        &self,
        prompt: &str,
        schema: &JsonSchema,
        system: Option<&str>,
    ) -> impl Future<Output = Result<LlmResponse, LlmError>> + Send;

    /// Dollar cost of one call; zero for self-hosted models.
    fn calculate_cost(&self, usage: &TokenUsage) -> f64;

    fn test_connection(&self) -> impl Future<Output = bool> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    Ollama,
    LmStudio,
    Custom,
}

impl ProviderKind {
    pub fn parse(s: &str) -> Result<Self, LlmError> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "anthropic" => Ok(ProviderKind::Anthropic),
            "ollama" => Ok(ProviderKind::Ollama),
            "lmstudio" => Ok(ProviderKind::LmStudio),
            "custom" => Ok(ProviderKind::Custom),
            other => Err(LlmError::MissingConfig(format!(
                "unsupported provider: {other}"
            ))),
        }
    }
}

/// Everything needed to construct a provider. API keys are credentials,
/// never serialized.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ProviderConfig {
    pub fn new(kind: ProviderKind, model: impl Into<String>) -> Self {
        Self {
            kind,
            model: model.into(),
            api_key: None,
            base_url: None,
            temperature: 0.2,
            max_tokens: 16000,
        }
    }

    /// Read the provider selection from the environment: `LLM_PROVIDER`,
    /// `LLM_MODEL`, plus the key/URL variable the chosen provider needs.
    pub fn from_env() -> Result<Self, LlmError> {
        let kind = ProviderKind::parse(
            &std::env::var("LLM_PROVIDER").unwrap_or_else(|_| "openai".to_string()),
        )?;
        let model = std::env::var("LLM_MODEL").unwrap_or_else(|_| default_model(kind).to_string());

        let mut config = ProviderConfig::new(kind, model);
        config.api_key = match kind {
            ProviderKind::OpenAi => std::env::var("OPENAI_API_KEY").ok(),
            ProviderKind::Anthropic => std::env::var("ANTHROPIC_API_KEY").ok(),
            ProviderKind::Custom => std::env::var("CUSTOM_LLM_API_KEY").ok(),
            ProviderKind::Ollama | ProviderKind::LmStudio => None,
        };
        config.base_url = match kind {
            ProviderKind::Ollama => Some(
                std::env::var("OLLAMA_BASE_URL")
                    .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            ),
            ProviderKind::LmStudio => Some(
                std::env::var("LMSTUDIO_BASE_URL")
                    .unwrap_or_else(|_| "http://localhost:1234/v1".to_string()),
            ),
            ProviderKind::Custom => Some(std::env::var("CUSTOM_LLM_BASE_URL").map_err(|_| {
                LlmError::MissingConfig("CUSTOM_LLM_BASE_URL not set".to_string())
            })?),
            _ => None,
        };
        Ok(config)
    }

    /// Construct the concrete provider, failing fast when credentials are
    /// missing. There is deliberately no fallback to another provider.
    pub fn build(self) -> Result<AnyProvider, LlmError> {
        let client = reqwest::Client::new();
        match self.kind {
            ProviderKind::OpenAi => {
                let api_key = self.api_key.ok_or_else(|| {
                    LlmError::MissingConfig("OpenAI provider selected but no API key set".into())
                })?;
                Ok(AnyProvider::OpenAi(OpenAiProvider::new(
                    client,
                    api_key,
                    self.model,
                    self.temperature,
                    self.max_tokens,
                )))
            }
            ProviderKind::Anthropic => {
                let api_key = self.api_key.ok_or_else(|| {
                    LlmError::MissingConfig("Anthropic provider selected but no API key set".into())
                })?;
                Ok(AnyProvider::Anthropic(AnthropicProvider::new(
                    client,
                    api_key,
                    self.model,
                    self.temperature,
                    self.max_tokens,
                )))
            }
            ProviderKind::Ollama => {
                let base_url = self
                    .base_url
                    .unwrap_or_else(|| "http://localhost:11434".to_string());
                Ok(AnyProvider::Ollama(OllamaProvider::new(
                    client,
                    base_url,
                    self.model,
                    self.temperature,
                    self.max_tokens,
                )))
            }
            ProviderKind::LmStudio | ProviderKind::Custom => {
                let base_url = self.base_url.ok_or_else(|| {
                    LlmError::MissingConfig(
                        "OpenAI-compatible provider selected but no base URL set".into(),
                    )
                })?;
                Ok(AnyProvider::Compat(OpenAiCompatProvider::new(
                    client,
                    base_url,
                    self.api_key,
                    self.model,
                    self.temperature,
                    self.max_tokens,
                )))
            }
        }
    }
}

fn default_model(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::OpenAi => "gpt-4o-mini",
        ProviderKind::Anthropic => "claude-3-5-sonnet-latest",
        ProviderKind::Ollama => "llama3.2",
        ProviderKind::LmStudio => "local-model",
        ProviderKind::Custom => "default",
    }
}

/// Static dispatch over the configured backend.
pub enum AnyProvider {
    OpenAi(OpenAiProvider),
    Anthropic(AnthropicProvider),
    Ollama(OllamaProvider),
    Compat(OpenAiCompatProvider),
}

// Variant name only: provider structs hold API keys, which must never
// reach log output
impl std::fmt::Debug for AnyProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AnyProvider::OpenAi(_) => "OpenAi",
            AnyProvider::Anthropic(_) => "Anthropic",
            AnyProvider::Ollama(_) => "Ollama",
            AnyProvider::Compat(_) => "Compat",
        };
        f.debug_tuple(name).finish()
    }
}

impl LlmProvider for AnyProvider {
    async fn complete(&self, prompt: &str, system: Option<&str>) -> Result<LlmResponse, LlmError> {
        match self {
            AnyProvider::OpenAi(p) => p.complete(prompt, system).await,
            AnyProvider::Anthropic(p) => p.complete(prompt, system).await,
            AnyProvider::Ollama(p) => p.complete(prompt, system).await,
            AnyProvider::Compat(p) => p.complete(prompt, system).await,
        }
    }

    async fn complete_with_schema(
        &self,
        prompt: &str,
        schema: &JsonSchema,
        system: Option<&str>,
    ) -> Result<LlmResponse, LlmError> {
        match self {
            AnyProvider::OpenAi(p) => p.complete_with_schema(prompt, schema, system).await,
            AnyProvider::Anthropic(p) => p.complete_with_schema(prompt, schema, system).await,
            AnyProvider::Ollama(p) => p.complete_with_schema(prompt, schema, system).await,
            AnyProvider::Compat(p) => p.complete_with_schema(prompt, schema, system).await,
        }
    }

    fn calculate_cost(&self, usage: &TokenUsage) -> f64 {
        match self {
            AnyProvider::OpenAi(p) => p.calculate_cost(usage),
            AnyProvider::Anthropic(p) => p.calculate_cost(usage),
            AnyProvider::Ollama(p) => p.calculate_cost(usage),
            AnyProvider::Compat(p) => p.calculate_cost(usage),
        }
    }

    async fn test_connection(&self) -> bool {
        match self {
            AnyProvider::OpenAi(p) => p.test_connection().await,
            AnyProvider::Anthropic(p) => p.test_connection().await,
            AnyProvider::Ollama(p) => p.test_connection().await,
            AnyProvider::Compat(p) => p.test_connection().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_parse() {
        assert_eq!(ProviderKind::parse("openai").unwrap(), ProviderKind::OpenAi);
        assert_eq!(ProviderKind::parse(" Anthropic ").unwrap(), ProviderKind::Anthropic);
        assert!(ProviderKind::parse("bard").is_err());
    }

    #[test]
    fn test_build_requires_credentials() {
        let err = ProviderConfig::new(ProviderKind::OpenAi, "gpt-4o-mini")
            .build()
            .unwrap_err();
        assert!(matches!(err, LlmError::MissingConfig(_)));

        let err = ProviderConfig::new(ProviderKind::Custom, "default")
            .build()
            .unwrap_err();
        assert!(matches!(err, LlmError::MissingConfig(_)));
    }

    #[test]
    fn test_ollama_needs_no_credentials() {
        assert!(ProviderConfig::new(ProviderKind::Ollama, "llama3.2").build().is_ok());
    }

    #[test]
    fn test_debug_never_prints_credentials() {
        let mut config = ProviderConfig::new(ProviderKind::OpenAi, "gpt-4o-mini");
        config.api_key = Some("sk-very-secret".to_string());
        let provider = config.build().unwrap();
        let rendered = format!("{provider:?}");
        assert!(rendered.contains("OpenAi"));
        assert!(!rendered.contains("sk-very-secret"));
    }

    #[test]
    fn test_schema_append_to_prompt() {
        let schema = JsonSchema {
            name: "thing".to_string(),
            strict: true,
            schema: serde_json::json!({"type": "object"}),
        };
        let out = schema.append_to_prompt("Categorize this.");
        assert!(out.starts_with("Categorize this."));
        assert!(out.contains("\"type\": \"object\""));
        assert!(out.contains("ONLY with the JSON object"));
    }
}
