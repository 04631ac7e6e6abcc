//! Anthropic messages backend. No native structured output, so schema
//! extraction is prompt-engineered.

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::provider::{JsonSchema, LlmProvider, LlmResponse, TokenUsage};

#[derive(Serialize)]
struct MessageIn<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<MessageIn<'a>>,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

#[derive(Deserialize)]
struct WireUsage {
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
}

pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl AnthropicProvider {
    pub fn new(
        client: reqwest::Client,
        api_key: String,
        model: String,
        temperature: f32,
        max_tokens: u32,
    ) -> Self {
        Self {
            client,
            api_key,
            model,
            temperature,
            // Anthropic caps max_tokens well below OpenAI's
            max_tokens: max_tokens.min(8192),
        }
    }
}

impl LlmProvider for AnthropicProvider {
    async fn complete(&self, prompt: &str, system: Option<&str>) -> Result<LlmResponse, LlmError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system,
            messages: vec![MessageIn {
                role: "user",
                content: prompt,
            }],
        };

        let resp = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::http(status.as_u16(), body));
        }

        let out: MessagesResponse = resp.json().await?;
        let mut content = String::new();
        for block in out.content {
            if block.kind == "text"
                && let Some(text) = block.text
            {
                content.push_str(&text);
            }
        }

        Ok(LlmResponse {
            content: content.trim().to_string(),
            usage: out.usage.map(|u| {
                let prompt_tokens = u.input_tokens.unwrap_or(0);
                let completion_tokens = u.output_tokens.unwrap_or(0);
                TokenUsage {
                    prompt_tokens,
                    completion_tokens,
                    total_tokens: prompt_tokens + completion_tokens,
                }
            }),
        })
    }

    async fn complete_with_schema(
        &self,
        prompt: &str,
        schema: &JsonSchema,
        system: Option<&str>,
    ) -> Result<LlmResponse, LlmError> {
        self.complete(&schema.append_to_prompt(prompt), system).await
    }

    fn calculate_cost(&self, usage: &TokenUsage) -> f64 {
        // Claude Sonnet pricing: $3/M input, $15/M output
        const INPUT_COST: f64 = 3.0 / 1_000_000.0;
        const OUTPUT_COST: f64 = 15.0 / 1_000_000.0;
        usage.prompt_tokens as f64 * INPUT_COST + usage.completion_tokens as f64 * OUTPUT_COST
    }

    async fn test_connection(&self) -> bool {
        self.complete("Hello", Some("Respond with 'OK'")).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anthropic_cost() {
        let provider = AnthropicProvider::new(
            reqwest::Client::new(),
            "key".to_string(),
            "claude-3-5-sonnet-latest".to_string(),
            0.2,
            4096,
        );
        let usage = TokenUsage {
            prompt_tokens: 1_000_000,
            completion_tokens: 1_000_000,
            total_tokens: 2_000_000,
        };
        assert!((provider.calculate_cost(&usage) - 18.0).abs() < 1e-9);
    }

    #[test]
    fn test_max_tokens_clamped() {
        let provider = AnthropicProvider::new(
            reqwest::Client::new(),
            "key".to_string(),
            "claude-3-5-sonnet-latest".to_string(),
            0.2,
            16000,
        );
        assert_eq!(provider.max_tokens, 8192);
    }
}
