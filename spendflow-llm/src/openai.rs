//! OpenAI chat-completions backend, plus the OpenAI-compatible variant
//! used for LM Studio and custom self-hosted endpoints.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::LlmError;
use crate::provider::{JsonSchema, LlmProvider, LlmResponse, TokenUsage};

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageOut,
}

#[derive(Deserialize)]
struct MessageOut {
    content: Option<String>,
}

#[derive(Deserialize)]
struct WireUsage {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
    total_tokens: Option<u64>,
}

impl WireUsage {
    fn normalize(self) -> TokenUsage {
        TokenUsage {
            prompt_tokens: self.prompt_tokens.unwrap_or(0),
            completion_tokens: self.completion_tokens.unwrap_or(0),
            total_tokens: self.total_tokens.unwrap_or(0),
        }
    }
}

fn build_messages<'a>(prompt: &'a str, system: Option<&'a str>) -> Vec<ChatMessage<'a>> {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = system {
        messages.push(ChatMessage {
            role: "system",
            content: system,
        });
    }
    messages.push(ChatMessage {
        role: "user",
        content: prompt,
    });
    messages
}

async fn read_chat_response(resp: reqwest::Response) -> Result<LlmResponse, LlmError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(LlmError::http(status.as_u16(), body));
    }
    let out: ChatResponse = resp.json().await?;
    Ok(LlmResponse {
        content: out
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default(),
        usage: out.usage.map(WireUsage::normalize),
    })
}

/// Hosted OpenAI. The only backend with native JSON-schema enforcement.
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiProvider {
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
            max_tokens,
        }
    }

    async fn chat(
        &self,
        prompt: &str,
        system: Option<&str>,
        response_format: Option<Value>,
    ) -> Result<LlmResponse, LlmError> {
        let body = ChatRequest {
            model: &self.model,
            messages: build_messages(prompt, system),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            response_format,
        };
        let resp = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        read_chat_response(resp).await
    }
}

impl LlmProvider for OpenAiProvider {
    async fn complete(&self, prompt: &str, system: Option<&str>) -> Result<LlmResponse, LlmError> {
        self.chat(prompt, system, None).await
    }

    async fn complete_with_schema(
        &self,
        prompt: &str,
        schema: &JsonSchema,
        system: Option<&str>,
    ) -> Result<LlmResponse, LlmError> {
        let format = json!({
            "type": "json_schema",
            "json_schema": schema,
        });
        self.chat(prompt, system, Some(format)).await
    }

    fn calculate_cost(&self, usage: &TokenUsage) -> f64 {
        // gpt-4o-mini pricing: $0.15/M input, $0.60/M output
        const INPUT_COST: f64 = 0.15 / 1_000_000.0;
        const OUTPUT_COST: f64 = 0.60 / 1_000_000.0;
        usage.prompt_tokens as f64 * INPUT_COST + usage.completion_tokens as f64 * OUTPUT_COST
    }

    async fn test_connection(&self) -> bool {
        self.complete("Hello", Some("Respond with 'OK'")).await.is_ok()
    }
}

/// Any endpoint speaking the OpenAI chat wire shape (LM Studio, vLLM,
/// proxies). Schema support is not assumed, so structured extraction goes
/// through the prompt.
pub struct OpenAiCompatProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiCompatProvider {
    pub fn new(
        client: reqwest::Client,
        base_url: String,
        api_key: Option<String>,
        model: String,
        temperature: f32,
        max_tokens: u32,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            temperature,
            max_tokens,
        }
    }
}

impl LlmProvider for OpenAiCompatProvider {
    async fn complete(&self, prompt: &str, system: Option<&str>) -> Result<LlmResponse, LlmError> {
        let body = ChatRequest {
            model: &self.model,
            messages: build_messages(prompt, system),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            response_format: None,
        };
        let mut req = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        read_chat_response(req.send().await?).await
    }

    async fn complete_with_schema(
        &self,
        prompt: &str,
        schema: &JsonSchema,
        system: Option<&str>,
    ) -> Result<LlmResponse, LlmError> {
        self.complete(&schema.append_to_prompt(prompt), system).await
    }

    fn calculate_cost(&self, _usage: &TokenUsage) -> f64 {
        // Self-hosted: no metered cost
        0.0
    }

    async fn test_connection(&self) -> bool {
        let url = format!("{}/models", self.base_url);
        match self.client.get(url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_cost() {
        let provider = OpenAiProvider::new(
            reqwest::Client::new(),
            "key".to_string(),
            "gpt-4o-mini".to_string(),
            0.2,
            16000,
        );
        let usage = TokenUsage {
            prompt_tokens: 1_000_000,
            completion_tokens: 1_000_000,
            total_tokens: 2_000_000,
        };
        assert!((provider.calculate_cost(&usage) - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_compat_cost_is_zero() {
        let provider = OpenAiCompatProvider::new(
            reqwest::Client::new(),
            "http://localhost:1234/v1/".to_string(),
            None,
            "local-model".to_string(),
            0.2,
            16000,
        );
        assert_eq!(provider.base_url, "http://localhost:1234/v1");
        let usage = TokenUsage {
            prompt_tokens: 500,
            completion_tokens: 500,
            total_tokens: 1000,
        };
        assert_eq!(provider.calculate_cost(&usage), 0.0);
    }
}
