//! Ollama backend for local models. Zero cost, prompt-engineered schema,
//! connection probe against the tags endpoint.

use serde::{Deserialize, Serialize};

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
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: Option<MessageOut>,
}

#[derive(Deserialize)]
struct MessageOut {
    content: Option<String>,
}

pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OllamaProvider {
    pub fn new(
        client: reqwest::Client,
        base_url: String,
        model: String,
        temperature: f32,
        max_tokens: u32,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            temperature,
            max_tokens,
        }
    }
}

impl LlmProvider for OllamaProvider {
    async fn complete(&self, prompt: &str, system: Option<&str>) -> Result<LlmResponse, LlmError> {
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

        let body = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
            options: ChatOptions {
                temperature: self.temperature,
                num_predict: self.max_tokens,
            },
        };

        let resp = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::http(status.as_u16(), body));
        }

        let out: ChatResponse = resp.json().await?;
        Ok(LlmResponse {
            content: out.message.and_then(|m| m.content).unwrap_or_default(),
            usage: None,
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

    fn calculate_cost(&self, _usage: &TokenUsage) -> f64 {
        0.0
    }

    async fn test_connection(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }
}
