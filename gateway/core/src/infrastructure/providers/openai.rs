// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// OpenAI-compatible provider adapter
//
// Also works with OpenAI-compatible APIs (Groq, LM Studio, vLLM, etc.).

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::decision::GatewayError;
use crate::domain::message::{ChatMessage, ChatRequest, ChatResponse, TokenUsage};

use super::{ChatProvider, UpstreamResponse};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct WireRequest {
    model: String,
    #[serde(default)]
    messages: Vec<ChatMessage>,
    #[serde(default)]
    temperature: Option<f32>,
    #[serde(default)]
    max_tokens: Option<u32>,
    #[serde(default)]
    stream: bool,
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: WireUsage,
}

#[derive(Deserialize)]
struct WireChoice {
    message: ChatMessage,
}

#[derive(Deserialize, Default)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

impl OpenAiProvider {
    pub fn new(base_url: String, api_key: String, timeout: Duration) -> Self {
        let base_url = if base_url.is_empty() {
            DEFAULT_BASE_URL.to_string()
        } else {
            base_url
        };
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            base_url,
            api_key,
        }
    }
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    fn parse_request(&self, body: &[u8]) -> Result<ChatRequest, GatewayError> {
        let wire: WireRequest = serde_json::from_slice(body)
            .map_err(|e| GatewayError::InvalidRequest(e.to_string()))?;
        Ok(ChatRequest {
            model: wire.model,
            messages: wire.messages,
            temperature: wire.temperature,
            max_tokens: wire.max_tokens,
            stream: wire.stream,
        })
    }

    fn parse_response(&self, body: &[u8]) -> Result<ChatResponse, GatewayError> {
        let wire: WireResponse = serde_json::from_slice(body)
            .map_err(|e| GatewayError::Provider(format!("failed to parse response: {e}")))?;
        Ok(ChatResponse {
            model: wire.model,
            contents: wire.choices.into_iter().map(|c| c.message.content).collect(),
            usage: TokenUsage {
                prompt_tokens: wire.usage.prompt_tokens,
                completion_tokens: wire.usage.completion_tokens,
                total_tokens: wire.usage.total_tokens,
            },
        })
    }

    async fn forward(&self, path: &str, body: Vec<u8>) -> Result<UpstreamResponse, GatewayError> {
        let url = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );

        let mut request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .body(body);
        if !self.api_key.is_empty() {
            request = request.header("Authorization", format!("Bearer {}", self.api_key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::Provider(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| GatewayError::Provider(e.to_string()))?
            .to_vec();

        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }
}
