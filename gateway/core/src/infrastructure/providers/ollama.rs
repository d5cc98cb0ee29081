// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Ollama provider adapter
//
// Supports air-gapped deployments with local models.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::decision::GatewayError;
use crate::domain::message::{ChatMessage, ChatRequest, ChatResponse, TokenUsage};

use super::{ChatProvider, UpstreamResponse};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";

pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct WireRequest {
    model: String,
    #[serde(default)]
    messages: Vec<ChatMessage>,
    #[serde(default)]
    stream: bool,
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    model: String,
    message: ChatMessage,
    #[serde(default)]
    prompt_eval_count: u32,
    #[serde(default)]
    eval_count: u32,
}

impl OllamaProvider {
    pub fn new(base_url: String, timeout: Duration) -> Self {
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
        }
    }
}

#[async_trait]
impl ChatProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
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
            temperature: None,
            max_tokens: None,
            stream: wire.stream,
        })
    }

    fn parse_response(&self, body: &[u8]) -> Result<ChatResponse, GatewayError> {
        let wire: WireResponse = serde_json::from_slice(body)
            .map_err(|e| GatewayError::Provider(format!("failed to parse response: {e}")))?;
        Ok(ChatResponse {
            model: wire.model,
            contents: vec![wire.message.content],
            usage: TokenUsage {
                prompt_tokens: wire.prompt_eval_count,
                completion_tokens: wire.eval_count,
                total_tokens: wire.prompt_eval_count + wire.eval_count,
            },
        })
    }

    async fn forward(&self, path: &str, body: Vec<u8>) -> Result<UpstreamResponse, GatewayError> {
        let url = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .body(body)
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

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> OllamaProvider {
        OllamaProvider::new(String::new(), Duration::from_secs(5))
    }

    #[test]
    fn test_default_base_url() {
        assert_eq!(provider().base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_parse_request() {
        let body = br#"{
            "model": "llama3.2",
            "messages": [{"role": "user", "content": "hello"}],
            "stream": false
        }"#;
        let req = provider().parse_request(body).unwrap();
        assert_eq!(req.model, "llama3.2");
        assert_eq!(req.messages.len(), 1);
        assert!(!req.stream);
    }

    #[test]
    fn test_parse_response_counts_tokens() {
        let body = br#"{
            "model": "llama3.2",
            "message": {"role": "assistant", "content": "Hello! I'm Llama."},
            "done": true,
            "prompt_eval_count": 20,
            "eval_count": 50
        }"#;
        let resp = provider().parse_response(body).unwrap();
        assert_eq!(resp.contents, vec!["Hello! I'm Llama."]);
        assert_eq!(resp.usage.prompt_tokens, 20);
        assert_eq!(resp.usage.completion_tokens, 50);
        assert_eq!(resp.usage.total_tokens, 70);
    }

    #[test]
    fn test_parse_response_requires_message() {
        assert!(provider().parse_response(br#"{"done": true}"#).is_err());
    }
}
