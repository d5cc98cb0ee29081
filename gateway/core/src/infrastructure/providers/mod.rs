// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Provider adapters (Anti-Corruption Layer)
//!
//! Each upstream LLM API gets an adapter that translates its wire shapes to
//! the normalized domain types and forwards raw bodies. The gateway core
//! never sees vendor formats.

pub mod circuit_breaker;
pub mod ollama;
pub mod openai;

use async_trait::async_trait;
use reqwest::header::HeaderMap;

use crate::domain::decision::GatewayError;
use crate::domain::message::{ChatRequest, ChatResponse};

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

/// Raw upstream response relayed back to the client after the egress scan.
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// Capability surface every provider adapter implements.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Provider identifier ("openai", "ollama").
    fn name(&self) -> &str;

    fn supports_streaming(&self) -> bool;

    /// Parse a raw request body into the normalized request.
    fn parse_request(&self, body: &[u8]) -> Result<ChatRequest, GatewayError>;

    /// Parse a raw response body into the normalized response.
    fn parse_response(&self, body: &[u8]) -> Result<ChatResponse, GatewayError>;

    /// Forward a request body to the upstream endpoint for `path`.
    async fn forward(&self, path: &str, body: Vec<u8>) -> Result<UpstreamResponse, GatewayError>;
}

/// Serialize a normalized (possibly redacted) request for forwarding.
pub fn serialize_request(request: &ChatRequest) -> Result<Vec<u8>, GatewayError> {
    serde_json::to_vec(request).map_err(|e| GatewayError::Provider(e.to_string()))
}
