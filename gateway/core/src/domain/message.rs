// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Normalized chat types (Anti-Corruption Layer)
//
// Provider adapters translate their wire formats into these types so the
// rest of the gateway never sees vendor-specific request shapes.

use serde::{Deserialize, Serialize};

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Normalized LLM request across providers.
///
/// Serializes to the OpenAI-compatible wire shape, which is what the proxy
/// forwards after applying REDACT obligations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub stream: bool,
}

/// Normalized LLM response across providers.
#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    pub model: String,
    /// Assistant message contents, in choice order. Most providers return
    /// exactly one; the egress scan covers all of them.
    pub contents: Vec<String>,
    pub usage: TokenUsage,
}

/// Token usage stats extracted from a provider response.
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}
