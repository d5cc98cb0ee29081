// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Intent sidecar client
//!
//! Remote zero-shot classifier over HTTP. Soft-fail by contract: a timeout or
//! non-200 returns an error and the caller proceeds with the other signals.
//! No retries. Results are cached per process, keyed by a content hash, with
//! a bounded map that is cleared wholesale when it reaches capacity.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::domain::decision::GatewayError;
use crate::domain::intent::{self, IntentSignal};
use crate::domain::message::ChatMessage;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_CACHE_ENTRIES: usize = 1000;

#[derive(Serialize)]
struct IntentRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    messages: Option<&'a [ChatMessage]>,
}

pub struct IntentClient {
    endpoint: String,
    client: reqwest::Client,
    cache: RwLock<HashMap<String, IntentSignal>>,
    max_entries: usize,
}

impl IntentClient {
    pub fn new(endpoint: String, timeout: Duration) -> Self {
        Self {
            endpoint,
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            cache: RwLock::new(HashMap::new()),
            max_entries: MAX_CACHE_ENTRIES,
        }
    }

    pub fn with_default_timeout(endpoint: String) -> Self {
        Self::new(endpoint, DEFAULT_TIMEOUT)
    }

    /// Classify a single text.
    pub async fn analyze(&self, text: &str) -> Result<IntentSignal, GatewayError> {
        let key = text_cache_key(text);
        self.call_sidecar(
            IntentRequest {
                text: Some(text),
                messages: None,
            },
            key,
        )
        .await
    }

    /// Classify a full conversation window.
    pub async fn analyze_messages(
        &self,
        messages: &[ChatMessage],
    ) -> Result<IntentSignal, GatewayError> {
        let key = messages_cache_key(messages);
        self.call_sidecar(
            IntentRequest {
                text: None,
                messages: Some(messages),
            },
            key,
        )
        .await
    }

    async fn call_sidecar(
        &self,
        request: IntentRequest<'_>,
        cache_key: String,
    ) -> Result<IntentSignal, GatewayError> {
        if let Some(cached) = self.cache.read().get(&cache_key) {
            return Ok(cached.clone());
        }

        let response = self
            .client
            .post(format!("{}/intent", self.endpoint.trim_end_matches('/')))
            .json(&request)
            .send()
            .await
            .map_err(|e| GatewayError::Sidecar(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(GatewayError::Sidecar(format!(
                "sidecar returned status {}",
                response.status()
            )));
        }

        let mut signal: IntentSignal = response
            .json()
            .await
            .map_err(|e| GatewayError::Sidecar(format!("failed to decode response: {e}")))?;

        // Taxonomy closure: anything unrecognized becomes "unknown".
        if !intent::is_valid_intent(&signal.intent) {
            signal.intent = intent::UNKNOWN.to_string();
        }

        self.cache_insert(cache_key, signal.clone());
        Ok(signal)
    }

    /// Readiness probe against the sidecar's health endpoint.
    pub async fn health(&self) -> bool {
        match self
            .client
            .get(format!("{}/health", self.endpoint.trim_end_matches('/')))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    fn cache_insert(&self, key: String, signal: IntentSignal) {
        let mut cache = self.cache.write();
        if cache.len() >= self.max_entries {
            // Bounded-size contract: clear wholesale at capacity.
            cache.clear();
        }
        cache.insert(key, signal);
    }

    #[cfg(test)]
    fn cache_len(&self) -> usize {
        self.cache.read().len()
    }
}

fn text_cache_key(text: &str) -> String {
    format!("text:{}", hex::encode(Sha256::digest(text.as_bytes())))
}

fn messages_cache_key(messages: &[ChatMessage]) -> String {
    let mut hasher = Sha256::new();
    for msg in messages {
        hasher.update(msg.role.as_bytes());
        hasher.update(msg.content.as_bytes());
    }
    format!("msg:{}", hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_keys_are_stable_and_distinct() {
        assert_eq!(text_cache_key("hello"), text_cache_key("hello"));
        assert_ne!(text_cache_key("hello"), text_cache_key("goodbye"));

        let a = vec![ChatMessage::new("user", "hello")];
        let b = vec![ChatMessage::new("system", "hello")];
        assert_eq!(messages_cache_key(&a), messages_cache_key(&a));
        // Role participates in the hash.
        assert_ne!(messages_cache_key(&a), messages_cache_key(&b));
        // Text and message keys never collide (distinct prefixes).
        assert!(text_cache_key("x").starts_with("text:"));
        assert!(messages_cache_key(&a).starts_with("msg:"));
    }

    #[test]
    fn test_cache_drops_all_at_capacity() {
        let client = IntentClient::with_default_timeout("http://localhost:9".to_string());
        for i in 0..MAX_CACHE_ENTRIES {
            client.cache_insert(
                format!("text:{i}"),
                IntentSignal::new(intent::INFO_QUERY, 0.5),
            );
        }
        assert_eq!(client.cache_len(), MAX_CACHE_ENTRIES);

        // The next insert evicts everything, then stores itself.
        client.cache_insert(
            "text:overflow".to_string(),
            IntentSignal::new(intent::INFO_QUERY, 0.5),
        );
        assert_eq!(client.cache_len(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_sidecar_is_an_error_not_a_panic() {
        // Nothing listens on port 9; the call must soft-fail.
        let client = IntentClient::new(
            "http://127.0.0.1:9".to_string(),
            Duration::from_millis(200),
        );
        let result = client.analyze("hello").await;
        assert!(matches!(result, Err(GatewayError::Sidecar(_))));
        assert!(!client.health().await);
    }
}
