// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Authorization decisions, obligations and gateway errors.

use serde::{Deserialize, Serialize};

/// Result of a policy evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    #[serde(rename = "ALLOW")]
    Allow,
    #[serde(rename = "DENY")]
    Deny,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "ALLOW",
            Self::Deny => "DENY",
        }
    }
}

/// A side effect the enforcement pipeline must perform on an allowed request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obligation {
    /// "REDACT" | "RequireApproval" | "RateLimit".
    #[serde(rename = "type")]
    pub kind: String,
    /// For REDACT: the PII kinds to mask.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
}

pub const OBLIGATION_REDACT: &str = "REDACT";
pub const OBLIGATION_REQUIRE_APPROVAL: &str = "RequireApproval";
pub const OBLIGATION_RATE_LIMIT: &str = "RateLimit";

/// Full outcome of one engine evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub decision: Decision,
    pub reason: String,
    pub policy_id: String,
    pub obligations: Vec<Obligation>,
}

impl EvaluationResult {
    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            decision: Decision::Deny,
            reason: reason.into(),
            policy_id: String::new(),
            obligations: Vec::new(),
        }
    }
}

// Wire error codes used in the canonical error JSON.
pub mod error_code {
    pub const INVALID_REQUEST: &str = "invalid_request";
    pub const GUARDRAIL_BLOCKED: &str = "guardrail_blocked";
    pub const SIDECAR_BLOCKED: &str = "sidecar_blocked";
    pub const ROLE_POLICY_BLOCKED: &str = "role_policy_blocked";
    pub const OUTPUT_GUARDRAIL_BLOCKED: &str = "output_guardrail_blocked";
    pub const PROVIDER_ERROR: &str = "provider_error";
    pub const PROXY_ERROR: &str = "proxy_error";
}

/// Errors surfaced across the gateway's seams.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("malformed request: {0}")]
    InvalidRequest(String),

    #[error("policy parse error: {0}")]
    PolicyParse(String),

    #[error("policy engine not initialized")]
    EngineUninitialized,

    #[error("intent sidecar error: {0}")]
    Sidecar(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("circuit breaker is open: provider unavailable")]
    CircuitOpen,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
