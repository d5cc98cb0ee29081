// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Policy authoring document
//!
//! The human-edited `guardrail.yaml`. The compiler lowers this into the rule
//! document the engine evaluates; the role table is additionally enforced
//! directly by the pre-engine role gate. Maps are ordered so compilation is
//! deterministic: identical input yields byte-identical output.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::decision::GatewayError;

/// Root configuration structure for `guardrail.yaml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuardrailPolicy {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub safety: SafetyConfig,
    #[serde(default)]
    pub pii: PiiConfig,
    #[serde(default)]
    pub capabilities: CapabilitiesConfig,
    #[serde(default)]
    pub intents: BTreeMap<String, IntentRule>,
    #[serde(default)]
    pub user_intent_overrides: BTreeMap<String, IntentOverride>,
    /// Configurable topic definitions for the heuristic topic detector.
    #[serde(default)]
    pub topics: BTreeMap<String, TopicConfig>,
    #[serde(default)]
    pub roles: BTreeMap<String, RoleConfig>,
    #[serde(default)]
    pub agent_limits: AgentLimitsConfig,
    #[serde(default)]
    pub source_trust: BTreeMap<String, SourceRule>,
}

impl GuardrailPolicy {
    /// Read and parse the authoring document from disk.
    pub fn load(path: &Path) -> Result<Self, GatewayError> {
        let data = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&data).map_err(|e| GatewayError::PolicyParse(e.to_string()))
    }
}

/// Global safety thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyConfig {
    /// "block" | "log" | "off".
    #[serde(default)]
    pub prompt_injection: String,
    /// 0.0-1.0
    #[serde(default)]
    pub toxicity_threshold: f64,
    /// 0.0-1.0, fail-safe catch-all ceiling.
    #[serde(default)]
    pub max_risk_score: f64,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            prompt_injection: "block".to_string(),
            toxicity_threshold: 0.7,
            max_risk_score: 0.8,
        }
    }
}

/// PII handling rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PiiConfig {
    /// Kinds to block outright (e.g. ssn, credit_card).
    #[serde(default)]
    pub block: Vec<String>,
    /// Kinds to redact and pass through (e.g. email, phone).
    #[serde(default)]
    pub redact: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapabilitiesConfig {
    #[serde(default)]
    pub block: Vec<String>,
}

/// Policy for a specific intent class.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntentRule {
    /// "block" | "log" | "allow". Only block rules compile to forbids.
    #[serde(default)]
    pub action: String,
    /// Confidence threshold, 0-100.
    #[serde(default)]
    pub threshold: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<IntentCondition>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntentCondition {
    /// "sensitive" | "public".
    #[serde(default)]
    pub sensitivity: String,
}

/// Stricter threshold applied when the intent is user-originated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntentOverride {
    #[serde(default)]
    pub threshold: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopicConfig {
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// What a specific role can and cannot do.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleConfig {
    #[serde(default)]
    pub description: String,
    /// First-class action verbs: query, summarize, greeting, ...
    #[serde(default)]
    pub allow_actions: Vec<String>,
    /// Domain nouns: recruitment, hr, ...
    #[serde(default)]
    pub allowed_topics: Vec<String>,
    #[serde(default)]
    pub block_intents: Vec<String>,
    #[serde(default)]
    pub block_topics: Vec<String>,
    /// 0.0-1.0, default 0.6 when unset.
    #[serde(default)]
    pub domain_confidence_threshold: f64,
    /// 0.0-1.0, default 0.65 when unset.
    #[serde(default)]
    pub action_confidence_threshold: f64,
}

impl RoleConfig {
    /// A role is constrained when it declares any allowed topics or actions.
    pub fn is_constrained(&self) -> bool {
        !self.allowed_topics.is_empty() || !self.allow_actions.is_empty()
    }
}

/// Agentic workflow budgets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentLimitsConfig {
    #[serde(default)]
    pub max_steps: i64,
    #[serde(default)]
    pub token_budget: i64,
    #[serde(default)]
    pub tighten_after_step: i64,
    #[serde(default)]
    pub tightened_threshold: i64,
}

/// Intents to block for a specific content source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceRule {
    #[serde(default)]
    pub block_intents: Vec<String>,
}
