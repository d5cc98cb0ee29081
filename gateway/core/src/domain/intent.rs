// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Hierarchical intent taxonomy
//
// Intents are dotted strings so policies can express both exact matches and
// the occasional family prefix. The taxonomy is closed: anything a classifier
// returns outside it is coerced to `UNKNOWN` before it reaches the context.

use serde::{Deserialize, Serialize};

// Informational (low risk)
pub const INFO_QUERY: &str = "info.query";
pub const INFO_QUERY_PII: &str = "info.query.pii";
pub const INFO_SUMMARIZE: &str = "info.summarize";

// Capabilities (medium-high risk)
pub const CODE_GENERATE: &str = "code.generate";
pub const CODE_EXPLOIT: &str = "code.exploit";
pub const TOOL_SAFE: &str = "tool.safe";
pub const TOOL_DANGEROUS: &str = "tool.dangerous";

// Restricted (high risk)
pub const FILE_READ: &str = "file.read";
pub const FILE_WRITE: &str = "file.write";
pub const SYS_CONTROL: &str = "sys.control";

// Conversational (zero risk)
pub const CONV_GREETING: &str = "conv.greeting";
pub const CONV_OTHER: &str = "conv.other";

pub const UNKNOWN: &str = "unknown";

/// Every member of the taxonomy, in risk-tier order.
pub const ALL: &[&str] = &[
    INFO_QUERY,
    INFO_QUERY_PII,
    INFO_SUMMARIZE,
    CODE_GENERATE,
    CODE_EXPLOIT,
    TOOL_SAFE,
    TOOL_DANGEROUS,
    FILE_READ,
    FILE_WRITE,
    SYS_CONTROL,
    CONV_GREETING,
    CONV_OTHER,
];

/// True when `intent` is a member of the taxonomy. The sidecar's toxicity
/// label is accepted as well since its evaluator may emit it.
pub fn is_valid_intent(intent: &str) -> bool {
    matches!(
        intent,
        INFO_QUERY
            | INFO_QUERY_PII
            | INFO_SUMMARIZE
            | CODE_GENERATE
            | CODE_EXPLOIT
            | TOOL_SAFE
            | TOOL_DANGEROUS
            | FILE_READ
            | FILE_WRITE
            | SYS_CONTROL
            | CONV_GREETING
            | CONV_OTHER
            | "safety.toxicity"
            | UNKNOWN
    )
}

/// Canonical intent → action-verb mapping. Empty for intents with no
/// first-class verb (unknown).
pub fn action_for_intent(intent: &str) -> &'static str {
    match intent {
        INFO_QUERY | INFO_QUERY_PII => "query",
        INFO_SUMMARIZE => "summarize",
        CODE_GENERATE => "generate",
        CODE_EXPLOIT => "exploit",
        TOOL_SAFE | TOOL_DANGEROUS => "tool",
        FILE_READ => "read",
        FILE_WRITE => "write",
        SYS_CONTROL => "control",
        CONV_GREETING => "greeting",
        CONV_OTHER => "other",
        _ => "",
    }
}

/// Derived risk for an intent classification.
///
/// Intent-specific weighting lives in policy thresholds, not here; keeping
/// the derivation flat means re-authoring thresholds never requires a
/// redeploy. Policies express e.g.
/// `forbid when context.intent == "code.exploit" && context.confidence > 40`.
pub fn risk_from_intent(_intent: &str, confidence: f64) -> f64 {
    confidence
}

/// Semantic classification result, produced by the heuristic fast path or the
/// remote intent sidecar. Field names follow the sidecar's JSON schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntentSignal {
    #[serde(default)]
    pub intent: String,
    /// Confidence in [0, 1].
    #[serde(default)]
    pub confidence: f64,
    /// First-class action verb ("query", "generate", ...).
    #[serde(default)]
    pub action: String,
    /// First-class domain noun ("recruitment", "politics", ...).
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub domain_confidence: f64,
    #[serde(default)]
    pub action_confidence: f64,
    #[serde(default)]
    pub risk_score: f64,
    #[serde(default)]
    pub is_ambiguous: bool,
    /// The sidecar evaluator's own verdict: "allow" | "block" | "".
    #[serde(default)]
    pub decision: String,
    /// Why the sidecar blocked or allowed.
    #[serde(default)]
    pub reason: String,
}

impl IntentSignal {
    pub fn new(intent: &str, confidence: f64) -> Self {
        Self {
            intent: intent.to_string(),
            confidence,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_membership() {
        assert!(is_valid_intent(INFO_QUERY));
        assert!(is_valid_intent(CODE_EXPLOIT));
        assert!(is_valid_intent(UNKNOWN));
        assert!(is_valid_intent("safety.toxicity"));
        assert!(!is_valid_intent("weather.forecast"));
        assert!(!is_valid_intent(""));
    }

    #[test]
    fn test_action_mapping_covers_taxonomy() {
        assert_eq!(action_for_intent(INFO_QUERY), "query");
        assert_eq!(action_for_intent(INFO_QUERY_PII), "query");
        assert_eq!(action_for_intent(INFO_SUMMARIZE), "summarize");
        assert_eq!(action_for_intent(CODE_GENERATE), "generate");
        assert_eq!(action_for_intent(CODE_EXPLOIT), "exploit");
        assert_eq!(action_for_intent(TOOL_DANGEROUS), "tool");
        assert_eq!(action_for_intent(FILE_WRITE), "write");
        assert_eq!(action_for_intent(SYS_CONTROL), "control");
        assert_eq!(action_for_intent(CONV_GREETING), "greeting");
        assert_eq!(action_for_intent(UNKNOWN), "");
    }

    #[test]
    fn test_risk_is_policy_neutral() {
        // Flat derivation: risk equals confidence regardless of intent.
        assert_eq!(risk_from_intent(CODE_EXPLOIT, 0.4), 0.4);
        assert_eq!(risk_from_intent(CONV_GREETING, 0.4), 0.4);
    }

    #[test]
    fn test_signal_decodes_sidecar_json() {
        let json = r#"{
            "intent": "code.exploit",
            "confidence": 0.91,
            "action": "exploit",
            "domain": "security",
            "domain_confidence": 0.8,
            "action_confidence": 0.85,
            "risk_score": 0.9,
            "decision": "block",
            "reason": "overtly malicious request"
        }"#;
        let sig: IntentSignal = serde_json::from_str(json).unwrap();
        assert_eq!(sig.intent, CODE_EXPLOIT);
        assert_eq!(sig.decision, "block");
        assert!(!sig.is_ambiguous);
    }
}
