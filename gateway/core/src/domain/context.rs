// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Evaluation context
//!
//! The single record fed to the policy engine. Classifier passes and detector
//! sweeps attach to it through [`EvaluationContext::attach_intent`] and
//! [`EvaluationContext::attach_signals`], which enforce the merge invariants:
//!
//! - `risk_score` is monotone non-decreasing across the request lifetime
//! - `prompt_injection` is sticky once true
//! - PII and capability sets merge as unions
//! - `topic` keeps the first non-empty value
//! - the user/system intent slots are only overwritten by a strictly
//!   higher-risk classification for the same role

use serde::{Deserialize, Serialize};

use crate::domain::intent::{self, IntentSignal};
use crate::domain::signals::Signals;

/// Which classifier pass produced an intent signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentRole {
    /// Classified over user text alone.
    User,
    /// Classified over system text alone.
    System,
    /// Classified over the full conversation window.
    Aggregate,
}

/// Request-level metadata exposed to policies.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestMeta {
    pub streaming: bool,
    pub tokens: i64,
}

/// Agentic workflow budgets. Zero means unlimited.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentState {
    pub current_step: i64,
    pub max_steps: i64,
    pub total_tokens: i64,
    pub token_budget: i64,
}

/// Provenance of the content being evaluated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceData {
    /// One of: user, system, tool_output, untrusted_web, document, external_api.
    pub origin: String,
    pub trusted: bool,
}

impl Default for SourceData {
    fn default() -> Self {
        Self {
            origin: "user".to_string(),
            trusted: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationContext {
    // Semantic signals
    pub intent: String,
    pub user_intent: String,
    pub system_intent: String,
    pub action: String,
    pub domain: String,
    pub confidence: f64,
    pub action_confidence: f64,
    pub domain_confidence: f64,
    pub risk_score: f64,
    /// Set when every classifier failed; distinct from model-said-unknown.
    pub analyzer_failed: bool,

    // Operational context
    /// "public" | "sensitive", from the X-Resource-Sensitivity header.
    pub resource_sensitivity: String,
    /// Free-form role from the X-Guardrail-Role header.
    pub role: String,
    pub provider: String,

    pub signals: Signals,
    pub request: RequestMeta,
    pub agent_state: AgentState,
    pub source_data: SourceData,

    // Stored derived risk per intent slot, used for the strict-overwrite rule.
    #[serde(skip)]
    user_intent_risk: f64,
    #[serde(skip)]
    system_intent_risk: f64,
}

impl EvaluationContext {
    pub fn new(provider: &str, resource_sensitivity: &str, role: &str) -> Self {
        Self {
            intent: String::new(),
            user_intent: String::new(),
            system_intent: String::new(),
            action: String::new(),
            domain: String::new(),
            confidence: 0.0,
            action_confidence: 0.0,
            domain_confidence: 0.0,
            risk_score: 0.0,
            analyzer_failed: false,
            resource_sensitivity: resource_sensitivity.to_string(),
            role: role.to_string(),
            provider: provider.to_string(),
            signals: Signals::default(),
            request: RequestMeta::default(),
            agent_state: AgentState::default(),
            source_data: SourceData::default(),
            user_intent_risk: 0.0,
            system_intent_risk: 0.0,
        }
    }

    /// Attach a classification result from a pass tagged with `role`.
    ///
    /// The aggregate intent/confidence/risk update applies when the derived
    /// risk is at least the stored risk score, or when no intent has been
    /// attached yet (first write wins ties at zero). Action and domain fields
    /// ride along with a winning update; a missing action verb is backfilled
    /// from the canonical intent mapping.
    pub fn attach_intent(&mut self, signal: &IntentSignal, role: IntentRole) {
        let derived = intent::risk_from_intent(&signal.intent, signal.confidence);

        match role {
            IntentRole::User => {
                if self.user_intent.is_empty() || derived > self.user_intent_risk {
                    self.user_intent = signal.intent.clone();
                    self.user_intent_risk = derived;
                }
            }
            IntentRole::System => {
                if self.system_intent.is_empty() || derived > self.system_intent_risk {
                    self.system_intent = signal.intent.clone();
                    self.system_intent_risk = derived;
                }
            }
            IntentRole::Aggregate => {}
        }

        if self.intent.is_empty() || derived >= self.risk_score {
            self.intent = signal.intent.clone();
            self.confidence = signal.confidence;

            let action = if signal.action.is_empty() {
                intent::action_for_intent(&signal.intent).to_string()
            } else {
                signal.action.clone()
            };
            if !action.is_empty() {
                self.action = action;
            }
            if signal.action_confidence > 0.0 {
                self.action_confidence = signal.action_confidence;
            }
            if !signal.domain.is_empty() {
                self.domain = signal.domain.clone();
            }
            if signal.domain_confidence > 0.0 {
                self.domain_confidence = signal.domain_confidence;
            }
        }

        if derived > self.risk_score {
            self.risk_score = derived;
        }
    }

    /// Merge a detector sweep into the context.
    pub fn attach_signals(&mut self, signals: &Signals) {
        self.signals.pii.extend(signals.pii.iter().copied());
        self.signals
            .capabilities
            .extend(signals.capabilities.iter().copied());
        if signals.toxicity > self.signals.toxicity {
            self.signals.toxicity = signals.toxicity;
        }
        self.signals.prompt_injection |= signals.prompt_injection;
        self.signals.indirect_injection |= signals.indirect_injection;
        if self.signals.topic.is_empty() && !signals.topic.is_empty() {
            self.signals.topic = signals.topic.clone();
        }
        if self.signals.full_text.is_empty() {
            self.signals.full_text = signals.full_text.clone();
        }
        if self.signals.user_text.is_empty() {
            self.signals.user_text = signals.user_text.clone();
        }
        if self.signals.system_text.is_empty() {
            self.signals.system_text = signals.system_text.clone();
        }
    }

    /// Give every semantic field a defined value before evaluation. An intent
    /// no classifier ever set becomes the literal `unknown`.
    pub fn finalize(&mut self) {
        if self.intent.is_empty() {
            self.intent = intent::UNKNOWN.to_string();
        }
        if self.user_intent.is_empty() {
            self.user_intent = intent::UNKNOWN.to_string();
        }
        if self.system_intent.is_empty() {
            self.system_intent = intent::UNKNOWN.to_string();
        }
    }

    /// Mark the context as evaluated without any working analyzer.
    pub fn mark_analyzer_failed(&mut self) {
        self.intent = intent::UNKNOWN.to_string();
        self.user_intent = intent::UNKNOWN.to_string();
        self.confidence = 0.5;
        if self.risk_score < 0.5 {
            self.risk_score = 0.5;
        }
        self.analyzer_failed = true;
    }
}
