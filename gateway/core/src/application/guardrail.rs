// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Guardrail pipeline
//!
//! Screens one parsed request: deterministic signals, heuristic fast path,
//! sidecar classification, role pre-gate, then the rule engine. Any denial
//! short-circuits; the HTTP layer maps the verdict to status codes and
//! headers.
//!
//! Fail-closed discipline: the sidecar is soft-fail per call, but when every
//! classifier fails the context is marked `analyzer_failed` and constrained
//! roles deny at the pre-gate.

use std::sync::Arc;

use tracing::{info, warn};

use crate::application::aggregator::SignalAggregator;
use crate::application::role_gate;
use crate::domain::context::{EvaluationContext, IntentRole};
use crate::domain::decision::{error_code, Decision, EvaluationResult};
use crate::domain::intent::{self, IntentSignal};
use crate::domain::message::ChatRequest;
use crate::domain::policy::GuardrailPolicy;
use crate::infrastructure::engine::PolicyEngine;
use crate::infrastructure::heuristic::HeuristicAnalyzer;
use crate::infrastructure::intent_client::IntentClient;
use crate::infrastructure::metrics;

/// Outcome of screening a request.
#[derive(Debug)]
pub enum ScreenVerdict {
    Allow(EvaluationResult),
    Deny {
        code: &'static str,
        reason: String,
        policy_id: String,
    },
}

impl ScreenVerdict {
    pub fn decision_str(&self) -> &'static str {
        match self {
            Self::Allow(_) => "ALLOW",
            Self::Deny { .. } => "DENY",
        }
    }
}

pub struct GuardrailService {
    aggregator: SignalAggregator,
    heuristic: HeuristicAnalyzer,
    intent_client: Option<Arc<IntentClient>>,
    engine: Arc<PolicyEngine>,
    policy: GuardrailPolicy,
}

impl GuardrailService {
    pub fn new(
        policy: GuardrailPolicy,
        engine: Arc<PolicyEngine>,
        intent_client: Option<Arc<IntentClient>>,
    ) -> Self {
        Self {
            aggregator: SignalAggregator::new(),
            heuristic: HeuristicAnalyzer::new(&policy.topics),
            intent_client,
            engine,
            policy,
        }
    }

    pub fn engine(&self) -> &Arc<PolicyEngine> {
        &self.engine
    }

    pub fn aggregator(&self) -> &SignalAggregator {
        &self.aggregator
    }

    pub fn policy(&self) -> &GuardrailPolicy {
        &self.policy
    }

    /// Run the full pre-forward pipeline over a parsed request, populating
    /// `ctx` and returning the verdict.
    pub async fn screen(
        &self,
        request: &ChatRequest,
        ctx: &mut EvaluationContext,
    ) -> ScreenVerdict {
        ctx.request.streaming = request.stream;
        ctx.request.tokens = request.max_tokens.map(i64::from).unwrap_or(0);

        // 1. Deterministic signals, always first.
        let mut signals = self.aggregator.aggregate(request);

        // 1.5 Topic fast path over user text.
        if !signals.user_text.is_empty() {
            let topic = self.heuristic.detect_topic(&signals.user_text);
            if !topic.is_empty() {
                info!(topic = %topic, "heuristic topic detected");
                signals.topic = topic;
            }
        }

        if !signals.pii.is_empty() {
            metrics::record_signal("pii");
        }
        if signals.toxicity > 0.5 {
            metrics::record_signal("toxicity");
        }
        if signals.prompt_injection {
            metrics::record_signal("injection");
        }
        if signals.indirect_injection {
            metrics::record_signal("indirect_injection");
        }

        info!(
            pii = ?signals.pii,
            toxicity = signals.toxicity,
            injection = signals.prompt_injection,
            "deterministic signals"
        );
        ctx.attach_signals(&signals);

        // 2. Semantic classification: heuristic fast path, sidecar deep path.
        if let Some(deny) = self.classify(request, ctx).await {
            return deny;
        }

        ctx.finalize();

        // 3. Role pre-gate, before the engine.
        if let Err(reason) = role_gate::enforce(&self.policy, ctx) {
            info!(role = %ctx.role, reason = %reason, "role pre-gate denied request");
            return ScreenVerdict::Deny {
                code: error_code::ROLE_POLICY_BLOCKED,
                reason,
                policy_id: String::new(),
            };
        }

        // 4. Rule engine.
        let result = self.engine.evaluate(ctx);
        metrics::record_decision(result.decision.as_str());
        info!(
            decision = result.decision.as_str(),
            policy_id = %result.policy_id,
            "policy decision"
        );

        match result.decision {
            Decision::Allow => ScreenVerdict::Allow(result),
            Decision::Deny => ScreenVerdict::Deny {
                code: error_code::GUARDRAIL_BLOCKED,
                reason: result.reason,
                policy_id: result.policy_id,
            },
        }
    }

    /// Heuristic and sidecar intent classification. Returns a verdict only
    /// when the sidecar's own evaluator blocks the request.
    async fn classify(
        &self,
        request: &ChatRequest,
        ctx: &mut EvaluationContext,
    ) -> Option<ScreenVerdict> {
        let user_text = ctx.signals.user_text.clone();

        // A. Fast path: heuristic intent plus domain.
        let mut has_confident_intent = false;
        if !user_text.is_empty() {
            if let Some(heuristic_signal) = self.heuristic.analyze_with_domain(&user_text) {
                if !heuristic_signal.domain.is_empty() {
                    ctx.domain = heuristic_signal.domain.clone();
                    ctx.domain_confidence = heuristic_signal.domain_confidence;
                }
                if !heuristic_signal.intent.is_empty() {
                    info!(
                        intent = %heuristic_signal.intent,
                        confidence = heuristic_signal.confidence,
                        "heuristic intent, bypassing sidecar"
                    );
                    metrics::record_intent(&heuristic_signal.intent);
                    ctx.attach_intent(&heuristic_signal, IntentRole::User);
                    has_confident_intent = true;
                }
            }
        }

        // B. Deep path: the sidecar, over the conversation window and the
        // user text, concurrently.
        if !has_confident_intent {
            if let Some(client) = &self.intent_client {
                let mut intent_failures = 0usize;
                let mut intent_attempts = 0usize;
                let mut sidecar_block_reason: Option<String> = None;

                let aggregate_call = async {
                    if request.messages.is_empty() {
                        None
                    } else {
                        Some(client.analyze_messages(&request.messages).await)
                    }
                };
                let user_call = async {
                    if user_text.is_empty() {
                        None
                    } else {
                        Some(client.analyze(&user_text).await)
                    }
                };
                let (aggregate_result, user_result) = tokio::join!(aggregate_call, user_call);

                if let Some(result) = aggregate_result {
                    intent_attempts += 1;
                    match result {
                        Ok(mut signal) => {
                            backfill_action(&mut signal);
                            metrics::record_intent(&signal.intent);
                            if signal.decision == "block" {
                                sidecar_block_reason = Some(signal.reason.clone());
                            }
                            info!(
                                intent = %signal.intent,
                                confidence = signal.confidence,
                                domain = %signal.domain,
                                "contextual intent"
                            );
                            ctx.attach_intent(&signal, IntentRole::Aggregate);
                        }
                        Err(e) => {
                            warn!(error = %e, "contextual intent analysis failed");
                            intent_failures += 1;
                        }
                    }
                }

                if let Some(result) = user_result {
                    intent_attempts += 1;
                    match result {
                        Ok(mut signal) => {
                            backfill_action(&mut signal);
                            // The user-specific verdict takes precedence.
                            if signal.decision == "block" {
                                sidecar_block_reason = Some(signal.reason.clone());
                            }
                            info!(
                                intent = %signal.intent,
                                confidence = signal.confidence,
                                decision = %signal.decision,
                                "user-specific intent"
                            );
                            ctx.attach_intent(&signal, IntentRole::User);
                        }
                        Err(e) => {
                            warn!(error = %e, "user intent analysis failed");
                            intent_failures += 1;
                        }
                    }
                }

                // The sidecar evaluator is a high-trust signal source; its
                // block verdict bypasses the engine.
                if let Some(reason) = sidecar_block_reason {
                    return Some(ScreenVerdict::Deny {
                        code: error_code::SIDECAR_BLOCKED,
                        reason,
                        policy_id: String::new(),
                    });
                }

                if intent_attempts > 0 && intent_failures == intent_attempts && ctx.intent.is_empty()
                {
                    info!("intent analysis unavailable, defaulting to unknown (fail-closed)");
                    ctx.mark_analyzer_failed();
                }
            }

            // Domain backfill when the sidecar offered none.
            if ctx.domain.is_empty() && !user_text.is_empty() {
                let detected = self.heuristic.detect_topic(&user_text);
                if !detected.is_empty() {
                    ctx.domain = detected;
                    ctx.domain_confidence = 0.90;
                }
            }
        }

        None
    }
}

fn backfill_action(signal: &mut IntentSignal) {
    if signal.action.is_empty() {
        signal.action = intent::action_for_intent(&signal.intent).to_string();
    }
}
