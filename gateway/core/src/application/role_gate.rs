// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Role pre-gate
//!
//! Role-domain and role-action enforcement executed before the rule engine.
//! A role is *constrained* when it declares any allowed topics or actions;
//! constrained roles fail closed: analyzer outages, unclassifiable domains
//! and unknown intents all deny rather than silently passing through.
//!
//! Enforcement order:
//!  1. Analyzer health (fail-closed under constrained roles)
//!  2. Domain allowlist (empty domain denies when constrained)
//!  3. Domain confidence threshold
//!  4. Explicit topic blocks
//!  5. Action allowlist (empty action denies when constrained)
//!  6. Action confidence threshold
//!  7. Explicit intent blocks
//!  8. Unknown intent under a constrained role

use crate::domain::context::EvaluationContext;
use crate::domain::intent;
use crate::domain::policy::GuardrailPolicy;

const DEFAULT_DOMAIN_CONFIDENCE: f64 = 0.60;
const DEFAULT_ACTION_CONFIDENCE: f64 = 0.65;

/// Apply role policy. `Ok(())` passes through to the engine; `Err(reason)`
/// denies with a structured reason.
pub fn enforce(policy: &GuardrailPolicy, ctx: &EvaluationContext) -> Result<(), String> {
    if ctx.role.is_empty() {
        return Ok(());
    }

    let role = &ctx.role;
    let Some(cfg) = policy.roles.get(role) else {
        // Unknown role carries no constraints; the engine still sees it.
        return Ok(());
    };

    let constrained = cfg.is_constrained();

    let domain_threshold = if cfg.domain_confidence_threshold > 0.0 {
        cfg.domain_confidence_threshold
    } else {
        DEFAULT_DOMAIN_CONFIDENCE
    };
    let action_threshold = if cfg.action_confidence_threshold > 0.0 {
        cfg.action_confidence_threshold
    } else {
        DEFAULT_ACTION_CONFIDENCE
    };

    if ctx.analyzer_failed && constrained {
        return Err(format!(
            "Analyzer unavailable - fail-closed for constrained role '{role}'"
        ));
    }

    // Domain enforcement, falling back to the heuristic topic signal.
    let domain = if !ctx.domain.is_empty() {
        ctx.domain.as_str()
    } else {
        ctx.signals.topic.as_str()
    };

    if !cfg.allowed_topics.is_empty() {
        if domain.is_empty() {
            return Err(format!(
                "Unknown domain - denied for constrained role '{role}'"
            ));
        }
        if !cfg.allowed_topics.iter().any(|t| t == domain) {
            return Err(format!("Domain '{domain}' not allowed for role '{role}'"));
        }
        if ctx.domain_confidence > 0.0 && ctx.domain_confidence < domain_threshold {
            return Err(format!(
                "Domain confidence {:.2} below threshold {:.2} for role '{role}'",
                ctx.domain_confidence, domain_threshold
            ));
        }
    }

    if !cfg.block_topics.is_empty()
        && !domain.is_empty()
        && cfg.block_topics.iter().any(|t| t == domain)
    {
        return Err(format!(
            "Domain '{domain}' explicitly blocked for role '{role}'"
        ));
    }

    // Action enforcement, deriving the verb from the intent as a last resort.
    if !cfg.allow_actions.is_empty() {
        let action = if !ctx.action.is_empty() {
            ctx.action.clone()
        } else {
            intent::action_for_intent(&ctx.intent).to_string()
        };

        if action.is_empty() && constrained {
            return Err(format!(
                "Unknown action - denied for constrained role '{role}'"
            ));
        }
        if !action.is_empty() && !cfg.allow_actions.iter().any(|a| *a == action) {
            return Err(format!("Action '{action}' not allowed for role '{role}'"));
        }
        if ctx.action_confidence > 0.0 && ctx.action_confidence < action_threshold {
            return Err(format!(
                "Action confidence {:.2} below threshold {:.2} for role '{role}'",
                ctx.action_confidence, action_threshold
            ));
        }
    }

    if !cfg.block_intents.is_empty()
        && !ctx.intent.is_empty()
        && cfg.block_intents.iter().any(|i| *i == ctx.intent)
    {
        return Err(format!(
            "Intent '{}' explicitly blocked for role '{role}'",
            ctx.intent
        ));
    }

    if ctx.intent == intent::UNKNOWN && constrained {
        return Err(format!("Unknown intent denied for constrained role '{role}'"));
    }

    Ok(())
}
