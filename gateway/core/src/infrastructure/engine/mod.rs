// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Rule engine
//!
//! Evaluates the compiled rule document against an [`EvaluationContext`].
//! Semantics are default-deny: a request is allowed iff at least one permit
//! rule is satisfied and no forbid rule is satisfied (forbid overrides
//! permit). Evaluation is total: a predicate touching a missing field simply
//! does not match.
//!
//! The current policy lives behind an atomic snapshot pointer. Readers load
//! the snapshot once per evaluation; the hot-reload path swaps it wholesale,
//! so an in-flight request observes exactly one policy version.

pub mod eval;
pub mod parser;
pub mod watcher;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::domain::context::EvaluationContext;
use crate::domain::decision::{Decision, EvaluationResult, GatewayError, Obligation};

use eval::build_record;
use parser::{parse_document, Effect, Rule};

/// A parsed rule document plus its content-hash version.
pub struct CompiledPolicy {
    pub version: String,
    pub rules: Vec<Rule>,
}

impl CompiledPolicy {
    /// Parse rule text and stamp it with its 12-hex content hash.
    pub fn parse(text: &str) -> Result<Self, GatewayError> {
        let rules = parse_document(text)?;
        Ok(Self {
            version: policy_version(text),
            rules,
        })
    }

    fn uninitialized() -> Self {
        Self {
            version: String::new(),
            rules: Vec::new(),
        }
    }
}

/// First 12 hex characters of the SHA-256 of the rule text.
pub fn policy_version(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))[..12].to_string()
}

pub struct PolicyEngine {
    snapshot: ArcSwap<CompiledPolicy>,
    policy_path: PathBuf,
    reload_lock: Mutex<()>,
}

impl PolicyEngine {
    /// Load the engine from a compiled-policy file. Fails when the file is
    /// unreadable or does not parse; a process should abort on this.
    pub fn from_file(path: &Path) -> Result<Self, GatewayError> {
        let engine = Self {
            snapshot: ArcSwap::from_pointee(CompiledPolicy::uninitialized()),
            policy_path: path.to_path_buf(),
            reload_lock: Mutex::new(()),
        };
        engine.reload()?;
        Ok(engine)
    }

    /// An engine with no policy loaded; every evaluation denies.
    pub fn uninitialized(path: &Path) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(CompiledPolicy::uninitialized()),
            policy_path: path.to_path_buf(),
            reload_lock: Mutex::new(()),
        }
    }

    pub fn policy_path(&self) -> &Path {
        &self.policy_path
    }

    /// Current policy version hash; empty when uninitialized.
    pub fn policy_version(&self) -> String {
        self.snapshot.load().version.clone()
    }

    /// Re-read and re-parse the policy file, atomically swapping the
    /// snapshot on success. A parse failure keeps the prior policy active.
    pub fn reload(&self) -> Result<(), GatewayError> {
        let _guard = self.reload_lock.lock();

        let text = std::fs::read_to_string(&self.policy_path)?;
        let compiled = CompiledPolicy::parse(&text)?;
        let old_version = self.policy_version();
        let new_version = compiled.version.clone();

        self.snapshot.store(Arc::new(compiled));

        if old_version.is_empty() {
            info!(version = %new_version, "policy loaded");
        } else if old_version != new_version {
            info!(from = %old_version, to = %new_version, "policy hot-reloaded");
        }
        Ok(())
    }

    /// Reload wrapper for the watcher: never propagates, never swaps in a
    /// broken policy.
    pub fn reload_keeping_previous(&self) {
        if let Err(e) = self.reload() {
            warn!(error = %e, "policy hot-reload failed; keeping previous policy");
        }
    }

    /// Evaluate a context against the current snapshot for the implicit
    /// `chat` action.
    pub fn evaluate(&self, ctx: &EvaluationContext) -> EvaluationResult {
        let snapshot = self.snapshot.load();
        if snapshot.version.is_empty() {
            return EvaluationResult::deny("Policy engine not initialized");
        }

        let record = build_record(ctx);
        let mut permitted = false;
        let mut first_forbid: Option<&Rule> = None;
        let mut first_permit: Option<&Rule> = None;
        let mut satisfied_permits: Vec<&Rule> = Vec::new();
        let mut satisfied_forbids: Vec<&Rule> = Vec::new();

        for rule in &snapshot.rules {
            if !rule.applies_to_action("chat") {
                continue;
            }
            if !rule.is_satisfied(&record) {
                continue;
            }
            match rule.effect {
                Effect::Permit => {
                    permitted = true;
                    if first_permit.is_none() {
                        first_permit = Some(rule);
                    }
                    satisfied_permits.push(rule);
                }
                Effect::Forbid => {
                    if first_forbid.is_none() {
                        first_forbid = Some(rule);
                    }
                    satisfied_forbids.push(rule);
                }
            }
        }

        let allow = permitted && first_forbid.is_none();

        // Obligations come from the rules that contributed to the decision,
        // in document order.
        let contributing = if allow {
            satisfied_permits
        } else {
            satisfied_forbids
        };
        let obligations: Vec<Obligation> = contributing
            .iter()
            .filter_map(|rule| rule.obligation())
            .collect();

        let policy_id = if allow {
            first_permit.map(|r| r.id.clone()).unwrap_or_default()
        } else {
            first_forbid
                .or(first_permit)
                .map(|r| r.id.clone())
                .unwrap_or_default()
        };

        EvaluationResult {
            decision: if allow { Decision::Allow } else { Decision::Deny },
            reason: if allow {
                "Policy allowed the request".to_string()
            } else {
                "Policy denied the request".to_string()
            },
            policy_id,
            obligations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::context::EvaluationContext;
    use crate::domain::signals::PiiKind;
    use std::io::Write;

    const POLICY: &str = r#"
// test policy
permit(
    principal,
    action == Action::"chat",
    resource
)
when {
    context.pii.isEmpty()
};

@obligation("REDACT")
@fields("email, phone")
permit(
    principal,
    action == Action::"chat",
    resource
)
when {
    context.pii.containsAny(["email", "phone"]) &&
    !(context.pii.contains("ssn"))
};

forbid(
    principal,
    action == Action::"chat",
    resource
)
when {
    context.prompt_injection == true
};

forbid(
    principal,
    action == Action::"chat",
    resource
)
when {
    (context.intent == "code.exploit" || context.user_intent == "code.exploit") &&
    context.confidence > 40
};

forbid(
    principal,
    action == Action::"chat",
    resource
)
when {
    resource.sensitivity == "sensitive" &&
    context.intent == "file.write"
};
"#;

    fn engine_from(text: &str) -> (PolicyEngine, tempfile::NamedTempFile) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file.flush().unwrap();
        let engine = PolicyEngine::from_file(file.path()).unwrap();
        (engine, file)
    }

    fn clean_ctx() -> EvaluationContext {
        let mut ctx = EvaluationContext::new("openai", "public", "");
        ctx.finalize();
        ctx
    }

    #[test]
    fn test_clean_request_is_allowed() {
        let (engine, _f) = engine_from(POLICY);
        let result = engine.evaluate(&clean_ctx());
        assert_eq!(result.decision, Decision::Allow);
        assert_eq!(result.reason, "Policy allowed the request");
        assert!(result.obligations.is_empty());
        assert_eq!(result.policy_id, "policy0");
    }

    #[test]
    fn test_injection_forbid_overrides_permit() {
        let (engine, _f) = engine_from(POLICY);
        let mut ctx = clean_ctx();
        ctx.signals.prompt_injection = true;
        let result = engine.evaluate(&ctx);
        assert_eq!(result.decision, Decision::Deny);
        assert_eq!(result.reason, "Policy denied the request");
    }

    #[test]
    fn test_redact_obligation_with_fields() {
        let (engine, _f) = engine_from(POLICY);
        let mut ctx = clean_ctx();
        ctx.signals.pii.insert(PiiKind::Email);
        let result = engine.evaluate(&ctx);
        assert_eq!(result.decision, Decision::Allow);
        assert_eq!(result.obligations.len(), 1);
        assert_eq!(result.obligations[0].kind, "REDACT");
        // Fields are split on commas and trimmed.
        assert_eq!(result.obligations[0].fields, vec!["email", "phone"]);
    }

    #[test]
    fn test_blocked_pii_has_no_permit() {
        let (engine, _f) = engine_from(POLICY);
        let mut ctx = clean_ctx();
        ctx.signals.pii.insert(PiiKind::Ssn);
        // Neither the empty-pii permit nor the redact permit matches.
        assert_eq!(engine.evaluate(&ctx).decision, Decision::Deny);
    }

    #[test]
    fn test_intent_threshold_in_percent() {
        let (engine, _f) = engine_from(POLICY);
        let mut ctx = clean_ctx();
        ctx.intent = "code.exploit".to_string();
        ctx.confidence = 0.39;
        assert_eq!(engine.evaluate(&ctx).decision, Decision::Allow);

        ctx.confidence = 0.41;
        assert_eq!(engine.evaluate(&ctx).decision, Decision::Deny);
    }

    #[test]
    fn test_resource_sensitivity_attribute() {
        let (engine, _f) = engine_from(POLICY);
        let mut ctx = clean_ctx();
        ctx.intent = "file.write".to_string();
        assert_eq!(engine.evaluate(&ctx).decision, Decision::Allow);

        ctx.resource_sensitivity = "sensitive".to_string();
        assert_eq!(engine.evaluate(&ctx).decision, Decision::Deny);
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let (engine, _f) = engine_from(POLICY);
        let mut ctx = clean_ctx();
        ctx.signals.pii.insert(PiiKind::Email);
        let first = engine.evaluate(&ctx);
        for _ in 0..10 {
            let again = engine.evaluate(&ctx);
            assert_eq!(first.decision, again.decision);
            assert_eq!(first.reason, again.reason);
            assert_eq!(first.obligations, again.obligations);
            assert_eq!(first.policy_id, again.policy_id);
        }
    }

    #[test]
    fn test_uninitialized_engine_denies() {
        let engine = PolicyEngine::uninitialized(Path::new("/nonexistent"));
        let result = engine.evaluate(&clean_ctx());
        assert_eq!(result.decision, Decision::Deny);
        assert_eq!(result.reason, "Policy engine not initialized");
    }

    #[test]
    fn test_version_is_twelve_hex() {
        let (engine, _f) = engine_from(POLICY);
        let version = engine.policy_version();
        assert_eq!(version.len(), 12);
        assert!(version.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_reload_swaps_version_and_behavior() {
        let (engine, file) = engine_from(POLICY);
        let v1 = engine.policy_version();

        // Rewrite with an unconditional permit document.
        let new_policy = "permit(\n    principal,\n    action == Action::\"chat\",\n    resource\n);\n";
        std::fs::write(file.path(), new_policy).unwrap();
        engine.reload().unwrap();

        let v2 = engine.policy_version();
        assert_ne!(v1, v2);

        let mut ctx = clean_ctx();
        ctx.signals.prompt_injection = true;
        // The injection forbid is gone in the new document.
        assert_eq!(engine.evaluate(&ctx).decision, Decision::Allow);
    }

    #[test]
    fn test_failed_reload_keeps_previous_policy() {
        let (engine, file) = engine_from(POLICY);
        let v1 = engine.policy_version();

        std::fs::write(file.path(), "permit( this is not a valid rule").unwrap();
        engine.reload_keeping_previous();

        assert_eq!(engine.policy_version(), v1);
        assert_eq!(engine.evaluate(&clean_ctx()).decision, Decision::Allow);
    }

    #[test]
    fn test_rule_with_missing_field_does_not_match() {
        let text = r#"
permit(
    principal,
    action == Action::"chat",
    resource
);

forbid(
    principal,
    action == Action::"chat",
    resource
)
when {
    context.no_such_field == "x"
};
"#;
        let (engine, _f) = engine_from(text);
        assert_eq!(engine.evaluate(&clean_ctx()).decision, Decision::Allow);
    }
}
