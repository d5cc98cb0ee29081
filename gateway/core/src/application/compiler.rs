// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Policy compiler
//!
//! Lowers the authoring `guardrail.yaml` into the textual rule document the
//! engine evaluates. Compilation is deterministic: the policy maps are
//! ordered, so identical input produces byte-identical output apart from the
//! version header comment.

use std::fmt::Write;

use crate::domain::policy::{
    AgentLimitsConfig, CapabilitiesConfig, GuardrailPolicy, IntentOverride, IntentRule,
    PiiConfig, RoleConfig, SafetyConfig, SourceRule,
};

/// Compile the authoring policy into rule-document text.
pub fn compile(policy: &GuardrailPolicy) -> String {
    let mut out = String::new();

    out.push_str("// Auto-generated from guardrail.yaml - DO NOT EDIT DIRECTLY\n");
    let _ = writeln!(out, "// Policy version: {}\n", policy.version);

    section(&mut out, "1", "FAIL-OPEN DEFAULT");
    out.push_str(
        "permit(\n    principal,\n    action == Action::\"chat\",\n    resource\n)\nwhen {\n    context.pii.isEmpty()\n};\n\n",
    );

    section(&mut out, "2", "GLOBAL SAFETY");
    compile_safety(&mut out, &policy.safety);

    section(&mut out, "3", "INTENT RISK CONTROLS");
    compile_intents(&mut out, &policy.intents);

    if !policy.user_intent_overrides.is_empty() {
        out.push_str("// User-intent stricter thresholds\n");
        compile_user_intent_overrides(&mut out, &policy.user_intent_overrides);
    }

    section(&mut out, "4", "PII CONTROLS");
    compile_pii(&mut out, &policy.pii);

    section(&mut out, "5", "CAPABILITY CONTROLS");
    compile_capabilities(&mut out, &policy.capabilities);

    section(&mut out, "6", "FAIL-SAFE CATCH-ALL");
    compile_fail_safe(&mut out, &policy.safety);

    section(&mut out, "7", "AGENTIC WORKFLOW CONTROLS");
    compile_agent_limits(&mut out, &policy.agent_limits);

    if !policy.source_trust.is_empty() {
        out.push_str("// Source trust restrictions\n");
        compile_source_trust(&mut out, &policy.source_trust);
    }

    if !policy.roles.is_empty() {
        section(&mut out, "8", "ROLE-BASED GUARDRAILS");
        compile_roles(&mut out, &policy.roles);
    }

    out
}

fn section(out: &mut String, num: &str, title: &str) {
    let _ = writeln!(out, "// ─── SECTION {num}: {title} ───");
}

fn forbid(out: &mut String, condition: &str) {
    let _ = writeln!(
        out,
        "forbid(\n    principal,\n    action == Action::\"chat\",\n    resource\n)\nwhen {{\n    {condition}\n}};\n"
    );
}

fn compile_safety(out: &mut String, safety: &SafetyConfig) {
    if safety.prompt_injection == "block" {
        forbid(out, "context.prompt_injection == true");
    }

    let toxicity = (safety.toxicity_threshold * 100.0) as i64;
    forbid(out, &format!("context.toxicity > {toxicity}"));
}

fn compile_intents(
    out: &mut String,
    intents: &std::collections::BTreeMap<String, IntentRule>,
) {
    for (name, rule) in intents {
        if rule.action != "block" {
            // Only block rules generate forbids; log/allow stay advisory.
            continue;
        }

        let mut parts = Vec::new();
        if let Some(when) = &rule.when {
            if !when.sensitivity.is_empty() {
                parts.push(format!(
                    "resource.sensitivity == \"{}\"",
                    when.sensitivity
                ));
            }
        }
        parts.push(format!(
            "(context.intent == \"{name}\" || context.user_intent == \"{name}\")"
        ));
        parts.push(format!("context.confidence > {}", rule.threshold));

        let _ = writeln!(out, "// {name} (threshold: {})", rule.threshold);
        forbid(out, &parts.join(" &&\n    "));
    }
}

fn compile_user_intent_overrides(
    out: &mut String,
    overrides: &std::collections::BTreeMap<String, IntentOverride>,
) {
    for (name, over) in overrides {
        let _ = writeln!(out, "// user_{name} (stricter: {})", over.threshold);
        forbid(
            out,
            &format!(
                "context.user_intent == \"{name}\" &&\n    context.confidence > {}",
                over.threshold
            ),
        );
    }
}

fn compile_pii(out: &mut String, pii: &PiiConfig) {
    if !pii.block.is_empty() {
        let conditions: Vec<String> = pii
            .block
            .iter()
            .map(|k| format!("context.pii.contains(\"{k}\")"))
            .collect();
        let _ = writeln!(out, "// Block PII: {}", pii.block.join(", "));
        forbid(out, &conditions.join(" ||\n    "));
    }

    if !pii.redact.is_empty() {
        let redact_quoted: Vec<String> =
            pii.redact.iter().map(|k| format!("\"{k}\"")).collect();
        let block_checks: Vec<String> = pii
            .block
            .iter()
            .map(|k| format!("context.pii.contains(\"{k}\")"))
            .collect();
        let not_blocked = if block_checks.is_empty() {
            String::new()
        } else {
            format!(" &&\n    !({})", block_checks.join(" || "))
        };

        let _ = writeln!(out, "// Redact PII: {}", pii.redact.join(", "));
        let _ = writeln!(
            out,
            "@obligation(\"REDACT\")\n@fields(\"{}\")\npermit(\n    principal,\n    action == Action::\"chat\",\n    resource\n)\nwhen {{\n    context.pii.containsAny([{}]){}\n}};\n",
            pii.redact.join(","),
            redact_quoted.join(", "),
            not_blocked
        );
    }

    if !pii.block.is_empty() {
        let block_quoted: Vec<String> =
            pii.block.iter().map(|k| format!("\"{k}\"")).collect();
        out.push_str("// Block user PII queries\n");
        forbid(
            out,
            &format!(
                "context.user_intent == \"info.query.pii\" &&\n    (context.pii.containsAny([{}]) || context.confidence > 30)",
                block_quoted.join(", ")
            ),
        );
    }
}

fn compile_capabilities(out: &mut String, capabilities: &CapabilitiesConfig) {
    if capabilities.block.is_empty() {
        return;
    }

    // Grouped in pairs for readability.
    for pair in capabilities.block.chunks(2) {
        let conditions: Vec<String> = pair
            .iter()
            .map(|c| format!("context.capabilities.contains(\"{c}\")"))
            .collect();
        forbid(out, &conditions.join(" ||\n    "));
    }
}

fn compile_fail_safe(out: &mut String, safety: &SafetyConfig) {
    let risk = (safety.max_risk_score * 100.0) as i64;
    forbid(
        out,
        &format!(
            "context.risk_score > {risk} &&\n    context.intent != \"conv.greeting\" &&\n    context.intent != \"conv.other\" &&\n    context.intent != \"info.query\" &&\n    context.intent != \"info.summarize\""
        ),
    );
}

fn compile_agent_limits(out: &mut String, limits: &AgentLimitsConfig) {
    out.push_str("// Step budget enforcement\n");
    forbid(
        out,
        "context.agent_state.max_steps > 0 &&\n    context.agent_state.current_step > context.agent_state.max_steps",
    );

    out.push_str("// Token budget enforcement\n");
    forbid(
        out,
        "context.agent_state.token_budget > 0 &&\n    context.agent_state.total_tokens > context.agent_state.token_budget",
    );

    if limits.tighten_after_step > 0 {
        let _ = writeln!(out, "// Tighten thresholds after step {}", limits.tighten_after_step);
        forbid(
            out,
            &format!(
                "context.agent_state.current_step > {} &&\n    (context.intent == \"file.write\" || context.intent == \"sys.control\") &&\n    context.confidence > {}",
                limits.tighten_after_step, limits.tightened_threshold
            ),
        );
    }
}

fn compile_source_trust(
    out: &mut String,
    sources: &std::collections::BTreeMap<String, SourceRule>,
) {
    for (source, rule) in sources {
        if rule.block_intents.is_empty() {
            continue;
        }

        let intent_checks: Vec<String> = rule
            .block_intents
            .iter()
            .map(|i| format!("context.intent == \"{i}\""))
            .collect();

        let origin_check = if source == "untrusted_web" {
            format!(
                "context.source_data.trusted == false &&\n    context.source_data.origin == \"{source}\""
            )
        } else {
            format!("context.source_data.origin == \"{source}\"")
        };

        let _ = writeln!(out, "// Source: {source}");
        forbid(
            out,
            &format!("{origin_check} &&\n    ({})", intent_checks.join(" || ")),
        );
    }
}

fn compile_roles(out: &mut String, roles: &std::collections::BTreeMap<String, RoleConfig>) {
    for (name, role) in roles {
        // Every role predicate is guarded by the role equality check so the
        // rule never fires for other roles.

        if !role.allow_actions.is_empty() {
            // Intent allowlist derived from the allowed action verbs: any
            // taxonomy intent whose canonical action is permitted stays
            // allowed, everything else is forbidden for this role.
            let allowed: Vec<String> = crate::domain::intent::ALL
                .iter()
                .filter(|i| {
                    role.allow_actions
                        .iter()
                        .any(|a| a == crate::domain::intent::action_for_intent(i))
                })
                .map(|i| format!("context.intent == \"{i}\""))
                .collect();
            if !allowed.is_empty() {
                let _ = writeln!(out, "// Role: {name} - {}", role.description);
                out.push_str("// Block any intent outside the allowlist\n");
                forbid(
                    out,
                    &format!(
                        "context.role == \"{name}\" &&\n    !({})",
                        allowed.join(" ||\n      ")
                    ),
                );
            }
        }

        if !role.allowed_topics.is_empty() {
            let topic_checks: Vec<String> = role
                .allowed_topics
                .iter()
                .map(|t| format!("context.topic == \"{t}\""))
                .collect();
            let _ = writeln!(out, "// Role: {name} - topic allowlist");
            forbid(
                out,
                &format!(
                    "context.role == \"{name}\" &&\n    context.topic != \"\" &&\n    !({})",
                    topic_checks.join(" || ")
                ),
            );
        }

        if !role.block_topics.is_empty() {
            let block_checks: Vec<String> = role
                .block_topics
                .iter()
                .map(|t| format!("context.topic == \"{t}\""))
                .collect();
            let _ = writeln!(out, "// Role: {name} - explicit topic blocks");
            forbid(
                out,
                &format!(
                    "context.role == \"{name}\" &&\n    ({})",
                    block_checks.join(" || ")
                ),
            );
        }

        if !role.block_intents.is_empty() {
            let block_checks: Vec<String> = role
                .block_intents
                .iter()
                .map(|i| format!("context.intent == \"{i}\""))
                .collect();
            let _ = writeln!(out, "// Role: {name} - explicit intent blocks");
            forbid(
                out,
                &format!(
                    "context.role == \"{name}\" &&\n    ({})",
                    block_checks.join(" || ")
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::policy::GuardrailPolicy;

    fn sample_policy() -> GuardrailPolicy {
        serde_yaml::from_str(
            r#"
version: "2.1"
safety:
  prompt_injection: block
  toxicity_threshold: 0.7
  max_risk_score: 0.8
pii:
  block: [ssn, credit_card]
  redact: [email, phone]
capabilities:
  block: [file_delete, privilege_escalation, process_control]
intents:
  code.exploit:
    action: block
    threshold: 40
  file.write:
    action: block
    threshold: 60
    when:
      sensitivity: sensitive
  info.query:
    action: allow
    threshold: 0
user_intent_overrides:
  code.exploit:
    threshold: 30
roles:
  recruiter:
    description: Recruiting assistant
    allow_actions: [query, summarize, greeting]
    allowed_topics: [recruitment]
    block_intents: [sys.control]
    block_topics: [politics]
agent_limits:
  max_steps: 10
  token_budget: 50000
  tighten_after_step: 5
  tightened_threshold: 30
source_trust:
  untrusted_web:
    block_intents: [file.write, sys.control]
  tool_output:
    block_intents: [sys.control]
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_compilation_is_deterministic() {
        let policy = sample_policy();
        assert_eq!(compile(&policy), compile(&policy));
    }

    #[test]
    fn test_default_permit_on_empty_pii() {
        let text = compile(&sample_policy());
        assert!(text.contains("context.pii.isEmpty()"));
        assert!(text.starts_with("// Auto-generated from guardrail.yaml"));
    }

    #[test]
    fn test_safety_section() {
        let text = compile(&sample_policy());
        assert!(text.contains("context.prompt_injection == true"));
        assert!(text.contains("context.toxicity > 70"));
    }

    #[test]
    fn test_intent_thresholds() {
        let text = compile(&sample_policy());
        assert!(text.contains(
            "(context.intent == \"code.exploit\" || context.user_intent == \"code.exploit\")"
        ));
        assert!(text.contains("context.confidence > 40"));
        // Sensitivity guard precedes the intent clause.
        assert!(text.contains("resource.sensitivity == \"sensitive\""));
        // allow-action intents produce no forbid.
        assert!(!text.contains("context.intent == \"info.query\" ||"));
    }

    #[test]
    fn test_user_intent_override_is_stricter() {
        let text = compile(&sample_policy());
        assert!(text
            .contains("context.user_intent == \"code.exploit\" &&\n    context.confidence > 30"));
    }

    #[test]
    fn test_pii_controls() {
        let text = compile(&sample_policy());
        assert!(text.contains("context.pii.contains(\"ssn\")"));
        assert!(text.contains("@obligation(\"REDACT\")"));
        assert!(text.contains("@fields(\"email,phone\")"));
        assert!(text.contains("context.pii.containsAny([\"email\", \"phone\"])"));
        // Redact permit excludes blocked kinds.
        assert!(text.contains("!(context.pii.contains(\"ssn\") || context.pii.contains(\"credit_card\"))"));
        assert!(text.contains("context.user_intent == \"info.query.pii\""));
    }

    #[test]
    fn test_capabilities_grouped_in_pairs() {
        let text = compile(&sample_policy());
        assert!(text.contains(
            "context.capabilities.contains(\"file_delete\") ||\n    context.capabilities.contains(\"privilege_escalation\")"
        ));
        // Odd-length tail gets its own rule.
        assert!(text.contains("context.capabilities.contains(\"process_control\")\n};"));
    }

    #[test]
    fn test_fail_safe_spares_safe_intents() {
        let text = compile(&sample_policy());
        assert!(text.contains("context.risk_score > 80"));
        assert!(text.contains("context.intent != \"conv.greeting\""));
        assert!(text.contains("context.intent != \"info.summarize\""));
    }

    #[test]
    fn test_agent_limits() {
        let text = compile(&sample_policy());
        assert!(text.contains("context.agent_state.current_step > context.agent_state.max_steps"));
        assert!(text.contains("context.agent_state.total_tokens > context.agent_state.token_budget"));
        assert!(text.contains("context.agent_state.current_step > 5"));
        assert!(text.contains("context.confidence > 30"));
    }

    #[test]
    fn test_source_trust_rules() {
        let text = compile(&sample_policy());
        // untrusted_web carries the trusted == false predicate.
        assert!(text.contains(
            "context.source_data.trusted == false &&\n    context.source_data.origin == \"untrusted_web\""
        ));
        // Other sources match on origin alone.
        assert!(text.contains("context.source_data.origin == \"tool_output\""));
    }

    #[test]
    fn test_role_rules_are_guarded_by_role() {
        let text = compile(&sample_policy());
        assert!(text.contains("context.role == \"recruiter\""));
        assert!(text.contains("!(context.topic == \"recruitment\")"));
        assert!(text.contains("context.topic == \"politics\""));
        assert!(text.contains("context.intent == \"sys.control\""));
        // Topic allowlist only fires when a topic was detected at all.
        assert!(text.contains("context.topic != \"\""));
    }

    #[test]
    fn test_role_intent_allowlist_derived_from_actions() {
        let text = compile(&sample_policy());
        assert!(text.contains("// Block any intent outside the allowlist"));
        // query covers both info.query and info.query.pii.
        assert!(text.contains("context.intent == \"info.query\""));
        assert!(text.contains("context.intent == \"info.query.pii\""));
        assert!(text.contains("context.intent == \"conv.greeting\""));
        // write/exploit are not allowed actions for the recruiter role, so
        // their intents are absent from the allowlist disjunction.
        let allowlist_rule = text
            .split("// Block any intent outside the allowlist")
            .nth(1)
            .unwrap()
            .split("};")
            .next()
            .unwrap();
        assert!(!allowlist_rule.contains("file.write"));
        assert!(!allowlist_rule.contains("code.exploit"));
    }
}
