// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Predicate evaluation
//!
//! Values are strings, booleans, longs and string sets. Floats from the
//! context are exposed as percent integers (`(x * 100) as i64`, truncating)
//! so policies compare against thresholds like `> 40`. Sub-records are
//! flattened into dotted paths (`context.agent_state.current_step`).
//!
//! Evaluation is total: a missing field or type mismatch yields `None`,
//! which the engine treats as the rule not matching.

use std::collections::{BTreeSet, HashMap};

use crate::domain::context::EvaluationContext;

use super::parser::{CmpOp, Expr, Literal, Operand, SetMethod};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Long(i64),
    Bool(bool),
    Set(BTreeSet<String>),
}

pub type EvalRecord = HashMap<String, Value>;

fn percent(x: f64) -> i64 {
    (x * 100.0) as i64
}

/// Flatten an evaluation context into the record the predicates see.
pub fn build_record(ctx: &EvaluationContext) -> EvalRecord {
    let mut record = EvalRecord::new();

    // Semantic signals
    record.insert("context.intent".into(), Value::Str(ctx.intent.clone()));
    record.insert(
        "context.user_intent".into(),
        Value::Str(ctx.user_intent.clone()),
    );
    record.insert(
        "context.system_intent".into(),
        Value::Str(ctx.system_intent.clone()),
    );
    record.insert("context.action".into(), Value::Str(ctx.action.clone()));
    record.insert("context.domain".into(), Value::Str(ctx.domain.clone()));
    record.insert(
        "context.confidence".into(),
        Value::Long(percent(ctx.confidence)),
    );
    record.insert(
        "context.action_confidence".into(),
        Value::Long(percent(ctx.action_confidence)),
    );
    record.insert(
        "context.domain_confidence".into(),
        Value::Long(percent(ctx.domain_confidence)),
    );
    record.insert(
        "context.risk_score".into(),
        Value::Long(percent(ctx.risk_score)),
    );
    record.insert(
        "context.analyzer_failed".into(),
        Value::Bool(ctx.analyzer_failed),
    );
    record.insert("context.role".into(), Value::Str(ctx.role.clone()));
    record.insert("context.provider".into(), Value::Str(ctx.provider.clone()));

    // Deterministic signals
    record.insert(
        "context.pii".into(),
        Value::Set(ctx.signals.pii.iter().map(|k| k.as_str().to_string()).collect()),
    );
    record.insert(
        "context.toxicity".into(),
        Value::Long(percent(ctx.signals.toxicity)),
    );
    record.insert(
        "context.prompt_injection".into(),
        Value::Bool(ctx.signals.prompt_injection),
    );
    record.insert(
        "context.indirect_injection".into(),
        Value::Bool(ctx.signals.indirect_injection),
    );
    record.insert(
        "context.topic".into(),
        Value::Str(ctx.signals.topic.clone()),
    );
    record.insert(
        "context.capabilities".into(),
        Value::Set(
            ctx.signals
                .capabilities
                .iter()
                .map(|c| c.as_str().to_string())
                .collect(),
        ),
    );

    // Request metadata
    record.insert(
        "context.streaming".into(),
        Value::Bool(ctx.request.streaming),
    );
    record.insert("context.tokens".into(), Value::Long(ctx.request.tokens));

    // Agent state
    record.insert(
        "context.agent_state.current_step".into(),
        Value::Long(ctx.agent_state.current_step),
    );
    record.insert(
        "context.agent_state.max_steps".into(),
        Value::Long(ctx.agent_state.max_steps),
    );
    record.insert(
        "context.agent_state.total_tokens".into(),
        Value::Long(ctx.agent_state.total_tokens),
    );
    record.insert(
        "context.agent_state.token_budget".into(),
        Value::Long(ctx.agent_state.token_budget),
    );

    // Source data
    record.insert(
        "context.source_data.origin".into(),
        Value::Str(ctx.source_data.origin.clone()),
    );
    record.insert(
        "context.source_data.trusted".into(),
        Value::Bool(ctx.source_data.trusted),
    );

    // Resource attribute
    record.insert(
        "resource.sensitivity".into(),
        Value::Str(ctx.resource_sensitivity.clone()),
    );

    record
}

fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::Str(s) => Value::Str(s.clone()),
        Literal::Long(n) => Value::Long(*n),
        Literal::Bool(b) => Value::Bool(*b),
    }
}

fn operand_value(op: &Operand, record: &EvalRecord) -> Option<Value> {
    match op {
        Operand::Field(path) => record.get(path).cloned(),
        Operand::Lit(lit) => Some(literal_value(lit)),
    }
}

impl Expr {
    /// `None` signals a missing field or type mismatch.
    pub fn eval(&self, record: &EvalRecord) -> Option<Value> {
        match self {
            Expr::Or(left, right) => {
                let l = as_bool(left.eval(record)?)?;
                if l {
                    return Some(Value::Bool(true));
                }
                let r = as_bool(right.eval(record)?)?;
                Some(Value::Bool(r))
            }
            Expr::And(left, right) => {
                let l = as_bool(left.eval(record)?)?;
                if !l {
                    return Some(Value::Bool(false));
                }
                let r = as_bool(right.eval(record)?)?;
                Some(Value::Bool(r))
            }
            Expr::Not(inner) => {
                let value = as_bool(inner.eval(record)?)?;
                Some(Value::Bool(!value))
            }
            Expr::Cmp(lhs, op, rhs) => {
                let l = operand_value(lhs, record)?;
                let r = operand_value(rhs, record)?;
                compare(&l, *op, &r).map(Value::Bool)
            }
            Expr::SetOp {
                field,
                method,
                args,
            } => {
                let set = match record.get(field)? {
                    Value::Set(set) => set,
                    _ => return None,
                };
                let result = match method {
                    SetMethod::IsEmpty => set.is_empty(),
                    SetMethod::Contains => match args.first()? {
                        Literal::Str(s) => set.contains(s),
                        _ => return None,
                    },
                    SetMethod::ContainsAny => args.iter().any(|arg| match arg {
                        Literal::Str(s) => set.contains(s),
                        _ => false,
                    }),
                };
                Some(Value::Bool(result))
            }
            Expr::Operand(op) => operand_value(op, record),
        }
    }
}

fn as_bool(value: Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(b),
        _ => None,
    }
}

fn compare(left: &Value, op: CmpOp, right: &Value) -> Option<bool> {
    match op {
        CmpOp::Eq | CmpOp::Ne => {
            let eq = match (left, right) {
                (Value::Str(a), Value::Str(b)) => a == b,
                (Value::Long(a), Value::Long(b)) => a == b,
                (Value::Bool(a), Value::Bool(b)) => a == b,
                _ => return None,
            };
            Some(if op == CmpOp::Eq { eq } else { !eq })
        }
        CmpOp::Gt | CmpOp::Lt => match (left, right) {
            (Value::Long(a), Value::Long(b)) => {
                Some(if op == CmpOp::Gt { a > b } else { a < b })
            }
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::context::EvaluationContext;
    use crate::domain::signals::{Capability, PiiKind};
    use crate::infrastructure::engine::parser::parse_document;

    fn ctx() -> EvaluationContext {
        let mut c = EvaluationContext::new("openai", "public", "recruiter");
        c.intent = "info.query".to_string();
        c.confidence = 0.87;
        c.signals.toxicity = 0.25;
        c.signals.pii.insert(PiiKind::Email);
        c.signals.capabilities.insert(Capability::FileDelete);
        c.agent_state.current_step = 3;
        c.agent_state.max_steps = 10;
        c.finalize();
        c
    }

    fn eval_when(rule_text: &str, ctx: &EvaluationContext) -> Option<bool> {
        let doc = format!("permit(principal, action, resource)\nwhen {{ {rule_text} }};");
        let rules = parse_document(&doc).unwrap();
        rules[0]
            .when
            .as_ref()
            .unwrap()
            .eval(&build_record(ctx))
            .and_then(|v| match v {
                Value::Bool(b) => Some(b),
                _ => None,
            })
    }

    #[test]
    fn test_floats_become_truncated_percent_integers() {
        let record = build_record(&ctx());
        assert_eq!(record["context.confidence"], Value::Long(87));
        assert_eq!(record["context.toxicity"], Value::Long(25));
    }

    #[test]
    fn test_string_and_long_comparisons() {
        let c = ctx();
        assert_eq!(eval_when("context.intent == \"info.query\"", &c), Some(true));
        assert_eq!(eval_when("context.intent != \"info.query\"", &c), Some(false));
        assert_eq!(eval_when("context.confidence > 80", &c), Some(true));
        assert_eq!(eval_when("context.confidence < 80", &c), Some(false));
    }

    #[test]
    fn test_set_operations() {
        let c = ctx();
        assert_eq!(eval_when("context.pii.contains(\"email\")", &c), Some(true));
        assert_eq!(eval_when("context.pii.contains(\"ssn\")", &c), Some(false));
        assert_eq!(eval_when("context.pii.isEmpty()", &c), Some(false));
        assert_eq!(
            eval_when("context.pii.containsAny([\"ssn\", \"email\"])", &c),
            Some(true)
        );
        assert_eq!(
            eval_when("context.capabilities.contains(\"file_delete\")", &c),
            Some(true)
        );
    }

    #[test]
    fn test_nested_record_fields() {
        let c = ctx();
        assert_eq!(
            eval_when(
                "context.agent_state.max_steps > 0 && context.agent_state.current_step > context.agent_state.max_steps",
                &c
            ),
            Some(false)
        );
        assert_eq!(
            eval_when("context.source_data.origin == \"user\"", &c),
            Some(true)
        );
        assert_eq!(
            eval_when("resource.sensitivity == \"public\"", &c),
            Some(true)
        );
    }

    #[test]
    fn test_boolean_connectives_and_negation() {
        let c = ctx();
        assert_eq!(
            eval_when(
                "(context.intent == \"x\" || context.confidence > 50) && !(context.prompt_injection == true)",
                &c
            ),
            Some(true)
        );
    }

    #[test]
    fn test_missing_field_yields_none() {
        let c = ctx();
        assert_eq!(eval_when("context.nonexistent == \"x\"", &c), None);
        // A missing field inside a conjunction poisons the predicate only if
        // it is actually needed for the outcome.
        assert_eq!(
            eval_when("context.prompt_injection == true && context.nonexistent == \"x\"", &c),
            Some(false)
        );
    }

    #[test]
    fn test_type_mismatch_yields_none() {
        let c = ctx();
        assert_eq!(eval_when("context.intent > 40", &c), None);
        assert_eq!(eval_when("context.confidence == \"high\"", &c), None);
    }

    #[test]
    fn test_role_is_exposed() {
        let c = ctx();
        assert_eq!(eval_when("context.role == \"recruiter\"", &c), Some(true));
    }
}
