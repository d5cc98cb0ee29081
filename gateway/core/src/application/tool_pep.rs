// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Tool policy enforcement point
//!
//! Authorizes named tool invocations for agents against the same rule
//! engine as the chat proxy. A `RequireApproval` obligation turns an allow
//! into a pending (not allowed) response carrying an approval id; there is
//! no persistent approval queue.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::domain::context::EvaluationContext;
use crate::domain::decision::{Decision, Obligation, OBLIGATION_REQUIRE_APPROVAL};
use crate::infrastructure::audit::{signals_snapshot, AuditEntry, AuditLogger, Principal};
use crate::infrastructure::engine::PolicyEngine;

/// An agent's request to invoke a tool.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolRequest {
    pub tool: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
    #[serde(default)]
    pub agent_id: String,
    #[serde(default)]
    pub session_id: String,
}

/// Result of a tool authorization check.
#[derive(Debug, Clone, Serialize)]
pub struct ToolResponse {
    pub allowed: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub reason: String,
    pub request_id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub obligations: Vec<Obligation>,
    /// Present when the decision is pending human approval.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_id: Option<String>,
}

pub struct ToolAuthorizer {
    engine: Arc<PolicyEngine>,
    audit: Arc<AuditLogger>,
}

impl ToolAuthorizer {
    pub fn new(engine: Arc<PolicyEngine>, audit: Arc<AuditLogger>) -> Self {
        Self { engine, audit }
    }

    pub fn authorize(&self, ctx: &EvaluationContext, request: &ToolRequest) -> ToolResponse {
        let request_id = Uuid::new_v4().to_string();
        let start = Instant::now();

        let result = self.engine.evaluate(ctx);
        let mut allowed = result.decision == Decision::Allow;
        let mut reason = result.reason.clone();
        let mut approval_id = None;

        if allowed
            && result
                .obligations
                .iter()
                .any(|o| o.kind == OBLIGATION_REQUIRE_APPROVAL)
        {
            // Deny-pending: the caller gets an approval id to correlate, but
            // the invocation is not allowed.
            allowed = false;
            approval_id = Some(Uuid::new_v4().to_string());
            reason = format!("Approval required for tool invocation: {}", request.tool);
        } else if !allowed {
            reason = format!(
                "Policy denied tool invocation: {} - {}",
                request.tool, result.reason
            );
        }

        info!(
            tool = %request.tool,
            allowed,
            request_id = %request_id,
            "tool authorization"
        );

        self.audit.log(&AuditEntry {
            timestamp: Utc::now(),
            request_id: request_id.clone(),
            principal: Principal {
                id: request.agent_id.clone(),
                role: ctx.role.clone(),
                kind: "agent".to_string(),
            },
            action: "invoke_tool".to_string(),
            resource: request.tool.clone(),
            signals: signals_snapshot(ctx),
            decision: if allowed { "ALLOW" } else { "DENY" }.to_string(),
            policy_id: result.policy_id,
            reason: reason.clone(),
            obligations: result.obligations.iter().map(|o| o.kind.clone()).collect(),
            latency_ms: start.elapsed().as_secs_f64() * 1000.0,
            provider: ctx.provider.clone(),
        });

        ToolResponse {
            allowed,
            reason,
            request_id,
            obligations: result.obligations,
            approval_id,
        }
    }
}
