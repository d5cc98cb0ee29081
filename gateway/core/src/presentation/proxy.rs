// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Chat proxy handler
//!
//! Pre-stream enforcement: the engine decision completes, and any denial is
//! emitted, before a single upstream byte is relayed. Streamed requests are
//! buffered upstream-side for the same reason. Obligations are applied to
//! the forwarded body, and the provider response passes an egress PII scan
//! (plus a canary-leak check when enabled) before reaching the client.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::Response;
use chrono::Utc;
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::application::guardrail::ScreenVerdict;
use crate::domain::context::EvaluationContext;
use crate::domain::decision::{
    error_code, EvaluationResult, Obligation, OBLIGATION_REDACT, OBLIGATION_REQUIRE_APPROVAL,
};
use crate::domain::message::ChatRequest;
use crate::domain::signals::PiiKind;
use crate::infrastructure::audit::{signals_snapshot, AuditEntry, Principal};
use crate::infrastructure::metrics;
use crate::infrastructure::providers::serialize_request;

use super::api::{header_str, AppState};

pub async fn chat(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let start = Instant::now();
    let request_id = Uuid::new_v4().to_string();
    metrics::record_request();

    let sensitivity =
        header_str(&headers, "X-Resource-Sensitivity").unwrap_or_else(|| "public".to_string());
    let role = header_str(&headers, "X-Guardrail-Role").unwrap_or_default();
    if !role.is_empty() {
        info!(role = %role, request_id = %request_id, "request role detected");
    }

    let mut ctx = EvaluationContext::new(state.provider.name(), &sensitivity, &role);

    let response = process(&state, &uri, body, &request_id, &mut ctx, start).await;
    state.canary.release(&request_id);

    metrics::observe_latency(start.elapsed().as_secs_f64());
    info!(request_id = %request_id, elapsed_ms = start.elapsed().as_millis() as u64, "request completed");
    response
}

async fn process(
    state: &AppState,
    uri: &Uri,
    body: Bytes,
    request_id: &str,
    ctx: &mut EvaluationContext,
    start: Instant,
) -> Response {
    // Parse the body through the provider adapter. A parse failure degrades
    // to an opaque passthrough: no signals, the policy sees an empty context
    // and applies its defaults.
    let parsed = match state.provider.parse_request(&body) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!(request_id = %request_id, error = %e, "failed to parse request; opaque passthrough");
            None
        }
    };

    let mut forward_body = body.to_vec();
    let mut engine_ran = false;

    match parsed {
        Some(mut request) => {
            let verdict = state.guardrail.screen(&request, ctx).await;
            match verdict {
                ScreenVerdict::Deny {
                    code,
                    reason,
                    policy_id: deny_policy,
                } => {
                    let engine_denied = code == error_code::GUARDRAIL_BLOCKED;
                    audit(state, ctx, request_id, &request.model, "DENY", &reason, &deny_policy, &[], start);
                    let mut response =
                        error_response(StatusCode::FORBIDDEN, code, &reason, request_id);
                    if engine_denied {
                        add_policy_headers(&mut response, state);
                    }
                    set_header(&mut response, "X-Guardrail-Blocked", "true");
                    return response;
                }
                ScreenVerdict::Allow(result) => {
                    engine_ran = true;

                    if let Some(response) =
                        apply_obligations(state, &mut request, &result, request_id, ctx, start)
                    {
                        return response;
                    }

                    // Canary injection guards the system prompt on the way out.
                    if state.config.canary_enabled {
                        inject_canary(state, &mut request, request_id);
                    }

                    let redacted = result
                        .obligations
                        .iter()
                        .any(|o| o.kind == OBLIGATION_REDACT);
                    if redacted || state.config.canary_enabled {
                        match serialize_request(&request) {
                            Ok(new_body) => forward_body = new_body,
                            Err(e) => {
                                error!(request_id = %request_id, error = %e, "failed to re-serialize request");
                                return error_response(
                                    StatusCode::INTERNAL_SERVER_ERROR,
                                    error_code::PROXY_ERROR,
                                    "Failed to rewrite request body",
                                    request_id,
                                );
                            }
                        }
                    }

                    audit(
                        state,
                        ctx,
                        request_id,
                        &request.model,
                        "ALLOW",
                        &result.reason,
                        &result.policy_id,
                        &result.obligations,
                        start,
                    );
                }
            }
        }
        None => {
            // Empty context evaluation still applies the policy defaults.
            ctx.finalize();
            let result = state.guardrail.engine().evaluate(ctx);
            metrics::record_decision(result.decision.as_str());
            engine_ran = true;
            if result.decision == crate::domain::decision::Decision::Deny {
                audit(state, ctx, request_id, "", "DENY", &result.reason, &result.policy_id, &[], start);
                let mut response = error_response(
                    StatusCode::FORBIDDEN,
                    error_code::GUARDRAIL_BLOCKED,
                    &result.reason,
                    request_id,
                );
                add_policy_headers(&mut response, state);
                set_header(&mut response, "X-Guardrail-Blocked", "true");
                return response;
            }
            audit(state, ctx, request_id, "", "ALLOW", &result.reason, &result.policy_id, &[], start);
        }
    }

    // Forward upstream, gated by the circuit breaker when enabled.
    if let Some(breaker) = &state.breaker {
        if breaker.try_acquire().is_err() {
            warn!(request_id = %request_id, "circuit breaker open; rejecting forward");
            return error_response(
                StatusCode::BAD_GATEWAY,
                error_code::PROVIDER_ERROR,
                "Provider unavailable (circuit open)",
                request_id,
            );
        }
    }

    let upstream = match state.provider.forward(uri.path(), forward_body).await {
        Ok(upstream) => {
            if let Some(breaker) = &state.breaker {
                if upstream.status >= 500 {
                    breaker.record_failure();
                } else {
                    breaker.record_success();
                }
            }
            upstream
        }
        Err(e) => {
            if let Some(breaker) = &state.breaker {
                breaker.record_failure();
            }
            error!(request_id = %request_id, error = %e, "provider request failed");
            return error_response(
                StatusCode::BAD_GATEWAY,
                error_code::PROVIDER_ERROR,
                "Failed to connect to provider",
                request_id,
            );
        }
    };

    // Egress scan before any byte reaches the client.
    if let Some(response) = egress_scan(state, &upstream.body, request_id) {
        return response;
    }

    let mut builder = Response::builder()
        .status(StatusCode::from_u16(upstream.status).unwrap_or(StatusCode::BAD_GATEWAY));
    for (name, value) in upstream.headers.iter() {
        // The body is relayed as a single buffer; framing headers from the
        // upstream connection no longer apply.
        if name == reqwest::header::TRANSFER_ENCODING || name == reqwest::header::CONTENT_LENGTH {
            continue;
        }
        builder = builder.header(name, value);
    }
    let mut response = builder
        .body(axum::body::Body::from(upstream.body))
        .unwrap_or_default();

    set_header(&mut response, "X-Guardrail-Request-ID", request_id);
    if engine_ran {
        add_policy_headers(&mut response, state);
    }
    response
}

/// Apply obligations to the outgoing request. Returns a response only when
/// an obligation converts the allow into a denial.
fn apply_obligations(
    state: &AppState,
    request: &mut ChatRequest,
    result: &EvaluationResult,
    request_id: &str,
    ctx: &EvaluationContext,
    start: Instant,
) -> Option<Response> {
    for obligation in &result.obligations {
        match obligation.kind.as_str() {
            OBLIGATION_REDACT => {
                let kinds: Vec<PiiKind> = obligation
                    .fields
                    .iter()
                    .filter_map(|f| PiiKind::parse(f))
                    .collect();
                info!(request_id = %request_id, fields = ?obligation.fields, "applying REDACT obligation");
                for msg in &mut request.messages {
                    msg.content = state.guardrail.aggregator().redact_pii(&msg.content, &kinds);
                }
            }
            OBLIGATION_REQUIRE_APPROVAL => {
                // No persistent approval workflow: deny pending.
                let reason = "Request pending approval";
                audit(state, ctx, request_id, &request.model, "DENY", reason, &result.policy_id, &result.obligations, start);
                let mut response = error_response(
                    StatusCode::FORBIDDEN,
                    error_code::GUARDRAIL_BLOCKED,
                    reason,
                    request_id,
                );
                add_policy_headers(&mut response, state);
                set_header(&mut response, "X-Guardrail-Blocked", "true");
                return Some(response);
            }
            _ => {}
        }
    }
    None
}

fn inject_canary(state: &AppState, request: &mut ChatRequest, request_id: &str) {
    if let Some(system) = request.messages.iter_mut().find(|m| m.role == "system") {
        let canary = state.canary.issue(request_id);
        system.content = canary.inject(&system.content);
    }
}

/// Scan the upstream response for high-severity PII and canary leaks.
fn egress_scan(state: &AppState, upstream_body: &[u8], request_id: &str) -> Option<Response> {
    let parsed = match state.provider.parse_response(upstream_body) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(request_id = %request_id, error = %e, "failed to parse provider response");
            return None;
        }
    };

    for content in &parsed.contents {
        if content.is_empty() {
            continue;
        }

        let output_pii = state.guardrail.aggregator().detect_pii(content);
        if let Some(kind) = output_pii.iter().find(|k| k.is_high_severity()) {
            error!(request_id = %request_id, kind = %kind, "output blocked: sensitive data in response");
            let mut response = error_response(
                StatusCode::FORBIDDEN,
                error_code::OUTPUT_GUARDRAIL_BLOCKED,
                "Response contained sensitive data and was blocked",
                request_id,
            );
            set_header(&mut response, "X-Guardrail-Output-Blocked", "true");
            return Some(response);
        }
        if !output_pii.is_empty() {
            warn!(request_id = %request_id, pii = ?output_pii, "output warning: PII detected in response");
        }

        if state.config.canary_enabled && state.canary.check(request_id, content) {
            error!(request_id = %request_id, "output blocked: canary token leaked");
            let mut response = error_response(
                StatusCode::FORBIDDEN,
                error_code::OUTPUT_GUARDRAIL_BLOCKED,
                "Response leaked a confidential marker and was blocked",
                request_id,
            );
            set_header(&mut response, "X-Guardrail-Output-Blocked", "true");
            return Some(response);
        }
    }

    None
}

fn error_response(status: StatusCode, code: &str, message: &str, request_id: &str) -> Response {
    let body = json!({
        "error": code,
        "code": code,
        "message": message,
        "request_id": request_id,
    });
    let mut response = Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(axum::body::Body::from(body.to_string()))
        .unwrap_or_default();
    set_header(&mut response, "X-Guardrail-Request-ID", request_id);
    response
}

fn add_policy_headers(response: &mut Response, state: &AppState) {
    set_header(response, "X-Guardrail-PreStream-Enforced", "true");
    let version = state.guardrail.engine().policy_version();
    set_header(response, "X-Guardrail-Policy-Version", &version);
}

fn set_header(response: &mut Response, name: &str, value: &str) {
    if let (Ok(name), Ok(value)) = (
        axum::http::HeaderName::try_from(name),
        axum::http::HeaderValue::try_from(value),
    ) {
        response.headers_mut().insert(name, value);
    }
}

#[allow(clippy::too_many_arguments)]
fn audit(
    state: &AppState,
    ctx: &EvaluationContext,
    request_id: &str,
    model: &str,
    decision: &str,
    reason: &str,
    policy_id: &str,
    obligations: &[Obligation],
    start: Instant,
) {
    state.audit.log(&AuditEntry {
        timestamp: Utc::now(),
        request_id: request_id.to_string(),
        principal: Principal {
            id: String::new(),
            role: ctx.role.clone(),
            kind: "user".to_string(),
        },
        action: "chat".to_string(),
        resource: if model.is_empty() {
            "LLM::default".to_string()
        } else {
            model.to_string()
        },
        signals: signals_snapshot(ctx),
        decision: decision.to_string(),
        policy_id: policy_id.to_string(),
        reason: reason.to_string(),
        obligations: obligations.iter().map(|o| o.kind.clone()).collect(),
        latency_ms: start.elapsed().as_secs_f64() * 1000.0,
        provider: ctx.provider.clone(),
    });
}
