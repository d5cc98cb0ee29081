// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! HTTP surface
//!
//! Routes:
//! - `GET  /health`              liveness
//! - `GET  /api/status`          provider status
//! - `POST /v1/chat/completions` guarded chat proxy (OpenAI-compatible)
//! - `POST /api/chat`            guarded chat proxy (Ollama-compatible)
//! - `POST /v1/tools/authorize`  tool policy enforcement point
//! - `GET  /metrics`             Prometheus exposition

use std::sync::Arc;

use axum::{
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use crate::application::{GuardrailService, ToolAuthorizer, ToolRequest};
use crate::domain::context::EvaluationContext;
use crate::infrastructure::audit::AuditLogger;
use crate::infrastructure::config::GatewayConfig;
use crate::infrastructure::detectors::CanaryService;
use crate::infrastructure::metrics;
use crate::infrastructure::providers::{ChatProvider, CircuitBreaker};

pub struct AppState {
    pub config: GatewayConfig,
    pub provider: Arc<dyn ChatProvider>,
    pub guardrail: GuardrailService,
    pub tool_authorizer: ToolAuthorizer,
    pub audit: Arc<AuditLogger>,
    pub canary: Arc<CanaryService>,
    pub breaker: Option<CircuitBreaker>,
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/status", get(status))
        .route("/v1/chat/completions", post(super::proxy::chat))
        .route("/api/chat", post(super::proxy::chat))
        .route("/v1/tools/authorize", post(authorize_tool))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok", "service": "aegis-guardrail-gateway"}))
}

async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "provider": state.provider.name(),
    }))
}

async fn metrics_handler() -> impl IntoResponse {
    (
        [("Content-Type", "text/plain; version=0.0.4")],
        metrics::render(),
    )
}

async fn authorize_tool(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(mut request): Json<ToolRequest>,
) -> impl IntoResponse {
    // Agent and source context ride in on headers.
    let mut ctx = EvaluationContext::new(state.provider.name(), "public", "");
    ctx.agent_state.current_step = header_int(&headers, "X-Agent-Step");
    ctx.agent_state.max_steps = header_int(&headers, "X-Agent-Max-Steps");
    if let Some(origin) = header_str(&headers, "X-Source-Origin") {
        ctx.source_data.origin = origin;
    }
    ctx.source_data.trusted = header_str(&headers, "X-Source-Trusted").as_deref() == Some("true");
    ctx.finalize();

    if request.agent_id.is_empty() {
        if let Some(agent_id) = header_str(&headers, "X-Agent-ID") {
            request.agent_id = agent_id;
        }
    }

    let response = state.tool_authorizer.authorize(&ctx, &request);
    let status = if response.allowed || response.approval_id.is_some() {
        axum::http::StatusCode::OK
    } else {
        axum::http::StatusCode::FORBIDDEN
    };

    (
        status,
        [("X-Guardrail-Request-ID", response.request_id.clone())],
        Json(response),
    )
}

pub(crate) fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn header_int(headers: &HeaderMap, name: &str) -> i64 {
    header_str(headers, name)
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}
