// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Structured audit logging
//
// One JSON line per decision, appended to a file or stdout. Writes are
// serialized behind a mutex; a failed write falls back to tracing so the
// entry is never silently lost.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tracing::error;

/// The entity a decision was made about.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Principal {
    pub id: String,
    pub role: String,
    /// "user" | "agent" | "system".
    #[serde(rename = "type")]
    pub kind: String,
}

/// One audit record per authorization decision.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
    pub principal: Principal,
    /// "chat" or the tool identifier.
    pub action: String,
    pub resource: String,
    /// Full signals snapshot at decision time.
    pub signals: Value,
    pub decision: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub policy_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub reason: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub obligations: Vec<String>,
    pub latency_ms: f64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub provider: String,
}

enum Sink {
    File(std::fs::File),
    Stdout,
}

pub struct AuditLogger {
    sink: Mutex<Sink>,
}

impl AuditLogger {
    /// Append to `path`, or to stdout when `None`.
    pub fn new(path: Option<&Path>) -> std::io::Result<Self> {
        let sink = match path {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)?;
                    }
                }
                Sink::File(
                    OpenOptions::new()
                        .append(true)
                        .create(true)
                        .open(path)?,
                )
            }
            None => Sink::Stdout,
        };
        Ok(Self {
            sink: Mutex::new(sink),
        })
    }

    pub fn log(&self, entry: &AuditEntry) {
        let line = match serde_json::to_string(entry) {
            Ok(line) => line,
            Err(e) => {
                error!(error = %e, request_id = %entry.request_id, "failed to serialize audit entry");
                return;
            }
        };

        let mut sink = self.sink.lock();
        let result = match &mut *sink {
            Sink::File(file) => writeln!(file, "{line}"),
            Sink::Stdout => writeln!(std::io::stdout(), "{line}"),
        };
        if let Err(e) = result {
            error!(error = %e, request_id = %entry.request_id, "failed to write audit entry");
        }
    }
}

/// Signals snapshot for the audit record.
pub fn signals_snapshot(ctx: &crate::domain::context::EvaluationContext) -> Value {
    serde_json::json!({
        "intent": ctx.intent,
        "user_intent": ctx.user_intent,
        "confidence": ctx.confidence,
        "risk_score": ctx.risk_score,
        "pii": ctx.signals.pii,
        "toxicity": ctx.signals.toxicity,
        "prompt_injection": ctx.signals.prompt_injection,
        "indirect_injection": ctx.signals.indirect_injection,
        "capabilities": ctx.signals.capabilities,
        "topic": ctx.signals.topic,
        "domain": ctx.domain,
        "action": ctx.action,
        "analyzer_failed": ctx.analyzer_failed,
    })
}
