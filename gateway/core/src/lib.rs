// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # AEGIS Guardrail Gateway
//!
//! Policy-enforcing proxy that sits between client applications and upstream
//! LLM providers. Every request is screened before a single upstream byte is
//! relayed: deterministic detectors and semantic classifiers produce signals,
//! a compiled declarative policy turns those signals into a decision, and the
//! enforcement pipeline applies the decision (deny, redact, require approval)
//! plus an egress scan on the provider response.
//!
//! # Architecture
//!
//! - **domain** — messages, signals, evaluation context, policy documents,
//!   decisions. Pure types with their merge invariants.
//! - **application** — services composing the domain: signal aggregation,
//!   policy compilation, role pre-gate, the guardrail pipeline, tool
//!   authorization.
//! - **infrastructure** — detectors, the heuristic classifier, the intent
//!   sidecar client, the rule engine with hot reload, provider adapters,
//!   audit sink, metrics, configuration.
//! - **presentation** — the axum HTTP surface.

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
