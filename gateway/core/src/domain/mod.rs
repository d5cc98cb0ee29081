// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod context;
pub mod decision;
pub mod intent;
pub mod message;
pub mod policy;
pub mod signals;

pub use context::{AgentState, EvaluationContext, IntentRole, RequestMeta, SourceData};
pub use decision::{Decision, EvaluationResult, GatewayError, Obligation};
pub use intent::IntentSignal;
pub use message::{ChatMessage, ChatRequest, ChatResponse, TokenUsage};
pub use signals::{Capability, PiiKind, Signals};
