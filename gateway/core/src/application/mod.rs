// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod aggregator;
pub mod compiler;
pub mod guardrail;
pub mod role_gate;
pub mod tool_pep;

pub use aggregator::SignalAggregator;
pub use guardrail::{GuardrailService, ScreenVerdict};
pub use tool_pep::{ToolAuthorizer, ToolRequest, ToolResponse};
