// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Deterministic detectors
//!
//! Each detector compiles its pattern table once in the constructor and
//! exposes pure `&self` scan methods. No I/O, no shared mutable state; all
//! detectors are re-entrant.

pub mod canary;
pub mod capabilities;
pub mod indirect;
pub mod injection;
pub mod pii;
pub mod toxicity;

pub use canary::CanaryService;
pub use capabilities::CapabilityScanner;
pub use indirect::IndirectInjectionDetector;
pub use injection::InjectionDetector;
pub use pii::PiiDetector;
pub use toxicity::ToxicityDetector;
