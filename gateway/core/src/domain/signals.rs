// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Deterministic signal types
//
// Pure outputs of the detector layer. The aggregator produces one `Signals`
// record per request; the context builder merges records under the rules in
// `EvaluationContext::attach_signals`.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A category of personally identifiable information the PII detector can
/// recognize and redact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PiiKind {
    Email,
    Phone,
    Ssn,
    CreditCard,
}

impl PiiKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Ssn => "ssn",
            Self::CreditCard => "credit_card",
        }
    }

    /// The literal substituted for each match when redacting.
    pub fn placeholder(&self) -> &'static str {
        match self {
            Self::Email => "[EMAIL]",
            Self::Phone => "[PHONE]",
            Self::Ssn => "[SSN]",
            Self::CreditCard => "[CREDIT_CARD]",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "email" => Some(Self::Email),
            "phone" => Some(Self::Phone),
            "ssn" => Some(Self::Ssn),
            "credit_card" => Some(Self::CreditCard),
            _ => None,
        }
    }

    /// Kinds whose presence in a provider response blocks egress outright.
    pub fn is_high_severity(&self) -> bool {
        matches!(self, Self::Ssn | Self::CreditCard)
    }
}

impl fmt::Display for PiiKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dangerous lexical capability detected in request text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    FileDelete,
    PrivilegedRead,
    ProcessControl,
    PrivilegeEscalation,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FileDelete => "file_delete",
            Self::PrivilegedRead => "privileged_read",
            Self::ProcessControl => "process_control",
            Self::PrivilegeEscalation => "privilege_escalation",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregated deterministic signals for one request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Signals {
    pub pii: BTreeSet<PiiKind>,
    /// Weighted toxicity score in [0, 1].
    pub toxicity: f64,
    pub prompt_injection: bool,
    pub capabilities: BTreeSet<Capability>,
    /// First non-empty topic assigned wins; empty when no taxonomy entry matched.
    pub topic: String,
    pub indirect_injection: bool,
    #[serde(skip)]
    pub user_text: String,
    #[serde(skip)]
    pub system_text: String,
    #[serde(skip)]
    pub full_text: String,
}

/// One indirect-injection pattern hit in untrusted content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndirectInjectionMatch {
    pub pattern: String,
    /// Matched text, truncated to 50 characters.
    pub preview: String,
    pub offset: usize,
    pub confidence: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pii_kind_round_trip() {
        for kind in [
            PiiKind::Email,
            PiiKind::Phone,
            PiiKind::Ssn,
            PiiKind::CreditCard,
        ] {
            assert_eq!(PiiKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(PiiKind::parse("passport"), None);
    }

    #[test]
    fn test_high_severity_kinds() {
        assert!(PiiKind::Ssn.is_high_severity());
        assert!(PiiKind::CreditCard.is_high_severity());
        assert!(!PiiKind::Email.is_high_severity());
        assert!(!PiiKind::Phone.is_high_severity());
    }

    #[test]
    fn test_serde_snake_case_names() {
        let json = serde_json::to_string(&Capability::PrivilegeEscalation).unwrap();
        assert_eq!(json, "\"privilege_escalation\"");
        let json = serde_json::to_string(&PiiKind::CreditCard).unwrap();
        assert_eq!(json, "\"credit_card\"");
    }
}
