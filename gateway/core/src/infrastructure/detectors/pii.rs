// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// PII detection and redaction

use std::collections::BTreeSet;

use regex::Regex;

use crate::domain::signals::PiiKind;

/// Deterministic PII signal detection over raw text.
pub struct PiiDetector {
    email: Regex,
    phone: Regex,
    ssn: Regex,
    credit_card: Regex,
}

impl PiiDetector {
    pub fn new() -> Self {
        Self {
            email: Regex::new(r"(?i)[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap(),
            phone: Regex::new(r"(\+\d{1,2}\s?)?1?[-.]?\s?\(?\d{3}\)?[\s.-]?\d{3}[\s.-]?\d{4}")
                .unwrap(),
            ssn: Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").unwrap(),
            credit_card: Regex::new(r"\b(?:\d[ -]*?){13,16}\b").unwrap(),
        }
    }

    /// Scan text and return the set of detected kinds.
    pub fn detect(&self, text: &str) -> BTreeSet<PiiKind> {
        let mut detected = BTreeSet::new();
        if self.email.is_match(text) {
            detected.insert(PiiKind::Email);
        }
        if self.phone.is_match(text) {
            detected.insert(PiiKind::Phone);
        }
        if self.ssn.is_match(text) {
            detected.insert(PiiKind::Ssn);
        }
        if self.credit_card.is_match(text) {
            detected.insert(PiiKind::CreditCard);
        }
        detected
    }

    /// Replace every match of the given kinds with its placeholder literal.
    pub fn redact(&self, text: &str, kinds: &[PiiKind]) -> String {
        let mut out = text.to_string();
        for kind in kinds {
            let re = match kind {
                PiiKind::Email => &self.email,
                PiiKind::Phone => &self.phone,
                PiiKind::Ssn => &self.ssn,
                PiiKind::CreditCard => &self.credit_card,
            };
            out = re.replace_all(&out, kind.placeholder()).into_owned();
        }
        out
    }
}

impl Default for PiiDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_email_and_phone() {
        let d = PiiDetector::new();
        let found = d.detect("ping me at alice@acme.com or 415-555-0100");
        assert!(found.contains(&PiiKind::Email));
        assert!(found.contains(&PiiKind::Phone));
        assert!(!found.contains(&PiiKind::Ssn));
    }

    #[test]
    fn test_detects_ssn_with_word_boundaries() {
        let d = PiiDetector::new();
        assert!(d.detect("my ssn is 123-45-6789").contains(&PiiKind::Ssn));
        assert!(!d.detect("version 1123-45-67891 build").contains(&PiiKind::Ssn));
    }

    #[test]
    fn test_detects_credit_card_with_separators() {
        let d = PiiDetector::new();
        assert!(d
            .detect("card 4111 1111 1111 1111 thanks")
            .contains(&PiiKind::CreditCard));
        assert!(d
            .detect("card 4111-1111-1111-1111")
            .contains(&PiiKind::CreditCard));
    }

    #[test]
    fn test_clean_text_yields_empty_set() {
        let d = PiiDetector::new();
        assert!(d.detect("tell me about rust lifetimes").is_empty());
    }

    #[test]
    fn test_redaction_is_complete() {
        let d = PiiDetector::new();
        let out = d.redact(
            "ping me at alice@acme.com or 415-555-0100",
            &[PiiKind::Email, PiiKind::Phone],
        );
        assert!(out.contains("[EMAIL]"));
        assert!(out.contains("[PHONE]"));
        assert!(!out.contains("alice@acme.com"));
        assert!(!out.contains("415-555-0100"));
        // No residual matches of the redacted kinds remain.
        let residual = d.detect(&out);
        assert!(!residual.contains(&PiiKind::Email));
        assert!(!residual.contains(&PiiKind::Phone));
    }

    #[test]
    fn test_redaction_only_touches_selected_kinds() {
        let d = PiiDetector::new();
        let out = d.redact("alice@acme.com and 123-45-6789", &[PiiKind::Email]);
        assert!(out.contains("[EMAIL]"));
        assert!(out.contains("123-45-6789"));
    }
}
