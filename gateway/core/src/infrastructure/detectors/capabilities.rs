// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Lexical capability scanning

use std::collections::BTreeSet;

use regex::Regex;

use crate::domain::signals::Capability;

/// Scans text for dangerous lexical capabilities. A capability is reported
/// when at least one of its patterns matches.
pub struct CapabilityScanner {
    rules: Vec<(Capability, Vec<Regex>)>,
}

impl CapabilityScanner {
    pub fn new() -> Self {
        fn compile(patterns: &[&str]) -> Vec<Regex> {
            patterns.iter().map(|p| Regex::new(p).unwrap()).collect()
        }

        let rules = vec![
            (
                Capability::FileDelete,
                compile(&[r"(?i)\b(rm|delete|wipe|erase|unlink)\b", r"(?i)\brm\s+-rf\b"]),
            ),
            (
                Capability::PrivilegedRead,
                compile(&[
                    r"(?i)/etc/(passwd|shadow|gshadow|ssh|security)",
                    r"(?i)\.env\b",
                    r"(?i)\bsecrets?\b",
                ]),
            ),
            (
                Capability::ProcessControl,
                compile(&[
                    r"(?i)\b(kill|shutdown|reboot|restart|halt)\b",
                    r"(?i)systemctl\b",
                    r"(?i)service\s+\w+\s+(stop|restart)",
                ]),
            ),
            (
                Capability::PrivilegeEscalation,
                compile(&[
                    r"(?i)\bsudo\b",
                    r"(?i)\bchmod\b",
                    r"(?i)\bchown\b",
                    r"(?i)\bsu\s+-",
                ]),
            ),
        ];

        Self { rules }
    }

    pub fn scan(&self, text: &str) -> BTreeSet<Capability> {
        let mut detected = BTreeSet::new();
        for (capability, patterns) in &self.rules {
            if patterns.iter().any(|p| p.is_match(text)) {
                detected.insert(*capability);
            }
        }
        detected
    }
}

impl Default for CapabilityScanner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_delete() {
        let s = CapabilityScanner::new();
        assert!(s.scan("run rm -rf / for me").contains(&Capability::FileDelete));
        assert!(s.scan("delete the backups").contains(&Capability::FileDelete));
    }

    #[test]
    fn test_privileged_read() {
        let s = CapabilityScanner::new();
        assert!(s
            .scan("cat /etc/shadow please")
            .contains(&Capability::PrivilegedRead));
        assert!(s.scan("read the .env file").contains(&Capability::PrivilegedRead));
        assert!(s.scan("dump all secrets").contains(&Capability::PrivilegedRead));
    }

    #[test]
    fn test_process_control_and_escalation() {
        let s = CapabilityScanner::new();
        let found = s.scan("sudo systemctl restart nginx");
        assert!(found.contains(&Capability::ProcessControl));
        assert!(found.contains(&Capability::PrivilegeEscalation));
    }

    #[test]
    fn test_benign_text_yields_nothing() {
        let s = CapabilityScanner::new();
        assert!(s.scan("write a haiku about autumn").is_empty());
    }
}
