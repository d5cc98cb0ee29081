// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Indirect prompt-injection detection
//!
//! Scans untrusted content (web pages, documents, tool outputs) for
//! instructions smuggled past the user: invisible characters, instruction
//! verbs hidden in comments, embedded chat delimiters, and exfiltration URLs.

use regex::Regex;

use crate::domain::signals::IndirectInjectionMatch;

// Content origins used in SourceData.
pub const ORIGIN_USER: &str = "user";
pub const ORIGIN_SYSTEM: &str = "system";
pub const ORIGIN_TOOL_OUTPUT: &str = "tool_output";
pub const ORIGIN_WEB_CONTENT: &str = "untrusted_web";
pub const ORIGIN_DOCUMENT: &str = "document";
pub const ORIGIN_EXTERNAL_API: &str = "external_api";

/// Whether content from `origin` should be trusted.
pub fn is_trusted_origin(origin: &str) -> bool {
    matches!(origin, ORIGIN_USER | ORIGIN_SYSTEM)
}

pub struct IndirectInjectionDetector {
    patterns: Vec<Regex>,
}

impl IndirectInjectionDetector {
    pub fn new() -> Self {
        let patterns = [
            // Hidden instructions in markdown/HTML comments
            r"(?i)<!--\s*(ignore|forget|disregard|override|new\s+instruction)",
            r"(?i)\[hidden\].*\[/hidden\]",
            // Zero-width characters (invisible instructions)
            r"\x{200B}|\x{200C}|\x{200D}|\x{FEFF}",
            // Embedded system prompt overrides
            r"(?i)\[system\]|\[/system\]|\[INST\]|\[/INST\]",
            r"(?i)<\|im_start\|>|<\|im_end\|>",
            r"(?i)<<SYS>>|<</SYS>>",
            // Instruction injection phrasing
            r"(?i)you\s+must\s+(now|always|immediately)\s+ignore",
            r"(?i)from\s+now\s+on\s*,?\s*(you|your|the)",
            r"(?i)previous\s+instructions?\s+(are|is|have\s+been)\s+(void|invalid|cancelled)",
            // Markdown image exfiltration
            r"(?i)!\[.*\]\(https?://[^)]*\?\w+=[^)]*\)",
            // Data smuggling in URLs
            r"(?i)https?://[^/\s]+/[^?\s]*\?.*data=",
            r"(?i)https?://[^/\s]+/[^?\s]*\?.*content=",
            r"(?i)https?://[^/\s]+/[^?\s]*\?.*message=",
        ];

        Self {
            patterns: patterns.iter().map(|p| Regex::new(p).unwrap()).collect(),
        }
    }

    /// Return a record per pattern hit, at most three per pattern.
    pub fn detect(&self, text: &str) -> Vec<IndirectInjectionMatch> {
        let mut matches = Vec::new();
        for pattern in &self.patterns {
            for m in pattern.find_iter(text).take(3) {
                matches.push(IndirectInjectionMatch {
                    pattern: truncate(pattern.as_str(), 40),
                    preview: truncate(m.as_str(), 50),
                    offset: m.start(),
                    confidence: 0.85,
                });
            }
        }
        matches
    }

    pub fn has_indirect_injection(&self, text: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(text))
    }
}

impl Default for IndirectInjectionDetector {
    fn default() -> Self {
        Self::new()
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}
