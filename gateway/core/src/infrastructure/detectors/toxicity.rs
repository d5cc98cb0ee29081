// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Toxicity scoring via weighted keyword matching

use regex::Regex;

/// A toxic pattern and its score contribution. Weights are data, not code.
struct WeightedPattern {
    pattern: Regex,
    weight: f64,
}

/// Keyword-based toxicity scorer. Each pattern contributes
/// `weight * min(hits, 3) / 3`; the total is clamped to [0, 1].
pub struct ToxicityDetector {
    patterns: Vec<WeightedPattern>,
}

impl ToxicityDetector {
    pub fn new() -> Self {
        let table: &[(&str, f64)] = &[
            (r"(?i)\b(kill|murder|attack|destroy|harm)\b", 0.3),
            (r"(?i)\b(hate|racist|sexist|bigot)\b", 0.35),
            (r"(?i)\b(suicide|self-harm|cut myself)\b", 0.4),
            (r"(?i)\b(fuck|shit|damn|ass|bitch)\b", 0.15),
            (r"(?i)\b(threat|threaten|bomb|terror)\b", 0.4),
            // Weapons and violence
            (r"(?i)\b(weapon|explosive|poison|gun|knife)\b", 0.5),
            (r"(?i)\bmake\s+a\s+(bomb|weapon|explosive)\b", 0.5),
            // Hacking and malware
            (r"(?i)\b(malware|virus|trojan|ransomware|keylogger)\b", 0.5),
            (
                r"(?i)\b(hack|exploit|breach|crack)\s+(into|password|account|system)\b",
                0.5,
            ),
            (r"(?i)bypass\s+(security|authentication|firewall|protection)\b", 0.5),
            // Illegal activities
            (r"(?i)\b(steal|fraud|scam|phishing)\b", 0.4),
        ];

        let patterns = table
            .iter()
            .map(|(p, w)| WeightedPattern {
                pattern: Regex::new(p).unwrap(),
                weight: *w,
            })
            .collect();

        Self { patterns }
    }

    /// Score text between 0.0 and 1.0.
    pub fn score(&self, text: &str) -> f64 {
        let mut total = 0.0;
        for wp in &self.patterns {
            let hits = wp.pattern.find_iter(text).count();
            if hits > 0 {
                total += wp.weight * (hits.min(3) as f64) / 3.0;
            }
        }
        total.min(1.0)
    }
}

impl Default for ToxicityDetector {
    fn default() -> Self {
        Self::new()
    }
}
