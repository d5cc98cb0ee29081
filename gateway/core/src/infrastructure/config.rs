// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Environment-driven gateway configuration

use std::path::PathBuf;
use std::time::Duration;

/// All runtime configuration, read from environment variables with sensible
/// defaults. CLI flags may override individual fields after loading.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,

    /// "openai" | "ollama".
    pub provider_type: String,
    pub provider_url: String,
    pub provider_key: String,

    /// Base URL of the intent sidecar; empty disables semantic
    /// classification.
    pub intent_analyzer_url: String,

    /// Path to the authoring policy (guardrail.yaml).
    pub policy_path: PathBuf,

    /// Audit log file; None logs to stdout.
    pub audit_log_path: Option<PathBuf>,

    pub sidecar_timeout: Duration,
    pub provider_timeout: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,

    pub canary_enabled: bool,
    pub circuit_breaker_enabled: bool,
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        Self {
            host: env_or("SERVER_HOST", "0.0.0.0"),
            port: env_parse("SERVER_PORT", 8080),
            provider_type: env_or("PROVIDER_TYPE", "ollama"),
            provider_url: env_or("PROVIDER_URL", ""),
            provider_key: env_or("PROVIDER_KEY", ""),
            intent_analyzer_url: env_or("INTENT_ANALYZER_URL", ""),
            policy_path: PathBuf::from(env_or("GUARDRAIL_POLICY", "guardrail.yaml")),
            audit_log_path: {
                let path = env_or("AUDIT_LOG_PATH", "");
                if path.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(path))
                }
            },
            sidecar_timeout: Duration::from_secs(env_parse("SIDECAR_TIMEOUT_SEC", 10)),
            provider_timeout: Duration::from_secs(env_parse("PROVIDER_TIMEOUT_SEC", 60)),
            read_timeout: Duration::from_secs(env_parse("SERVER_READ_TIMEOUT_SEC", 30)),
            write_timeout: Duration::from_secs(env_parse("SERVER_WRITE_TIMEOUT_SEC", 60)),
            canary_enabled: env_parse("CANARY_ENABLED", false),
            circuit_breaker_enabled: env_parse("CIRCUIT_BREAKER_ENABLED", false),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            provider_type: "ollama".to_string(),
            provider_url: String::new(),
            provider_key: String::new(),
            intent_analyzer_url: String::new(),
            policy_path: PathBuf::from("guardrail.yaml"),
            audit_log_path: None,
            sidecar_timeout: Duration::from_secs(10),
            provider_timeout: Duration::from_secs(60),
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(60),
            canary_enabled: false,
            circuit_breaker_enabled: false,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).ok().filter(|v| !v.is_empty()).unwrap_or_else(|| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_contract_timeouts() {
        let config = GatewayConfig::default();
        assert_eq!(config.sidecar_timeout, Duration::from_secs(10));
        assert_eq!(config.provider_timeout, Duration::from_secs(60));
        assert_eq!(config.read_timeout, Duration::from_secs(30));
        assert_eq!(config.write_timeout, Duration::from_secs(60));
        assert!(!config.canary_enabled);
    }

    #[test]
    fn test_env_parse_falls_back_on_garbage() {
        std::env::set_var("TEST_GW_PORT", "not-a-number");
        assert_eq!(env_parse("TEST_GW_PORT", 8080u16), 8080);
        std::env::remove_var("TEST_GW_PORT");
    }
}
