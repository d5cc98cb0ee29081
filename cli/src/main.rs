// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # AEGIS Guardrail Gateway host
//!
//! Boots the policy-enforcing LLM proxy:
//!
//! 1. Load and compile `guardrail.yaml` (a failure here aborts the process
//!    with a non-zero exit code).
//! 2. Start the rule engine on the compiled document, with hot reload.
//! 3. Watch the authoring file and recompile on edits, which feeds the
//!    engine's own reload path. Reload failures never exit.
//! 4. Serve the HTTP surface.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use tracing::{info, warn};

use aegis_gateway::application::compiler::compile;
use aegis_gateway::application::{GuardrailService, ToolAuthorizer};
use aegis_gateway::domain::policy::GuardrailPolicy;
use aegis_gateway::infrastructure::audit::AuditLogger;
use aegis_gateway::infrastructure::config::GatewayConfig;
use aegis_gateway::infrastructure::detectors::CanaryService;
use aegis_gateway::infrastructure::engine::watcher::{watch_file, watch_policy};
use aegis_gateway::infrastructure::engine::PolicyEngine;
use aegis_gateway::infrastructure::intent_client::IntentClient;
use aegis_gateway::infrastructure::providers::{
    ChatProvider, CircuitBreaker, CircuitBreakerConfig, OllamaProvider, OpenAiProvider,
};
use aegis_gateway::presentation::{app, AppState};

/// AEGIS Guardrail Gateway - policy enforcement for LLM traffic
#[derive(Parser)]
#[command(name = "aegis-gateway")]
#[command(version, about, long_about = None)]
struct Cli {
    /// HTTP listen host
    #[arg(long, env = "SERVER_HOST", default_value = "0.0.0.0")]
    host: String,

    /// HTTP listen port
    #[arg(long, env = "SERVER_PORT", default_value = "8080")]
    port: u16,

    /// Path to the guardrail policy file
    #[arg(
        long,
        env = "GUARDRAIL_POLICY",
        default_value = "policies/guardrail.yaml",
        value_name = "FILE"
    )]
    policy: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "AEGIS_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    let mut config = GatewayConfig::from_env();
    config.host = cli.host;
    config.port = cli.port;
    config.policy_path = cli.policy;

    // Policy load and compile; abort on failure.
    let policy = GuardrailPolicy::load(&config.policy_path).with_context(|| {
        format!(
            "failed to load guardrail policy from {}",
            config.policy_path.display()
        )
    })?;
    let compiled_text = compile(&policy);
    let compiled_path = std::env::temp_dir().join(format!(
        "aegis-guardrail-compiled-{}.rules",
        uuid::Uuid::new_v4()
    ));
    std::fs::write(&compiled_path, &compiled_text).with_context(|| {
        format!(
            "failed to write compiled policy to {}",
            compiled_path.display()
        )
    })?;

    let engine = Arc::new(
        PolicyEngine::from_file(&compiled_path).context("failed to initialize rule engine")?,
    );
    info!(version = %engine.policy_version(), "policy compiled and loaded");

    // Hot reload: the engine watches the compiled file; a second watcher
    // recompiles the authoring YAML into it on edits.
    let _engine_watcher = watch_policy(engine.clone())?;
    let yaml_path = config.policy_path.clone();
    let recompile_target = compiled_path.clone();
    let _yaml_watcher = watch_file(&config.policy_path, move || {
        match GuardrailPolicy::load(&yaml_path) {
            Ok(policy) => {
                let text = compile(&policy);
                if let Err(e) = std::fs::write(&recompile_target, text) {
                    warn!(error = %e, "failed to write recompiled policy");
                }
            }
            Err(e) => warn!(error = %e, "policy recompile failed; keeping previous policy"),
        }
    })?;

    // Provider selection.
    let provider: Arc<dyn ChatProvider> = match config.provider_type.as_str() {
        "openai" => Arc::new(OpenAiProvider::new(
            config.provider_url.clone(),
            config.provider_key.clone(),
            config.provider_timeout,
        )),
        _ => Arc::new(OllamaProvider::new(
            config.provider_url.clone(),
            config.provider_timeout,
        )),
    };

    let intent_client = if config.intent_analyzer_url.is_empty() {
        warn!("INTENT_ANALYZER_URL not set; semantic classification disabled");
        None
    } else {
        info!(url = %config.intent_analyzer_url, "intent sidecar configured");
        Some(Arc::new(IntentClient::new(
            config.intent_analyzer_url.clone(),
            config.sidecar_timeout,
        )))
    };

    let audit = Arc::new(
        AuditLogger::new(config.audit_log_path.as_deref())
            .context("failed to open audit log")?,
    );
    let breaker = config
        .circuit_breaker_enabled
        .then(|| CircuitBreaker::new(CircuitBreakerConfig::default()));

    let state = Arc::new(AppState {
        guardrail: GuardrailService::new(policy, engine.clone(), intent_client),
        tool_authorizer: ToolAuthorizer::new(engine, audit.clone()),
        provider: provider.clone(),
        audit,
        canary: Arc::new(CanaryService::new()),
        breaker,
        config: config.clone(),
    });

    let addr = format!("{}:{}", config.host, config.port);
    println!("{}", "=================================".dimmed());
    println!("{}", "AEGIS Guardrail Gateway".bold());
    println!("{}", "=================================".dimmed());
    println!("Server:   http://{addr}");
    println!("Provider: {}", provider.name());
    println!("Policy:   {}", config.policy_path.display());
    println!("{}", "=================================".dimmed());

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app(state))
        .await
        .context("server failed")?;

    Ok(())
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    Ok(())
}
