use std::sync::Arc;
use std::time::Duration;

use gobuddy_agent::{AgentError, AgentRuntime, KnowledgeBase, OpenAiAgentClient};
use gobuddy_core::config::{AppConfig, ConfigError, LoadOptions, RateLimitConfig};
use gobuddy_core::{RateLimitPolicy, RateLimiter};
use thiserror::Error;
use tracing::{info, warn};

use crate::identity::{DevIdentityProvider, HttpIdentityProvider, IdentityError, IdentityProvider};

/// Shared per-process state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub runtime: AgentRuntime,
    pub identity: Arc<dyn IdentityProvider>,
    /// Strict tier for endpoints that call an agent.
    pub ai_limiter: RateLimiter,
    /// Lenient tier for read-only endpoints.
    pub general_limiter: RateLimiter,
}

impl AppState {
    pub fn new(
        runtime: AgentRuntime,
        identity: Arc<dyn IdentityProvider>,
        limits: &RateLimitConfig,
    ) -> Self {
        Self::with_limiters(
            runtime,
            identity,
            RateLimiter::with_system_clock(RateLimitPolicy::ai(limits)),
            RateLimiter::with_system_clock(RateLimitPolicy::general(limits)),
        )
    }

    pub fn with_limiters(
        runtime: AgentRuntime,
        identity: Arc<dyn IdentityProvider>,
        ai_limiter: RateLimiter,
        general_limiter: RateLimiter,
    ) -> Self {
        Self { runtime, identity, ai_limiter, general_limiter }
    }
}

pub struct Application {
    pub config: AppConfig,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("agent client setup failed: {0}")]
    Agent(#[source] AgentError),
    #[error("identity provider setup failed: {0}")]
    Identity(#[source] IdentityError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        environment = ?config.server.environment,
        "starting application bootstrap"
    );

    let identity: Arc<dyn IdentityProvider> = if config.auth.provider_configured() {
        Arc::new(HttpIdentityProvider::from_config(&config.auth).map_err(BootstrapError::Identity)?)
    } else {
        warn!(
            event_name = "system.bootstrap.dev_identity",
            correlation_id = "bootstrap",
            "no identity provider configured; every bearer token resolves to the development user"
        );
        Arc::new(DevIdentityProvider)
    };

    let client = OpenAiAgentClient::from_config(&config.llm).map_err(BootstrapError::Agent)?;
    let knowledge = KnowledgeBase::load(&config.knowledge.directory);
    if knowledge.is_empty() {
        warn!(
            event_name = "system.bootstrap.knowledge_empty",
            correlation_id = "bootstrap",
            directory = %config.knowledge.directory.display(),
            "support knowledge base is empty"
        );
    }

    let runtime = AgentRuntime::new(Arc::new(client), knowledge);
    let state = AppState::new(runtime, identity, &config.rate_limit);

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        llm_provider = ?config.llm.provider,
        model = %config.llm.model,
        "application bootstrap complete"
    );
    Ok(Application { config, state })
}

/// Periodically drops limiter keys whose windows have fully drained.
pub fn spawn_limiter_eviction(
    limiters: Vec<RateLimiter>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            for limiter in &limiters {
                limiter.evict_idle();
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use gobuddy_core::config::{ConfigOverrides, Environment, LlmProvider, LoadOptions};

    use crate::bootstrap::{bootstrap, BootstrapError};

    #[tokio::test]
    async fn production_without_identity_provider_fails_fast() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                environment: Some(Environment::Production),
                llm_provider: Some(LlmProvider::Ollama),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        let error = result.err().expect("production needs an identity provider");
        assert!(matches!(error, BootstrapError::Config(_)));
        assert!(error.to_string().contains("auth"));
    }

    #[tokio::test]
    async fn identity_url_without_key_does_not_fall_back_to_dev_identity() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                environment: Some(Environment::Development),
                llm_provider: Some(LlmProvider::Ollama),
                identity_url: Some("https://project.supabase.co".to_owned()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        let error = result.err().expect("a lone identity url must be rejected");
        assert!(matches!(error, BootstrapError::Config(_)));
        assert!(error.to_string().contains("set together"));
    }

    #[tokio::test]
    async fn development_bootstrap_uses_local_fallbacks() {
        let knowledge = missing_knowledge_directory();
        let app = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                environment: Some(Environment::Development),
                llm_provider: Some(LlmProvider::Ollama),
                knowledge_directory: Some(knowledge),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await
        .expect("development bootstrap should succeed");

        assert!(app.state.runtime.knowledge().is_empty());
        assert_eq!(app.state.ai_limiter.policy().per_minute, 5);
        assert_eq!(app.state.general_limiter.policy().per_minute, 30);
    }

    fn missing_knowledge_directory() -> std::path::PathBuf {
        std::env::temp_dir().join(format!("gobuddy-knowledge-missing-{}", std::process::id()))
    }
}
