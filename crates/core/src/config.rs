use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEV_ORIGINS: [&str; 2] = ["http://localhost:3000", "http://localhost:8081"];

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub llm: LlmConfig,
    pub rate_limit: RateLimitConfig,
    pub knowledge: KnowledgeConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub environment: Environment,
    pub graceful_shutdown_secs: u64,
    pub allowed_origins: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub identity_url: Option<String>,
    pub api_key: Option<SecretString>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub fast_model: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub ai_per_minute: u32,
    pub ai_per_hour: u32,
    pub general_per_minute: u32,
    pub general_per_hour: u32,
    pub eviction_interval_secs: u64,
}

#[derive(Clone, Debug)]
pub struct KnowledgeConfig {
    pub directory: PathBuf,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Production,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    OpenAi,
    Ollama,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub environment: Option<Environment>,
    pub log_level: Option<String>,
    pub identity_url: Option<String>,
    pub identity_api_key: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_api_key: Option<String>,
    pub llm_model: Option<String>,
    pub knowledge_directory: Option<PathBuf>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind_address: "0.0.0.0".to_string(),
                port: 8001,
                environment: Environment::Development,
                graceful_shutdown_secs: 15,
                allowed_origins: Vec::new(),
            },
            auth: AuthConfig { identity_url: None, api_key: None, timeout_secs: 10 },
            llm: LlmConfig {
                provider: LlmProvider::OpenAi,
                api_key: None,
                base_url: None,
                model: "gpt-4o".to_string(),
                fast_model: "gpt-4o-mini".to_string(),
                timeout_secs: 120,
            },
            rate_limit: RateLimitConfig::default(),
            knowledge: KnowledgeConfig { directory: PathBuf::from("knowledge") },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            ai_per_minute: 5,
            ai_per_hour: 60,
            general_per_minute: 30,
            general_per_hour: 500,
            eviction_interval_secs: 300,
        }
    }
}

impl ServerConfig {
    /// Origins accepted by CORS, including the local dev frontends outside production.
    pub fn cors_origins(&self) -> Vec<String> {
        let mut origins = self.allowed_origins.clone();
        if self.environment == Environment::Development {
            for origin in DEV_ORIGINS {
                if !origins.iter().any(|existing| existing == origin) {
                    origins.push(origin.to_string());
                }
            }
        }
        origins
    }
}

impl AuthConfig {
    /// True when bearer tokens are checked against a real identity provider.
    pub fn provider_configured(&self) -> bool {
        self.has_identity_url() && self.has_api_key()
    }

    fn has_identity_url(&self) -> bool {
        self.identity_url.as_ref().is_some_and(|url| !url.trim().is_empty())
    }

    fn has_api_key(&self) -> bool {
        self.api_key.as_ref().is_some_and(|key| !key.expose_secret().trim().is_empty())
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for Environment {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(ConfigError::Validation(format!(
                "unsupported environment `{other}` (expected development|production)"
            ))),
        }
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("gobuddy.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(environment) = server.environment {
                self.server.environment = environment;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
            if let Some(allowed_origins) = server.allowed_origins {
                self.server.allowed_origins = allowed_origins;
            }
        }

        if let Some(auth) = patch.auth {
            if let Some(identity_url) = auth.identity_url {
                self.auth.identity_url = Some(identity_url);
            }
            if let Some(auth_api_key_value) = auth.api_key {
                self.auth.api_key = Some(secret_value(auth_api_key_value));
            }
            if let Some(timeout_secs) = auth.timeout_secs {
                self.auth.timeout_secs = timeout_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(fast_model) = llm.fast_model {
                self.llm.fast_model = fast_model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(rate_limit) = patch.rate_limit {
            if let Some(value) = rate_limit.ai_per_minute {
                self.rate_limit.ai_per_minute = value;
            }
            if let Some(value) = rate_limit.ai_per_hour {
                self.rate_limit.ai_per_hour = value;
            }
            if let Some(value) = rate_limit.general_per_minute {
                self.rate_limit.general_per_minute = value;
            }
            if let Some(value) = rate_limit.general_per_hour {
                self.rate_limit.general_per_hour = value;
            }
            if let Some(value) = rate_limit.eviction_interval_secs {
                self.rate_limit.eviction_interval_secs = value;
            }
        }

        if let Some(knowledge) = patch.knowledge {
            if let Some(directory) = knowledge.directory {
                self.knowledge.directory = directory;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("GOBUDDY_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        let port = read_env("GOBUDDY_SERVER_PORT").or_else(|| read_env("PORT"));
        if let Some(value) = port {
            self.server.port = parse_u16("GOBUDDY_SERVER_PORT", &value)?;
        }
        let environment = read_env("GOBUDDY_ENV").or_else(|| read_env("ENV"));
        if let Some(value) = environment {
            self.server.environment = value.parse()?;
        }
        if let Some(value) = read_env("GOBUDDY_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("GOBUDDY_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }
        if let Some(value) = read_env("GOBUDDY_SERVER_ALLOWED_ORIGINS") {
            self.server.allowed_origins = split_list(&value);
        }
        for key in ["WEB_APP_URL", "MOBILE_APP_URL"] {
            if let Some(origin) = read_env(key) {
                if !self.server.allowed_origins.contains(&origin) {
                    self.server.allowed_origins.push(origin);
                }
            }
        }

        let identity_url =
            read_env("GOBUDDY_AUTH_IDENTITY_URL").or_else(|| read_env("SUPABASE_URL"));
        if let Some(value) = identity_url {
            self.auth.identity_url = Some(value);
        }
        let identity_key =
            read_env("GOBUDDY_AUTH_API_KEY").or_else(|| read_env("SUPABASE_ANON_KEY"));
        if let Some(value) = identity_key {
            self.auth.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("GOBUDDY_AUTH_TIMEOUT_SECS") {
            self.auth.timeout_secs = parse_u64("GOBUDDY_AUTH_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("GOBUDDY_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        let llm_api_key = read_env("GOBUDDY_LLM_API_KEY").or_else(|| read_env("OPENAI_API_KEY"));
        if let Some(value) = llm_api_key {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("GOBUDDY_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("GOBUDDY_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("GOBUDDY_LLM_FAST_MODEL") {
            self.llm.fast_model = value;
        }
        if let Some(value) = read_env("GOBUDDY_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("GOBUDDY_LLM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("GOBUDDY_RATE_LIMIT_AI_PER_MINUTE") {
            self.rate_limit.ai_per_minute = parse_u32("GOBUDDY_RATE_LIMIT_AI_PER_MINUTE", &value)?;
        }
        if let Some(value) = read_env("GOBUDDY_RATE_LIMIT_AI_PER_HOUR") {
            self.rate_limit.ai_per_hour = parse_u32("GOBUDDY_RATE_LIMIT_AI_PER_HOUR", &value)?;
        }
        if let Some(value) = read_env("GOBUDDY_RATE_LIMIT_GENERAL_PER_MINUTE") {
            self.rate_limit.general_per_minute =
                parse_u32("GOBUDDY_RATE_LIMIT_GENERAL_PER_MINUTE", &value)?;
        }
        if let Some(value) = read_env("GOBUDDY_RATE_LIMIT_GENERAL_PER_HOUR") {
            self.rate_limit.general_per_hour =
                parse_u32("GOBUDDY_RATE_LIMIT_GENERAL_PER_HOUR", &value)?;
        }
        if let Some(value) = read_env("GOBUDDY_RATE_LIMIT_EVICTION_INTERVAL_SECS") {
            self.rate_limit.eviction_interval_secs =
                parse_u64("GOBUDDY_RATE_LIMIT_EVICTION_INTERVAL_SECS", &value)?;
        }

        if let Some(value) = read_env("GOBUDDY_KNOWLEDGE_DIRECTORY") {
            self.knowledge.directory = PathBuf::from(value);
        }

        let log_level = read_env("GOBUDDY_LOGGING_LEVEL").or_else(|| read_env("GOBUDDY_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("GOBUDDY_LOGGING_FORMAT").or_else(|| read_env("GOBUDDY_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(bind_address) = overrides.bind_address {
            self.server.bind_address = bind_address;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(environment) = overrides.environment {
            self.server.environment = environment;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(identity_url) = overrides.identity_url {
            self.auth.identity_url = Some(identity_url);
        }
        if let Some(identity_api_key) = overrides.identity_api_key {
            self.auth.api_key = Some(secret_value(identity_api_key));
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(knowledge_directory) = overrides.knowledge_directory {
            self.knowledge.directory = knowledge_directory;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_server(&self.server)?;
        validate_auth(&self.auth, self.server.environment)?;
        validate_llm(&self.llm)?;
        validate_rate_limit(&self.rate_limit)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("gobuddy.toml"), PathBuf::from("config/gobuddy.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    for origin in &server.allowed_origins {
        if !origin.starts_with("http://") && !origin.starts_with("https://") {
            return Err(ConfigError::Validation(format!(
                "server.allowed_origins entry `{origin}` must start with http:// or https://"
            )));
        }
    }

    Ok(())
}

fn validate_auth(auth: &AuthConfig, environment: Environment) -> Result<(), ConfigError> {
    if auth.timeout_secs == 0 || auth.timeout_secs > 60 {
        return Err(ConfigError::Validation(
            "auth.timeout_secs must be in range 1..=60".to_string(),
        ));
    }

    if let Some(url) = &auth.identity_url {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "auth.identity_url must start with http:// or https://".to_string(),
            ));
        }
    }

    if auth.has_identity_url() != auth.has_api_key() {
        return Err(ConfigError::Validation(
            "auth.identity_url and auth.api_key must be set together".to_string(),
        ));
    }

    if environment == Environment::Production && !auth.provider_configured() {
        return Err(ConfigError::Validation(
            "auth.identity_url and auth.api_key are required in production; the development identity fallback is disabled there"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 600 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=600".to_string(),
        ));
    }

    if llm.model.trim().is_empty() || llm.fast_model.trim().is_empty() {
        return Err(ConfigError::Validation(
            "llm.model and llm.fast_model must not be empty".to_string(),
        ));
    }

    if let Some(base_url) = &llm.base_url {
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "llm.base_url must start with http:// or https://".to_string(),
            ));
        }
    }

    match llm.provider {
        LlmProvider::OpenAi => {
            let missing = llm
                .api_key
                .as_ref()
                .map(|value| value.expose_secret().trim().is_empty())
                .unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.api_key is required for the openai provider".to_string(),
                ));
            }
        }
        LlmProvider::Ollama => {}
    }

    Ok(())
}

fn validate_rate_limit(rate_limit: &RateLimitConfig) -> Result<(), ConfigError> {
    let limits = [
        ("rate_limit.ai_per_minute", rate_limit.ai_per_minute),
        ("rate_limit.ai_per_hour", rate_limit.ai_per_hour),
        ("rate_limit.general_per_minute", rate_limit.general_per_minute),
        ("rate_limit.general_per_hour", rate_limit.general_per_hour),
    ];
    if let Some((name, _)) = limits.iter().find(|(_, value)| *value == 0) {
        return Err(ConfigError::Validation(format!("{name} must be greater than zero")));
    }

    if rate_limit.eviction_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "rate_limit.eviction_interval_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn split_list(value: &str) -> Vec<String> {
    value.split(',').map(str::trim).filter(|item| !item.is_empty()).map(str::to_string).collect()
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    server: Option<ServerPatch>,
    auth: Option<AuthPatch>,
    llm: Option<LlmPatch>,
    rate_limit: Option<RateLimitPatch>,
    knowledge: Option<KnowledgePatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    environment: Option<Environment>,
    graceful_shutdown_secs: Option<u64>,
    allowed_origins: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct AuthPatch {
    identity_url: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    fast_model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RateLimitPatch {
    ai_per_minute: Option<u32>,
    ai_per_hour: Option<u32>,
    general_per_minute: Option<u32>,
    general_per_hour: Option<u32>,
    eviction_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct KnowledgePatch {
    directory: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
