//! Bearer token verification against the identity provider's user-lookup endpoint.

use std::time::Duration;

use async_trait::async_trait;
use gobuddy_core::config::AuthConfig;
use gobuddy_core::ApiError;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

pub const DEV_USER_ID: &str = "dev-user";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("identity provider unreachable: {0}")]
    Unavailable(String),
    #[error("identity provider misconfigured: {0}")]
    Misconfigured(String),
}

impl From<IdentityError> for ApiError {
    fn from(error: IdentityError) -> Self {
        match error {
            IdentityError::InvalidToken => Self::Authentication("Invalid or expired token".to_owned()),
            IdentityError::Unavailable(detail) => Self::UpstreamUnavailable(detail),
            IdentityError::Misconfigured(detail) => Self::Internal(detail),
        }
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Identity, IdentityError>;
}

#[derive(Deserialize)]
struct UserRecord {
    id: String,
}

pub struct HttpIdentityProvider {
    http: reqwest::Client,
    user_url: String,
    api_key: SecretString,
}

impl HttpIdentityProvider {
    pub fn from_config(config: &AuthConfig) -> Result<Self, IdentityError> {
        let (Some(identity_url), Some(api_key)) = (&config.identity_url, &config.api_key) else {
            return Err(IdentityError::Misconfigured(
                "auth.identity_url and auth.api_key are both required".to_owned(),
            ));
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| IdentityError::Misconfigured(error.to_string()))?;

        Ok(Self {
            http,
            user_url: format!("{}/auth/v1/user", identity_url.trim_end_matches('/')),
            api_key: api_key.clone(),
        })
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn verify(&self, token: &str) -> Result<Identity, IdentityError> {
        let response = self
            .http
            .get(&self.user_url)
            .bearer_auth(token)
            .header("apikey", self.api_key.expose_secret())
            .send()
            .await
            .map_err(|error| IdentityError::Unavailable(error.to_string()))?;

        if !response.status().is_success() {
            warn!(
                event_name = "auth.token_rejected",
                status = %response.status(),
                "identity provider rejected bearer token"
            );
            return Err(IdentityError::InvalidToken);
        }

        let user: UserRecord = response.json().await.map_err(|_| IdentityError::InvalidToken)?;
        Ok(Identity { user_id: user.id })
    }
}

/// Accepts any token as the development user. Refused in production by config validation.
#[derive(Clone, Copy, Debug, Default)]
pub struct DevIdentityProvider;

#[async_trait]
impl IdentityProvider for DevIdentityProvider {
    async fn verify(&self, _token: &str) -> Result<Identity, IdentityError> {
        Ok(Identity { user_id: DEV_USER_ID.to_owned() })
    }
}

/// Splits `Authorization: Bearer <token>`; any other shape is rejected.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
