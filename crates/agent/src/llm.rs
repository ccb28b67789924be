use std::sync::Arc;

use async_trait::async_trait;
use gobuddy_core::ApiError;
use serde_json::Value;
use thiserror::Error;

use crate::roles::AgentRole;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseFormat {
    Text,
    /// Ask the backend for a single JSON object.
    Json,
}

/// One call to the external agent runtime.
#[derive(Clone, Debug)]
pub struct AgentRequest {
    pub role: AgentRole,
    pub prompt: String,
    /// Scopes backend-side memory; `None` for anonymous calls.
    pub user_id: Option<String>,
    pub format: ResponseFormat,
    /// Reference material appended to the role instructions.
    pub reference: Option<Arc<str>>,
}

impl AgentRequest {
    pub fn text(role: AgentRole, prompt: impl Into<String>, user_id: Option<&str>) -> Self {
        Self {
            role,
            prompt: prompt.into(),
            user_id: user_id.map(str::to_owned),
            format: ResponseFormat::Text,
            reference: None,
        }
    }

    pub fn json(role: AgentRole, prompt: impl Into<String>, user_id: Option<&str>) -> Self {
        Self { format: ResponseFormat::Json, ..Self::text(role, prompt, user_id) }
    }

    pub fn with_reference(mut self, reference: Option<Arc<str>>) -> Self {
        self.reference = reference;
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum AgentOutput {
    Text(String),
    Structured(Value),
}

impl AgentOutput {
    pub fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Structured(value) => value.to_string(),
        }
    }

    /// Parses text output as JSON, tolerating markdown fences and surrounding prose.
    pub fn into_structured(self) -> Result<Value, AgentError> {
        match self {
            Self::Structured(value) => Ok(value),
            Self::Text(text) => {
                let candidate = extract_json_object(&text).ok_or_else(|| {
                    AgentError::MalformedOutput("no JSON object in agent output".to_owned())
                })?;
                serde_json::from_str(candidate)
                    .map_err(|error| AgentError::MalformedOutput(error.to_string()))
            }
        }
    }
}

fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AgentError {
    #[error("agent backend unavailable: {0}")]
    Unavailable(String),
    #[error("agent call failed: {0}")]
    Internal(String),
    #[error("agent returned malformed output: {0}")]
    MalformedOutput(String),
}

impl From<AgentError> for ApiError {
    fn from(error: AgentError) -> Self {
        match error {
            AgentError::Unavailable(detail) => Self::UpstreamUnavailable(detail),
            other => Self::Internal(other.to_string()),
        }
    }
}

#[async_trait]
pub trait AgentClient: Send + Sync {
    async fn invoke(&self, request: AgentRequest) -> Result<AgentOutput, AgentError>;
}
