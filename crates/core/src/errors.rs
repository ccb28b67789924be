use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::rate_limit::RateLimitExceeded;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Every constraint violation found in a request body.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.push(field, message);
        errors
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError { field: field.into(), message: message.into() });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn contains(&self, field: &str) -> bool {
        self.errors.iter().any(|error| error.field == field)
    }

    /// Orders errors by field name; errors on one field keep their relative order.
    pub fn sort_by_field(&mut self) {
        self.errors.sort_by(|left, right| left.field.cmp(&right.field));
    }

    pub fn fields(&self) -> Vec<&str> {
        self.errors.iter().map(|error| error.field.as_str()).collect()
    }

    /// `Ok(value)` when nothing was recorded, otherwise the collected errors.
    pub fn finish<T>(self, value: impl FnOnce() -> T) -> Result<T, Self> {
        if self.is_empty() {
            Ok(value())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self
            .errors
            .iter()
            .map(|error| format!("{}: {}", error.field, error.message))
            .collect::<Vec<_>>()
            .join("; ");
        write!(f, "{rendered}")
    }
}

impl std::error::Error for ValidationErrors {}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("request validation failed: {0}")]
    Validation(#[from] ValidationErrors),
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("missing caller identity: {0}")]
    MissingIdentity(String),
    #[error(transparent)]
    RateLimited(#[from] RateLimitExceeded),
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 422,
            Self::Authentication(_) => 401,
            Self::MissingIdentity(_) => 400,
            Self::RateLimited(_) => 429,
            Self::UpstreamUnavailable(_) => 503,
            Self::Internal(_) => 500,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::Authentication(_) => "authentication_error",
            Self::MissingIdentity(_) => "missing_identity",
            Self::RateLimited(_) => "rate_limited",
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Caller-facing text. Only validation field names and retry hints leak through.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(errors) => format!("Invalid request: {errors}"),
            Self::Authentication(reason) => reason.clone(),
            Self::MissingIdentity(reason) => reason.clone(),
            Self::RateLimited(exceeded) => exceeded.user_message(),
            Self::UpstreamUnavailable(_) => {
                "A required service is temporarily unavailable. Please retry shortly.".to_string()
            }
            Self::Internal(_) => "An unexpected internal error occurred.".to_string(),
        }
    }

    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimited(exceeded) => Some(exceeded.retry_after_secs),
            _ => None,
        }
    }

    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            Self::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}
