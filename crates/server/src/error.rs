//! JSON envelopes and the `ApiError` to HTTP response mapping.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use gobuddy_agent::AgentError;
use gobuddy_core::{ApiError, FieldError, RateLimitExceeded, ValidationErrors};
use serde::Serialize;
use tracing::{error, info};

use crate::identity::IdentityError;

#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
}

pub fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope { success: true, data })
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FieldError>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: ErrorBody,
}

/// Handler-facing error; renders an `ApiError` as an error envelope.
#[derive(Debug)]
pub struct ApiFailure(pub ApiError);

impl From<ApiError> for ApiFailure {
    fn from(error: ApiError) -> Self {
        Self(error)
    }
}

impl From<AgentError> for ApiFailure {
    fn from(error: AgentError) -> Self {
        Self(error.into())
    }
}

impl From<IdentityError> for ApiFailure {
    fn from(error: IdentityError) -> Self {
        Self(error.into())
    }
}

impl From<RateLimitExceeded> for ApiFailure {
    fn from(error: RateLimitExceeded) -> Self {
        Self(error.into())
    }
}

impl ApiFailure {
    pub fn validation(errors: ValidationErrors) -> Self {
        Self(ApiError::Validation(errors))
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let error = self.0;
        let status =
            StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            error!(event_name = "http.request_failed", code = error.code(), error = %error, "request failed");
        } else {
            info!(event_name = "http.request_rejected", code = error.code(), error = %error, "request rejected");
        }

        let body = ErrorEnvelope {
            success: false,
            error: ErrorBody {
                code: error.code(),
                message: error.user_message(),
                fields: error.validation_errors().map(|errors| errors.errors().to_vec()),
                retry_after: error.retry_after_secs(),
            },
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(retry_after) = error.retry_after_secs() {
            if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        http::{header, StatusCode},
        response::IntoResponse,
    };
    use gobuddy_core::{ApiError, RateLimitExceeded, ValidationErrors, WindowKind};

    use super::ApiFailure;

    #[test]
    fn rate_limited_response_sets_retry_after_header() {
        let response = ApiFailure::from(RateLimitExceeded {
            window: WindowKind::Minute,
            limit: 5,
            retry_after_secs: 17,
        })
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).and_then(|v| v.to_str().ok()), Some("17"));
    }

    #[test]
    fn validation_and_internal_statuses() {
        let response =
            ApiFailure::validation(ValidationErrors::single("rating", "must be between 1 and 5"))
                .into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(response.headers().get(header::RETRY_AFTER).is_none());

        let response = ApiFailure(ApiError::Internal("boom".to_owned())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
