//! Request extractors: caller context and schema-checked JSON bodies.

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use axum::{
    body::Bytes,
    extract::{ConnectInfo, FromRequest, FromRequestParts, Query, Request},
    http::{header, request::Parts, HeaderMap},
};
use gobuddy_core::{caller_key, ApiError, RequestBody, ValidationErrors};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::bootstrap::AppState;
use crate::error::ApiFailure;
use crate::identity::bearer_token;
use crate::routes::REQUEST_ID_HEADER;

pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Debug, Default, Deserialize)]
struct IdentityQuery {
    user_id: Option<String>,
}

/// A resolved caller. Only bearer-verified identities may key rate limits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Caller {
    pub user_id: String,
    verified: bool,
}

impl Caller {
    pub fn is_verified(&self) -> bool {
        self.verified
    }
}

/// Everything about the caller that handlers need besides the body.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    pub request_id: String,
    authorization: Option<String>,
    explicit_user_id: Option<String>,
    forwarded_for: Option<String>,
    peer: Option<IpAddr>,
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let headers = &parts.headers;
        let query_user = Query::<IdentityQuery>::try_from_uri(&parts.uri)
            .map(|Query(query)| query.user_id)
            .unwrap_or_default();

        Ok(Self {
            request_id: header_text(headers, REQUEST_ID_HEADER).unwrap_or_default(),
            authorization: header_text(headers, header::AUTHORIZATION.as_str()),
            explicit_user_id: non_empty(query_user)
                .or_else(|| header_text(headers, USER_ID_HEADER)),
            forwarded_for: header_text(headers, "x-forwarded-for"),
            peer: parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(address)| address.ip()),
        })
    }
}

impl RequestContext {
    /// Verified bearer identity; endpoints using this reject anonymous callers with 401.
    pub async fn require_user(&self, state: &AppState) -> Result<String, ApiError> {
        let Some(header) = self.authorization.as_deref() else {
            return Err(ApiError::Authentication("Authorization header required".to_owned()));
        };
        self.verify(header, state).await
    }

    /// Bearer identity when a token is sent, else the unverified explicit `user_id`.
    pub async fn resolve_user(&self, state: &AppState) -> Result<Caller, ApiError> {
        if let Some(header) = self.authorization.as_deref() {
            let user_id = self.verify(header, state).await?;
            return Ok(Caller { user_id, verified: true });
        }
        let user_id = self.explicit_user_id.clone().ok_or_else(|| {
            ApiError::MissingIdentity(
                "user_id is required: send a bearer token, a user_id query parameter or an \
                 X-User-Id header"
                    .to_owned(),
            )
        })?;
        Ok(Caller { user_id, verified: false })
    }

    /// Like `resolve_user`, but anonymous callers fall back to their address.
    pub async fn optional_user(&self, state: &AppState) -> Result<Option<Caller>, ApiError> {
        match self.resolve_user(state).await {
            Ok(caller) => Ok(Some(caller)),
            Err(ApiError::MissingIdentity(_)) => Ok(None),
            Err(error) => Err(error),
        }
    }

    pub fn rate_key(&self, user_id: Option<&str>) -> String {
        caller_key(user_id, self.forwarded_for.as_deref(), self.peer)
    }

    /// Rate-limit key for a resolved caller. Self-declared ids fall back to the address.
    pub fn caller_rate_key(&self, caller: Option<&Caller>) -> String {
        let verified = caller.filter(|caller| caller.is_verified());
        self.rate_key(verified.map(|caller| caller.user_id.as_str()))
    }

    async fn verify(&self, header: &str, state: &AppState) -> Result<String, ApiError> {
        let token = bearer_token(header).ok_or_else(|| {
            ApiError::Authentication("Authorization header must use the Bearer scheme".to_owned())
        })?;
        let identity = state.identity.verify(token).await?;
        debug!(
            event_name = "auth.verified",
            correlation_id = %self.request_id,
            user_id = %identity.user_id,
            "bearer token verified"
        );
        Ok(identity.user_id)
    }
}

fn header_text(headers: &HeaderMap, name: &str) -> Option<String> {
    non_empty(headers.get(name).and_then(|value| value.to_str().ok()).map(str::to_owned))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|text| text.trim().to_owned()).filter(|text| !text.is_empty())
}

/// JSON body checked against its request schema; every violation is reported at once.
#[derive(Debug)]
pub struct ValidatedBody<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedBody<T>
where
    S: Send + Sync,
    T: RequestBody,
{
    type Rejection = ApiFailure;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(request, state).await.map_err(|rejection| {
            ApiFailure::validation(ValidationErrors::single("body", rejection.body_text()))
        })?;

        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice::<Value>(&bytes).map_err(|error| {
                ApiFailure::validation(ValidationErrors::single(
                    "body",
                    format!("must be valid JSON: {error}"),
                ))
            })?
        };

        T::parse(&value).map(Self).map_err(ApiFailure::validation)
    }
}

#[cfg(test)]
mod tests {
    use axum::{extract::FromRequestParts, http::Request};

    use super::{Caller, RequestContext};

    async fn context_for(request: Request<()>) -> RequestContext {
        let (mut parts, ()) = request.into_parts();
        match RequestContext::from_request_parts(&mut parts, &()).await {
            Ok(context) => context,
            Err(never) => match never {},
        }
    }

    #[tokio::test]
    async fn query_user_id_wins_over_header() {
        let request = Request::builder()
            .uri("/api/chat/recommend?user_id=alice")
            .header("x-user-id", "bob")
            .body(())
            .expect("request");

        let context = context_for(request).await;

        assert_eq!(context.explicit_user_id.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn forwarded_address_keys_anonymous_callers() {
        let request = Request::builder()
            .uri("/api/quota")
            .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
            .header("x-user-id", "  ")
            .body(())
            .expect("request");

        let context = context_for(request).await;

        assert_eq!(context.explicit_user_id, None);
        assert_eq!(context.rate_key(None), "ip:203.0.113.9");
        assert_eq!(context.rate_key(Some("u-1")), "user:u-1");
    }

    #[tokio::test]
    async fn self_declared_user_ids_are_keyed_by_address() {
        let request = Request::builder()
            .uri("/api/chat/recommend?user_id=anon-1")
            .header("x-forwarded-for", "198.51.100.7")
            .body(())
            .expect("request");
        let context = context_for(request).await;

        let declared = Caller { user_id: "anon-1".to_owned(), verified: false };
        let verified = Caller { user_id: "u-1".to_owned(), verified: true };

        assert_eq!(context.caller_rate_key(Some(&declared)), "ip:198.51.100.7");
        assert_eq!(context.caller_rate_key(Some(&verified)), "user:u-1");
        assert_eq!(context.caller_rate_key(None), "ip:198.51.100.7");
    }
}
