//! HTTP surface.
//!
//! - `POST /api/chat/trip-planner`        strict tier, bearer required
//! - `POST /api/chat/support`             strict tier, bearer required
//! - `POST /api/chat/recommend`           strict tier, bearer or explicit user id
//! - `POST /api/recommend/preferences`    strict tier, bearer or explicit user id
//! - `POST /api/recommend/feedback`       strict tier, bearer or explicit user id
//! - `GET  /api/conversations/{user_id}`  lenient tier, bearer required
//! - `GET  /api/quota`                    lenient tier
//! - `GET  /api/health`, `GET /`          unlimited

pub mod account;
pub mod chat;
pub mod context;
pub mod recommend;

use axum::{
    extract::Request,
    http::{header, HeaderName, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info_span, warn};
use uuid::Uuid;

use crate::bootstrap::AppState;
use crate::health;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn router(state: AppState, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(health::service_info))
        .route("/api/health", get(health::health))
        .route("/api/chat/trip-planner", post(chat::trip_planner))
        .route("/api/chat/support", post(chat::support))
        .route("/api/chat/recommend", post(recommend::recommend))
        .route("/api/recommend/preferences", post(recommend::update_preferences))
        .route("/api/recommend/feedback", post(recommend::feedback))
        .route("/api/conversations/{user_id}", get(account::conversations))
        .route("/api/quota", get(account::quota))
        .with_state(state)
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            let request_id = request
                .headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|value| value.to_str().ok())
                .unwrap_or("unknown");
            info_span!(
                "http.request",
                method = %request.method(),
                path = %request.uri().path(),
                correlation_id = %request_id,
            )
        }))
        .layer(middleware::from_fn(assign_request_id))
        .layer(cors_layer(allowed_origins))
}

/// Keeps a caller-supplied `X-Request-Id`, otherwise mints one; echoed on the response.
async fn assign_request_id(mut request: Request, next: Next) -> Response {
    let request_id = match request.headers().get(REQUEST_ID_HEADER) {
        Some(existing) => existing.clone(),
        None => match HeaderValue::from_str(&Uuid::new_v4().to_string()) {
            Ok(generated) => generated,
            Err(_) => return next.run(request).await,
        },
    };
    request.headers_mut().insert(REQUEST_ID_HEADER, request_id.clone());

    let mut response = next.run(request).await;
    response.headers_mut().insert(REQUEST_ID_HEADER, request_id);
    response
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(event_name = "system.cors.invalid_origin", origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
        ])
        .allow_credentials(true)
}
