use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use gobuddy_agent::{AgentClient, AgentError, AgentOutput, AgentRequest, AgentRuntime, KnowledgeBase};
use gobuddy_core::{ManualClock, RateLimitPolicy, RateLimiter};
use gobuddy_server::identity::{Identity, IdentityError, IdentityProvider};
use gobuddy_server::{router, AppState};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

const TOKEN: &str = "Bearer valid-token";

struct StubAgent {
    reply: Result<String, AgentError>,
    calls: AtomicUsize,
}

impl StubAgent {
    fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self { reply: Ok(text.to_owned()), calls: AtomicUsize::new(0) })
    }

    fn failing(error: AgentError) -> Arc<Self> {
        Arc::new(Self { reply: Err(error), calls: AtomicUsize::new(0) })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AgentClient for StubAgent {
    async fn invoke(&self, _request: AgentRequest) -> Result<AgentOutput, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone().map(AgentOutput::Text)
    }
}

struct StubIdentity;

#[async_trait]
impl IdentityProvider for StubIdentity {
    async fn verify(&self, token: &str) -> Result<Identity, IdentityError> {
        match token {
            "valid-token" => Ok(Identity { user_id: "traveler-1".to_owned() }),
            _ => Err(IdentityError::InvalidToken),
        }
    }
}

struct Harness {
    app: Router,
    agent: Arc<StubAgent>,
    clock: Arc<ManualClock>,
}

fn harness(agent: Arc<StubAgent>) -> Harness {
    let clock = Arc::new(ManualClock::new());
    let runtime = AgentRuntime::new(agent.clone(), KnowledgeBase::default());
    let state = AppState::with_limiters(
        runtime,
        Arc::new(StubIdentity),
        RateLimiter::new(RateLimitPolicy::STRICT, clock.clone()),
        RateLimiter::new(RateLimitPolicy::LENIENT, clock.clone()),
    );
    Harness { app: router(state, &["http://localhost:3000".to_owned()]), agent, clock }
}

fn post(uri: &str, authorization: Option<&str>, body: Value) -> Request<Body> {
    let mut builder =
        Request::builder().method(Method::POST).uri(uri).header(header::CONTENT_TYPE, "application/json");
    if let Some(authorization) = authorization {
        builder = builder.header(header::AUTHORIZATION, authorization);
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

fn get(uri: &str, authorization: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(authorization) = authorization {
        builder = builder.header(header::AUTHORIZATION, authorization);
    }
    builder.body(Body::empty()).expect("request")
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = app.clone().oneshot(request).await.expect("router is infallible");
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, headers, body)
}

fn error_fields(body: &Value) -> Vec<&str> {
    body["error"]["fields"]
        .as_array()
        .map(|fields| fields.iter().filter_map(|field| field["field"].as_str()).collect())
        .unwrap_or_default()
}

#[tokio::test]
async fn trip_planner_returns_team_plan() {
    let h = harness(StubAgent::replying("Day 1: Ubud rice terraces"));

    let (status, headers, body) = send(
        &h.app,
        post(
            "/api/chat/trip-planner",
            Some(TOKEN),
            json!({"destination": "Bali", "duration_days": 5, "budget": 2000, "travel_style": "balanced"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let data = &body["data"];
    assert_eq!(data["destination"], "Bali");
    assert_eq!(data["duration_days"], 5);
    assert_eq!(data["budget"].as_f64(), Some(2000.0));
    assert_eq!(data["travel_style"], "balanced");
    assert_eq!(data["plan"], "Day 1: Ubud rice terraces");
    assert_eq!(data["agents_used"], json!(["Researcher", "Planner", "Budgeter"]));
    assert_eq!(h.agent.calls(), 3);
    assert!(headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn invalid_trip_body_lists_every_offending_field() {
    let h = harness(StubAgent::replying("unused"));

    let (status, _, body) = send(
        &h.app,
        post("/api/chat/trip-planner", Some(TOKEN), json!({"duration_days": 0})),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "validation_error");
    assert_eq!(error_fields(&body), ["destination", "duration_days"]);
    assert_eq!(h.agent.calls(), 0);
}

#[tokio::test]
async fn malformed_json_is_a_validation_error() {
    let h = harness(StubAgent::replying("unused"));
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/chat/support")
        .header(header::AUTHORIZATION, TOKEN)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .expect("request");

    let (status, _, body) = send(&h.app, request).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error_fields(&body), ["body"]);
}

#[tokio::test]
async fn feedback_rating_out_of_range_is_rejected() {
    let h = harness(StubAgent::replying("unused"));

    let (status, _, body) = send(
        &h.app,
        post(
            "/api/recommend/feedback?user_id=traveler-2",
            None,
            json!({"destination": "Kyoto", "feedback": "Great", "rating": 6}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error_fields(&body), ["rating"]);
}

#[tokio::test]
async fn recommend_without_any_identity_is_bad_request() {
    let h = harness(StubAgent::replying("unused"));

    let (status, _, body) =
        send(&h.app, post("/api/chat/recommend", None, json!({"query": "beaches"}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "missing_identity");
    assert_eq!(h.agent.calls(), 0);
}

#[tokio::test]
async fn recommend_accepts_explicit_user_id() {
    let h = harness(StubAgent::replying("1. Lisbon"));
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/chat/recommend")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-user-id", "traveler-2")
        .body(Body::from(json!({"num_recommendations": 2}).to_string()))
        .expect("request");

    let (status, _, body) = send(&h.app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user_id"], "traveler-2");
    assert_eq!(body["data"]["recommendations"], "1. Lisbon");
    assert_eq!(body["data"]["agent"], "TravelRecommender");
}

#[tokio::test]
async fn bearer_only_endpoints_reject_missing_or_malformed_tokens() {
    let h = harness(StubAgent::replying("unused"));
    let body = json!({"message": "Where is my guide?"});

    let (status, _, _) = send(&h.app, post("/api/chat/support", None, body.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) =
        send(&h.app, post("/api/chat/support", Some("Basic dXNlcjpwdw=="), body.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, payload) =
        send(&h.app, post("/api/chat/support", Some("Bearer expired"), body)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(payload["error"]["code"], "authentication_error");
    assert_eq!(h.agent.calls(), 0);
}

#[tokio::test]
async fn strict_tier_blocks_sixth_call_with_retry_after() {
    let h = harness(StubAgent::replying("unused"));
    let question = json!({"message": "How do I contact you?"});

    for _ in 0..5 {
        let (status, _, _) =
            send(&h.app, post("/api/chat/support", Some(TOKEN), question.clone())).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, headers, body) =
        send(&h.app, post("/api/chat/support", Some(TOKEN), question.clone())).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = headers
        .get(header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
        .expect("retry-after header");
    assert!((1..=60).contains(&retry_after));
    assert_eq!(body["error"]["retry_after"], retry_after);

    h.clock.advance(Duration::from_secs(61));
    let (status, _, _) = send(&h.app, post("/api/chat/support", Some(TOKEN), question)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn quick_response_bypasses_the_agent() {
    let h = harness(StubAgent::replying("unused"));

    let (status, _, body) = send(
        &h.app,
        post("/api/chat/support", Some(TOKEN), json!({"message": "How can I CONTACT support?"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["quick_response"], true);
    assert_eq!(body["data"]["agent"], "SupportBot");
    assert!(body["data"]["answer"].as_str().unwrap_or_default().contains("support@gobuddy.com"));
    assert_eq!(h.agent.calls(), 0);
}

#[tokio::test]
async fn support_question_reaches_the_agent() {
    let h = harness(StubAgent::replying("Your guide meets you in the lobby."));

    let (status, _, body) = send(
        &h.app,
        post(
            "/api/chat/support",
            Some(TOKEN),
            json!({"message": "Where do I meet the guide?", "context": {"trip_id": "T-1"}}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"],
        json!({"answer": "Your guide meets you in the lobby.", "sources_used": false, "agent": "SupportBot"})
    );
}

#[tokio::test]
async fn agent_failure_hides_detail_from_caller() {
    let h = harness(StubAgent::failing(AgentError::Internal("sk-live-123 rejected".to_owned())));

    let (status, _, body) = send(
        &h.app,
        post("/api/recommend/preferences", Some(TOKEN), json!({
            "preference_type": "diet",
            "preference_value": "vegetarian"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["message"], "An unexpected internal error occurred.");
    assert!(!body.to_string().contains("sk-live-123"));
}

#[tokio::test]
async fn unreachable_agent_backend_is_service_unavailable() {
    let h = harness(StubAgent::failing(AgentError::Unavailable("connect timeout".to_owned())));

    let (status, _, body) = send(
        &h.app,
        post("/api/recommend/feedback", Some(TOKEN), json!({"destination": "Kyoto", "feedback": "Loved it"})),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "upstream_unavailable");
}

#[tokio::test]
async fn conversation_history_validates_limit() {
    let h = harness(StubAgent::replying("unused"));

    let (status, _, body) = send(&h.app, get("/api/conversations/test-user?limit=5", Some(TOKEN))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user_id"], "test-user");
    assert_eq!(body["data"]["limit"], 5);
    assert_eq!(body["data"]["conversations"], json!([]));

    let (status, _, body) = send(&h.app, get("/api/conversations/test-user?limit=0", Some(TOKEN))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error_fields(&body), ["limit"]);

    let (status, _, _) = send(&h.app, get("/api/conversations/test-user", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn quota_reports_usage_without_consuming_strict_tier() {
    let h = harness(StubAgent::replying("1. Lisbon"));
    send(&h.app, post("/api/chat/recommend", Some(TOKEN), json!({}))).await;

    let (status, _, body) = send(&h.app, get("/api/quota", Some(TOKEN))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["caller"], "user:traveler-1");
    assert_eq!(body["data"]["ai"]["minute"], json!({"used": 1, "limit": 5}));
    assert_eq!(body["data"]["general"]["minute"], json!({"used": 1, "limit": 30}));
}

#[tokio::test]
async fn quota_for_self_declared_user_is_keyed_by_address() {
    let h = harness(StubAgent::replying("unused"));
    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/quota?user_id=traveler-3")
        .header("x-forwarded-for", "198.51.100.7")
        .body(Body::empty())
        .expect("request");

    let (status, _, body) = send(&h.app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["caller"], "ip:198.51.100.7");
}

#[tokio::test]
async fn rotating_user_ids_from_one_address_share_the_strict_tier() {
    let h = harness(StubAgent::replying("1. Lisbon"));
    let mut statuses = Vec::new();

    for attempt in 0..6 {
        let request = Request::builder()
            .method(Method::POST)
            .uri(format!("/api/chat/recommend?user_id=anon-{attempt}"))
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-forwarded-for", "198.51.100.7")
            .body(Body::from(json!({}).to_string()))
            .expect("request");
        let (status, _, _) = send(&h.app, request).await;
        statuses.push(status);
    }

    assert!(statuses[..5].iter().all(|status| *status == StatusCode::OK));
    assert_eq!(statuses[5], StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(h.agent.calls(), 5);
}

#[tokio::test]
async fn health_and_info_need_no_auth() {
    let h = harness(StubAgent::replying("unused"));

    let (status, _, body) = send(&h.app, get("/api/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, _, body) = send(&h.app, get("/", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "GoBuddy AI Agents");
    assert_eq!(body["health"], "/api/health");
}

#[tokio::test]
async fn cors_preflight_allows_configured_origin() {
    let h = harness(StubAgent::replying("unused"));
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/chat/trip-planner")
        .header(header::ORIGIN, "http://localhost:3000")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization,content-type")
        .body(Body::empty())
        .expect("request");

    let response = h.app.clone().oneshot(request).await.expect("router is infallible");

    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|value| value.to_str().ok()),
        Some("http://localhost:3000")
    );
}

#[tokio::test]
async fn caller_supplied_request_id_is_echoed() {
    let h = harness(StubAgent::replying("unused"));
    let request = Request::builder()
        .uri("/api/health")
        .header("x-request-id", "req-42")
        .body(Body::empty())
        .expect("request");

    let (_, headers, _) = send(&h.app, request).await;

    assert_eq!(headers.get("x-request-id").and_then(|value| value.to_str().ok()), Some("req-42"));
}
