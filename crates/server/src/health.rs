use axum::{http::StatusCode, Json};
use chrono::Utc;
use serde::Serialize;

pub const SERVICE_NAME: &str = "GoBuddy AI Agents";
pub const SERVICE_VERSION: &str = "1.0.0";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AgentStatus {
    pub trip_planner: &'static str,
    pub support_bot: &'static str,
    pub recommender: &'static str,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub agents: AgentStatus,
    pub checked_at: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AgentEndpoint {
    pub name: &'static str,
    pub endpoint: &'static str,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ServiceInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub agents: Vec<AgentEndpoint>,
    pub health: &'static str,
}

/// Liveness only; the agent backend is not contacted.
pub async fn health() -> (StatusCode, Json<HealthResponse>) {
    let payload = HealthResponse {
        status: "healthy",
        agents: AgentStatus { trip_planner: "ready", support_bot: "ready", recommender: "ready" },
        checked_at: Utc::now().to_rfc3339(),
    };
    (StatusCode::OK, Json(payload))
}

pub async fn service_info() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        name: SERVICE_NAME,
        version: SERVICE_VERSION,
        agents: vec![
            AgentEndpoint { name: "TripPlanner", endpoint: "/api/chat/trip-planner" },
            AgentEndpoint { name: "SupportBot", endpoint: "/api/chat/support" },
            AgentEndpoint { name: "Recommender", endpoint: "/api/chat/recommend" },
        ],
        health: "/api/health",
    })
}
