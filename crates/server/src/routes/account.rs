use axum::{
    extract::{Path, Query, State},
    Json,
};
use gobuddy_core::{conversation_limit, Usage};
use serde::{Deserialize, Serialize};

use crate::bootstrap::AppState;
use crate::error::{ok, ApiFailure, Envelope};
use crate::routes::context::RequestContext;

const HISTORY_NOTE: &str = "Conversation history requires database integration";

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConversationHistory {
    pub user_id: String,
    pub limit: u32,
    pub conversations: Vec<serde_json::Value>,
    pub note: &'static str,
}

#[derive(Debug, Serialize)]
pub struct QuotaReport {
    pub caller: String,
    pub ai: Usage,
    pub general: Usage,
}

/// Placeholder: history lives in the agent backend and is not exposed yet.
pub async fn conversations(
    State(state): State<AppState>,
    context: RequestContext,
    Path(user_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Envelope<ConversationHistory>>, ApiFailure> {
    let limit = conversation_limit(query.limit.as_deref()).map_err(ApiFailure::validation)?;
    let caller = context.require_user(&state).await?;
    state.general_limiter.check(&context.rate_key(Some(&caller)))?;

    Ok(ok(ConversationHistory { user_id, limit, conversations: Vec::new(), note: HISTORY_NOTE }))
}

/// Current usage for the caller in both tiers. Counts against the lenient tier itself.
pub async fn quota(
    State(state): State<AppState>,
    context: RequestContext,
) -> Result<Json<Envelope<QuotaReport>>, ApiFailure> {
    let caller = context.optional_user(&state).await?;
    let key = context.caller_rate_key(caller.as_ref());
    state.general_limiter.check(&key)?;

    let report = QuotaReport {
        ai: state.ai_limiter.get_remaining(&key),
        general: state.general_limiter.get_remaining(&key),
        caller: key,
    };
    Ok(ok(report))
}
