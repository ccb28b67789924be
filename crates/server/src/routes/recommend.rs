use axum::{
    extract::State,
    response::{IntoResponse, Response},
};
use gobuddy_core::{FeedbackRequest, PreferenceUpdate, RecommendationRequest};
use tracing::info;

use crate::bootstrap::AppState;
use crate::error::{ok, ApiFailure};
use crate::routes::context::{RequestContext, ValidatedBody};

pub async fn recommend(
    State(state): State<AppState>,
    context: RequestContext,
    ValidatedBody(request): ValidatedBody<RecommendationRequest>,
) -> Result<Response, ApiFailure> {
    let caller = context.resolve_user(&state).await?;
    state.ai_limiter.check(&context.caller_rate_key(Some(&caller)))?;
    let user_id = caller.user_id;

    info!(
        event_name = "recommend.requested",
        correlation_id = %context.request_id,
        num_recommendations = request.num_recommendations,
        structured = request.structured,
        "fetching recommendations"
    );

    if request.structured {
        let response = state.runtime.get_structured_recommendations(&request, &user_id).await?;
        return Ok(ok(response).into_response());
    }
    let recommendations = state.runtime.get_recommendations(&request, &user_id).await?;
    Ok(ok(recommendations).into_response())
}

pub async fn update_preferences(
    State(state): State<AppState>,
    context: RequestContext,
    ValidatedBody(update): ValidatedBody<PreferenceUpdate>,
) -> Result<Response, ApiFailure> {
    let caller = context.resolve_user(&state).await?;
    state.ai_limiter.check(&context.caller_rate_key(Some(&caller)))?;
    let user_id = caller.user_id;

    info!(
        event_name = "recommend.preferences_updated",
        correlation_id = %context.request_id,
        preference_type = %update.preference_type,
        "recording preference"
    );

    let ack = state.runtime.update_preferences(&update, &user_id).await?;
    Ok(ok(ack).into_response())
}

pub async fn feedback(
    State(state): State<AppState>,
    context: RequestContext,
    ValidatedBody(feedback): ValidatedBody<FeedbackRequest>,
) -> Result<Response, ApiFailure> {
    let caller = context.resolve_user(&state).await?;
    state.ai_limiter.check(&context.caller_rate_key(Some(&caller)))?;
    let user_id = caller.user_id;

    info!(
        event_name = "recommend.feedback_recorded",
        correlation_id = %context.request_id,
        destination = %feedback.destination,
        rating = ?feedback.rating,
        "recording destination feedback"
    );

    let ack = state.runtime.provide_feedback(&feedback, &user_id).await?;
    Ok(ok(ack).into_response())
}
