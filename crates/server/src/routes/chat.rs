use axum::{
    extract::State,
    response::{IntoResponse, Response},
};
use gobuddy_core::{ChatMessage, TripPlanRequest};
use tracing::info;

use crate::bootstrap::AppState;
use crate::error::{ok, ApiFailure};
use crate::routes::context::{RequestContext, ValidatedBody};

pub async fn trip_planner(
    State(state): State<AppState>,
    context: RequestContext,
    ValidatedBody(request): ValidatedBody<TripPlanRequest>,
) -> Result<Response, ApiFailure> {
    let user_id = context.require_user(&state).await?;
    state.ai_limiter.check(&context.rate_key(Some(&user_id)))?;

    info!(
        event_name = "chat.trip_planner",
        correlation_id = %context.request_id,
        destination = %request.destination,
        duration_days = request.duration_days,
        structured = request.structured,
        "planning trip"
    );

    if request.structured {
        let itinerary = state.runtime.plan_trip_structured(&request, Some(&user_id)).await?;
        return Ok(ok(itinerary).into_response());
    }
    let plan = state.runtime.plan_trip(&request, Some(&user_id)).await?;
    Ok(ok(plan).into_response())
}

pub async fn support(
    State(state): State<AppState>,
    context: RequestContext,
    ValidatedBody(message): ValidatedBody<ChatMessage>,
) -> Result<Response, ApiFailure> {
    let user_id = context.require_user(&state).await?;
    state.ai_limiter.check(&context.rate_key(Some(&user_id)))?;

    info!(
        event_name = "chat.support",
        correlation_id = %context.request_id,
        has_context = message.context.is_some(),
        "answering support question"
    );

    let answer = state.runtime.answer_question(&message, Some(&user_id)).await?;
    Ok(ok(answer).into_response())
}
