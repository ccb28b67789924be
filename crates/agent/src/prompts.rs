//! Deterministic prompt assembly.
//!
//! Absent optional fields contribute nothing, and the remaining segments
//! always appear in the same order, so identical inputs yield identical text.

use gobuddy_core::{
    FeedbackRequest, PreferenceUpdate, RecommendationRequest, SupportContext, TripPlanRequest,
};

const ITINERARY_CLOSING: &str = "Please provide a detailed day-by-day itinerary with activities, \
timings, cost estimates, and local tips.";

const FEEDBACK_CLOSING: &str = "Please note this for my future recommendations and let me know \
how this changes your understanding of my preferences.";

pub fn trip_plan_prompt(request: &TripPlanRequest) -> String {
    let mut parts =
        vec![format!("Plan a {}-day trip to {}.", request.duration_days, request.destination)];

    if let Some(budget) = request.budget.filter(|budget| *budget > 0.0) {
        parts.push(format!("Budget: ${budget} USD total."));
    }
    if let Some(interests) = request.interests.as_ref().filter(|list| !list.is_empty()) {
        parts.push(format!("Interests: {}.", interests.join(", ")));
    }
    parts.push(format!("Travel style: {}.", request.travel_style));
    parts.push(ITINERARY_CLOSING.to_owned());

    parts.join(" ")
}

/// Prompt for the next team member: the task plus everything said so far.
pub fn team_handoff_prompt(task: &str, contributions: &[(&str, String)]) -> String {
    if contributions.is_empty() {
        return task.to_owned();
    }

    let mut prompt = format!("{task}\n\nContributions so far:");
    for (member, output) in contributions {
        prompt.push_str(&format!("\n\n## {member}\n{output}"));
    }
    prompt
}

pub fn trip_format_prompt(plan: &str, request: &TripPlanRequest) -> String {
    let budget = match request.budget {
        Some(budget) if budget > 0.0 => format!("${budget}"),
        _ => "flexible".to_owned(),
    };
    format!(
        "Based on this trip plan, create a structured itinerary:\n\n{plan}\n\n\
         Destination: {}\nDuration: {} days\nBudget: {budget}",
        request.destination, request.duration_days
    )
}

pub fn support_prompt(question: &str, context: Option<&SupportContext>) -> String {
    let Some(context) = context else {
        return question.to_owned();
    };

    let parts: Vec<String> = [
        ("Trip ID", context.trip_id.as_deref()),
        ("Booking Reference", context.booking_ref.as_deref()),
        ("Customer Name", context.user_name.as_deref()),
    ]
    .into_iter()
    .filter_map(|(label, value)| value.map(|value| format!("{label}: {value}")))
    .collect();

    if parts.is_empty() {
        question.to_owned()
    } else {
        format!("Context: {}\n\nQuestion: {question}", parts.join(", "))
    }
}

pub fn recommendation_prompt(request: &RecommendationRequest) -> String {
    let mut lines = vec![match request.query.as_deref() {
        Some(query) => format!("The user is looking for: {query}"),
        None => "Suggest some great travel destinations for me.".to_owned(),
    }];

    if let Some(preferences) = &request.preferences {
        let mut items = Vec::new();
        if let Some(budget) = &preferences.budget {
            items.push(format!("Budget: {budget}"));
        }
        if let Some(duration) = &preferences.duration {
            items.push(format!("Duration: {duration} days"));
        }
        if !preferences.interests.is_empty() {
            items.push(format!("Interests: {}", preferences.interests.join(", ")));
        }
        if let Some(style) = &preferences.travel_style {
            items.push(format!("Travel style: {style}"));
        }
        if !preferences.avoid.is_empty() {
            items.push(format!("Avoid: {}", preferences.avoid.join(", ")));
        }
        if !items.is_empty() {
            lines.push(format!("Preferences: {}", items.join("; ")));
        }
    }

    lines.push(format!(
        "Please recommend {} destinations that would be perfect for me, explaining why each one \
         matches my preferences.",
        request.num_recommendations
    ));
    lines.join("\n")
}

pub fn recommendation_format_prompt(recommendations: &str, count: u8) -> String {
    format!(
        "Convert these travel recommendations into structured format:\n\n{recommendations}\n\n\
         Extract {count} destinations with all required fields."
    )
}

pub fn preference_prompt(update: &PreferenceUpdate) -> String {
    format!(
        "Please note and remember this preference for future recommendations:\n- {}: {}\n\n\
         Acknowledge this update briefly.",
        update.preference_type, update.preference_value
    )
}

pub fn feedback_prompt(request: &FeedbackRequest) -> String {
    let mut parts = vec![format!("I want to share my thoughts about {}.", request.destination)];
    if let Some(rating) = request.rating {
        parts.push(format!("Rating: {rating}/5 stars."));
    }
    parts.push(format!("Feedback: {}", request.feedback));
    parts.push(FEEDBACK_CLOSING.to_owned());
    parts.join(" ")
}
