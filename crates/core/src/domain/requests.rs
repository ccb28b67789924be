//! Validated request bodies.
//!
//! Bodies deserialize through serde and are then checked with `validator`.
//! Fields with the wrong JSON type are isolated first so that type errors
//! and constraint violations come back together in one report.

use std::borrow::Cow;
use std::ops::RangeInclusive;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use validator::{Validate, ValidationError};

use crate::errors::ValidationErrors;

pub const DEFAULT_TRAVEL_STYLE: &str = "balanced";
pub const DEFAULT_NUM_RECOMMENDATIONS: u8 = 3;
pub const CONVERSATION_LIMIT: RangeInclusive<i64> = 1..=100;
pub const DEFAULT_CONVERSATION_LIMIT: u32 = 10;

/// A request body that can be checked against its schema.
pub trait RequestBody: DeserializeOwned + Validate {
    fn parse(body: &Value) -> Result<Self, ValidationErrors> {
        parse_body(body)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
pub struct TripPlanRequest {
    #[serde(default)]
    #[validate(custom = "not_blank")]
    pub destination: String,
    #[serde(default)]
    #[validate(range(min = 1, max = 30, message = "must be between 1 and 30"))]
    pub duration_days: u32,
    #[serde(default)]
    #[validate(range(min = 0.0, message = "must not be negative"))]
    pub budget: Option<f64>,
    #[serde(default)]
    pub interests: Option<Vec<String>>,
    #[serde(default = "default_travel_style")]
    pub travel_style: String,
    #[serde(default)]
    pub structured: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
pub struct ChatMessage {
    #[serde(default)]
    #[validate(custom = "not_blank")]
    pub message: String,
    #[serde(default)]
    pub context: Option<SupportContext>,
}

/// The support-relevant subset of a free-form chat context object.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportContext {
    #[serde(default, deserialize_with = "scalar_text")]
    pub trip_id: Option<String>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub booking_ref: Option<String>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub user_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
pub struct RecommendationRequest {
    #[serde(default, deserialize_with = "scalar_text")]
    pub query: Option<String>,
    #[serde(default)]
    pub preferences: Option<TravelPreferences>,
    #[serde(default = "default_num_recommendations")]
    #[validate(range(min = 1, max = 10, message = "must be between 1 and 10"))]
    pub num_recommendations: u8,
    #[serde(default)]
    pub structured: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TravelPreferences {
    #[serde(default, deserialize_with = "scalar_text")]
    pub budget: Option<String>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub duration: Option<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub travel_style: Option<String>,
    #[serde(default)]
    pub avoid: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct PreferenceUpdate {
    #[serde(default)]
    #[validate(custom = "not_blank")]
    pub preference_type: String,
    #[serde(default)]
    #[validate(custom = "not_blank")]
    pub preference_value: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct FeedbackRequest {
    #[serde(default)]
    #[validate(custom = "not_blank")]
    pub destination: String,
    #[serde(default)]
    #[validate(custom = "not_blank")]
    pub feedback: String,
    #[serde(default)]
    #[validate(range(min = 1, max = 5, message = "must be between 1 and 5"))]
    pub rating: Option<u8>,
}

impl RequestBody for TripPlanRequest {}
impl RequestBody for ChatMessage {}
impl RequestBody for RecommendationRequest {}
impl RequestBody for PreferenceUpdate {}
impl RequestBody for FeedbackRequest {}

impl TravelPreferences {
    pub fn is_empty(&self) -> bool {
        self.budget.is_none()
            && self.duration.is_none()
            && self.interests.is_empty()
            && self.travel_style.is_none()
            && self.avoid.is_empty()
    }
}

impl SupportContext {
    pub fn is_empty(&self) -> bool {
        self.trip_id.is_none() && self.booking_ref.is_none() && self.user_name.is_none()
    }
}

/// Deserialize and validate a JSON body, reporting every offending field.
///
/// Every field of a request body has a serde default, so a single-field
/// object only fails to deserialize when that field has the wrong type.
pub fn parse_body<T: RequestBody>(body: &Value) -> Result<T, ValidationErrors> {
    let Value::Object(object) = body else {
        return Err(ValidationErrors::single("body", "must be a JSON object"));
    };

    let mut errors = ValidationErrors::new();
    let mut accepted = object.clone();
    if T::deserialize(body).is_err() {
        for (name, value) in object {
            let alone = Map::from_iter([(name.clone(), value.clone())]);
            if let Err(error) = T::deserialize(Value::Object(alone)) {
                errors.push(name.as_str(), error.to_string());
                accepted.remove(name);
            }
        }
    }

    let request = T::deserialize(Value::Object(accepted))
        .map_err(|error| ValidationErrors::single("body", error.to_string()))?;

    if let Err(invalid) = request.validate() {
        for (field, failures) in invalid.field_errors() {
            if errors.contains(field) {
                continue;
            }
            for failure in failures {
                errors.push(field, failure_message(failure));
            }
        }
    }

    errors.sort_by_field();
    errors.finish(|| request)
}

/// Validate the `limit` query parameter of the conversation history endpoint.
pub fn conversation_limit(raw: Option<&str>) -> Result<u32, ValidationErrors> {
    let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(DEFAULT_CONVERSATION_LIMIT);
    };

    match raw.parse::<i64>() {
        Ok(limit) if CONVERSATION_LIMIT.contains(&limit) => {
            Ok(u32::try_from(limit).unwrap_or(DEFAULT_CONVERSATION_LIMIT))
        }
        Ok(_) => Err(ValidationErrors::single(
            "limit",
            format!(
                "must be between {} and {}",
                CONVERSATION_LIMIT.start(),
                CONVERSATION_LIMIT.end()
            ),
        )),
        Err(_) => Err(ValidationErrors::single("limit", "must be an integer")),
    }
}

fn default_travel_style() -> String {
    DEFAULT_TRAVEL_STYLE.to_string()
}

fn default_num_recommendations() -> u8 {
    DEFAULT_NUM_RECOMMENDATIONS
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new("blank");
        error.message = Some(Cow::Borrowed("is required and must not be empty"));
        return Err(error);
    }
    Ok(())
}

fn failure_message(failure: &ValidationError) -> String {
    match &failure.message {
        Some(message) => message.to_string(),
        None => format!("failed the {} check", failure.code),
    }
}

/// Accept any JSON scalar as prompt text. Null, false, empty strings and
/// containers count as absent.
fn scalar_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(text)) => Some(text.trim().to_string()).filter(|text| !text.is_empty()),
        Some(Value::Number(number)) => Some(number.to_string()),
        Some(Value::Bool(true)) => Some("true".to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        conversation_limit, ChatMessage, FeedbackRequest, PreferenceUpdate, RecommendationRequest,
        RequestBody, SupportContext, TripPlanRequest,
    };

    #[test]
    fn trip_plan_applies_defaults() {
        let request = TripPlanRequest::parse(&json!({
            "destination": "Bali",
            "duration_days": 5
        }))
        .expect("valid request");

        assert_eq!(request.destination, "Bali");
        assert_eq!(request.duration_days, 5);
        assert_eq!(request.budget, None);
        assert_eq!(request.interests, None);
        assert_eq!(request.travel_style, "balanced");
        assert!(!request.structured);
    }

    #[test]
    fn trip_plan_rejects_zero_duration() {
        let errors = TripPlanRequest::parse(&json!({"destination": "Bali", "duration_days": 0}))
            .expect_err("duration 0 is out of range");
        assert_eq!(errors.fields(), ["duration_days"]);
    }

    #[test]
    fn trip_plan_rejects_duration_over_thirty() {
        let errors = TripPlanRequest::parse(&json!({"destination": "Bali", "duration_days": 31}))
            .expect_err("duration 31 is out of range");
        assert!(errors.to_string().contains("between 1 and 30"));
    }

    #[test]
    fn trip_plan_missing_destination_lists_every_bad_field() {
        let errors = TripPlanRequest::parse(&json!({
            "duration_days": "five",
            "interests": "food"
        }))
        .expect_err("several violations");

        assert_eq!(errors.fields(), ["destination", "duration_days", "interests"]);
    }

    #[test]
    fn non_object_body_is_rejected() {
        let errors = TripPlanRequest::parse(&json!(["Bali", 5])).expect_err("array body");
        assert_eq!(errors.fields(), ["body"]);
    }

    #[test]
    fn chat_context_keeps_only_known_present_fields() {
        let message = ChatMessage::parse(&json!({
            "message": "Where is my driver?",
            "context": {"booking_ref": "GB-2024-001", "trip_id": null, "user_name": "", "seat": "4A"}
        }))
        .expect("valid chat");

        assert_eq!(
            message.context,
            Some(SupportContext {
                trip_id: None,
                booking_ref: Some("GB-2024-001".to_string()),
                user_name: None,
            })
        );
    }

    #[test]
    fn chat_context_must_be_an_object() {
        let errors = ChatMessage::parse(&json!({"message": "hi", "context": "trip 1"}))
            .expect_err("string context");
        assert_eq!(errors.fields(), ["context"]);
    }

    #[test]
    fn recommendation_defaults_and_preferences() {
        let request = RecommendationRequest::parse(&json!({
            "preferences": {"budget": 1500, "interests": ["beaches", "food"], "avoid": []}
        }))
        .expect("valid recommendation");

        assert_eq!(request.num_recommendations, 3);
        assert_eq!(request.query, None);
        let preferences = request.preferences.expect("preferences present");
        assert_eq!(preferences.budget.as_deref(), Some("1500"));
        assert_eq!(preferences.interests, ["beaches", "food"]);
        assert!(preferences.avoid.is_empty());
    }

    #[test]
    fn recommendation_count_is_bounded() {
        let errors = RecommendationRequest::parse(&json!({"num_recommendations": 11}))
            .expect_err("too many");
        assert_eq!(errors.fields(), ["num_recommendations"]);
    }

    #[test]
    fn recommendation_nested_type_error_names_the_outer_field() {
        let errors = RecommendationRequest::parse(&json!({
            "preferences": {"avoid": "cold"},
            "num_recommendations": 0
        }))
        .expect_err("avoid must be a list");
        assert_eq!(errors.fields(), ["num_recommendations", "preferences"]);
    }

    #[test]
    fn blank_strings_are_rejected() {
        let errors = FeedbackRequest::parse(&json!({"destination": "   ", "feedback": "ok"}))
            .expect_err("blank destination");
        assert_eq!(errors.fields(), ["destination"]);
        assert!(errors.to_string().contains("must not be empty"));
    }

    #[test]
    fn negative_budget_is_rejected() {
        let errors = TripPlanRequest::parse(&json!({
            "destination": "Bali", "duration_days": 3, "budget": -10
        }))
        .expect_err("negative budget");
        assert_eq!(errors.fields(), ["budget"]);
    }

    #[test]
    fn feedback_rating_bounds() {
        let errors = FeedbackRequest::parse(&json!({
            "destination": "Kyoto", "feedback": "Loved it", "rating": 6
        }))
        .expect_err("rating 6");
        assert_eq!(errors.fields(), ["rating"]);

        let feedback = FeedbackRequest::parse(&json!({
            "destination": "Kyoto", "feedback": "Loved it", "rating": 5
        }))
        .expect("rating 5");
        assert_eq!(feedback.rating, Some(5));
    }

    #[test]
    fn preference_update_requires_both_fields() {
        let errors =
            PreferenceUpdate::parse(&json!({"preference_type": "budget"})).expect_err("missing");
        assert_eq!(errors.fields(), ["preference_value"]);
    }

    #[test]
    fn conversation_limit_parsing() {
        assert_eq!(conversation_limit(None), Ok(10));
        assert_eq!(conversation_limit(Some("25")), Ok(25));
        assert!(conversation_limit(Some("0")).is_err());
        assert!(conversation_limit(Some("ten")).is_err());
    }
}
