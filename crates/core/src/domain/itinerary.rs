//! Structured output shapes the formatter agents are asked to fill in.

use serde::{Deserialize, Serialize};

use crate::errors::ValidationErrors;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    /// Start time, e.g. `09:00`.
    pub time: String,
    pub title: String,
    pub description: String,
    pub duration_minutes: u32,
    pub location: String,
    /// Estimated cost in USD.
    #[serde(default)]
    pub cost_estimate: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DayPlan {
    pub day_number: u32,
    #[serde(default)]
    pub date: Option<String>,
    pub theme: String,
    pub activities: Vec<Activity>,
    #[serde(default)]
    pub meals: Vec<String>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TripItinerary {
    pub destination: String,
    pub duration_days: u32,
    pub total_budget: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub best_time_to_visit: String,
    pub days: Vec<DayPlan>,
    #[serde(default)]
    pub packing_tips: Vec<String>,
    #[serde(default)]
    pub local_tips: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    /// City and country.
    pub name: String,
    pub tagline: String,
    pub why_visit: String,
    pub best_time: String,
    /// e.g. `$100-150/day`.
    pub budget_range: String,
    pub highlights: Vec<String>,
    pub travel_style: String,
    /// How well the destination matches the caller's preferences, 0 to 1.
    pub similarity_score: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub recommendations: Vec<Destination>,
    pub personalization_note: String,
}

fn default_currency() -> String {
    "USD".to_string()
}

impl TripItinerary {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.duration_days == 0 {
            errors.push("duration_days", "must be at least 1");
        }
        if !(self.total_budget.is_finite() && self.total_budget >= 0.0) {
            errors.push("total_budget", "must be a non-negative amount");
        }
        for (index, day) in self.days.iter().enumerate() {
            if day.day_number == 0 {
                errors.push(format!("days[{index}].day_number"), "must be at least 1");
            }
            for (slot, activity) in day.activities.iter().enumerate() {
                if !(activity.cost_estimate.is_finite() && activity.cost_estimate >= 0.0) {
                    errors.push(
                        format!("days[{index}].activities[{slot}].cost_estimate"),
                        "must be a non-negative amount",
                    );
                }
            }
        }
        errors.finish(|| ())
    }
}

impl RecommendationResponse {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        for (index, destination) in self.recommendations.iter().enumerate() {
            if !(0.0..=1.0).contains(&destination.similarity_score) {
                errors.push(
                    format!("recommendations[{index}].similarity_score"),
                    "must be between 0 and 1",
                );
            }
        }
        errors.finish(|| ())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{RecommendationResponse, TripItinerary};

    #[test]
    fn itinerary_fills_serde_defaults() {
        let itinerary: TripItinerary = serde_json::from_value(json!({
            "destination": "Bali",
            "duration_days": 1,
            "total_budget": 800.0,
            "best_time_to_visit": "April to October",
            "days": [{
                "day_number": 1,
                "theme": "Arrival",
                "activities": [{
                    "time": "15:00",
                    "title": "Check in",
                    "description": "Settle into the villa",
                    "duration_minutes": 60,
                    "location": "Ubud"
                }]
            }]
        }))
        .expect("itinerary should deserialize");

        assert_eq!(itinerary.currency, "USD");
        assert_eq!(itinerary.days[0].activities[0].cost_estimate, 0.0);
        assert!(itinerary.days[0].meals.is_empty());
        assert!(itinerary.validate().is_ok());
    }

    #[test]
    fn similarity_score_outside_unit_interval_is_rejected() {
        let response: RecommendationResponse = serde_json::from_value(json!({
            "recommendations": [{
                "name": "Lisbon, Portugal",
                "tagline": "Hills, trams and pastel de nata",
                "why_visit": "Food and history on a mid-range budget",
                "best_time": "May",
                "budget_range": "$90-140/day",
                "highlights": ["Alfama", "Belem"],
                "travel_style": "balanced",
                "similarity_score": 1.4
            }],
            "personalization_note": "Matched on food interest"
        }))
        .expect("response should deserialize");

        let errors = response.validate().expect_err("score above 1");
        assert_eq!(errors.fields(), ["recommendations[0].similarity_score"]);
    }
}
