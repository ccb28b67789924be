pub mod config;
pub mod domain;
pub mod errors;
pub mod rate_limit;

pub use domain::itinerary::{
    Activity, DayPlan, Destination, RecommendationResponse, TripItinerary,
};
pub use domain::requests::{
    conversation_limit, parse_body, ChatMessage, FeedbackRequest, PreferenceUpdate, RecommendationRequest, RequestBody,
    SupportContext, TravelPreferences, TripPlanRequest,
};
pub use errors::{ApiError, FieldError, ValidationErrors};
pub use rate_limit::{
    caller_key, Clock, ManualClock, RateLimitExceeded, RateLimitPolicy, RateLimiter, SystemClock,
    Usage, WindowKind, WindowUsage,
};
