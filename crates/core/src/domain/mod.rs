pub mod itinerary;
pub mod requests;
