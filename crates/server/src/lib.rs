pub mod bootstrap;
pub mod error;
pub mod health;
pub mod identity;
pub mod routes;
pub mod telemetry;

pub use bootstrap::{AppState, Application};
pub use routes::router;
