pub mod analytics;
pub mod health;
pub mod track;

pub use analytics::analytics_routes;
pub use health::{AppStartTime, HealthService, health_routes};
pub use track::{TrackService, track_routes};
