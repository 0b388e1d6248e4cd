//! HTTP API handlers for teed-ident

pub mod corrections;
pub mod health;
pub mod identify;
pub mod links;
pub mod rate_limit;
pub mod settings;
pub mod telemetry;

pub use corrections::correction_routes;
pub use health::health_routes;
pub use identify::identify_routes;
pub use links::link_routes;
pub use rate_limit::rate_limit;
pub use settings::settings_routes;
pub use telemetry::telemetry_routes;
