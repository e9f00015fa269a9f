pub mod health;
pub mod recommendations;

pub use health::{health_check, readiness_check};
pub use recommendations::recommendations_config;
