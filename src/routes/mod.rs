//! HTTP routes for the bridge

pub mod auth_routes;
pub mod health;
pub mod stats;
pub mod validate;

pub use auth_routes::{handle_login, handle_profile, handle_register, handle_token};
pub use health::{health_check, welcome};
pub use stats::handle_stats;
pub use validate::handle_validate;
