//! Error types for the bridge server

use thiserror::Error;

/// Errors surfaced by bridge components
///
/// Domain variants map to HTTP statuses at the route boundary; `Database`
/// is logged and surfaced to clients as a generic 500 without detail.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Bad input shape or length (user-correctable, 400)
    #[error("{0}")]
    Validation(String),

    /// Duplicate username (409)
    #[error("{0}")]
    Conflict(String),

    /// Bad credentials - deliberately non-specific (401)
    #[error("{0}")]
    Auth(String),

    /// Missing or invalid session credential (401 when absent, 403 when
    /// rejected)
    #[error("{message}")]
    Authz {
        message: String,
        /// True when no credential was presented at all
        missing: bool,
    },

    /// Persistence failure (500, detail never leaks to clients)
    #[error("Database error: {0}")]
    Database(String),

    /// Malformed HTTP request body (400)
    #[error("{0}")]
    Http(String),

    /// Invalid configuration at startup
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<std::io::Error> for BridgeError {
    fn from(e: std::io::Error) -> Self {
        BridgeError::Http(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
