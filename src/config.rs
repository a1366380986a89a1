//! Configuration for the bridge server
//!
//! CLI arguments and environment variable handling using clap. Every knob
//! has a documented fallback default; the signing-secret and admin-phrase
//! fallbacks are for development only and MUST be overridden in production.

use clap::Parser;
use std::net::SocketAddr;

/// Insecure development fallback for the JWT signing secret. Startup warns
/// loudly whenever this is in use.
pub const FALLBACK_JWT_SECRET: &str = "fallback_secret_key_change_in_production";

/// Ilperata Bridge - identity-token issuance and validation server
#[derive(Parser, Debug, Clone)]
#[command(name = "ilperata-bridge")]
#[command(about = "Identity-token bridge server")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:3000")]
    pub listen: SocketAddr,

    /// JWT secret for session-credential signing (required in production)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// Session-credential validity window in seconds (default 30 days)
    #[arg(long, env = "JWT_EXPIRY_SECONDS", default_value = "2592000")]
    pub jwt_expiry_seconds: u64,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "ilperata_bridge")]
    pub mongodb_db: String,

    /// Enable development mode (in-memory store fallback when MongoDB is unreachable)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Comma-separated list of allowed CORS origins
    #[arg(long, env = "ALLOWED_ORIGINS", default_value = "*")]
    pub allowed_origins: String,

    /// Shared-secret phrase gating the admin stats endpoint (403 when unset)
    #[arg(long, env = "SECRET_PHRASE")]
    pub secret_phrase: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Effective JWT secret. Falls back to the insecure development
    /// constant when unset; [`Args::using_fallback_secret`] reports this so
    /// startup can warn.
    pub fn jwt_secret(&self) -> String {
        self.jwt_secret
            .clone()
            .unwrap_or_else(|| FALLBACK_JWT_SECRET.to_string())
    }

    pub fn using_fallback_secret(&self) -> bool {
        self.jwt_secret.is_none()
    }

    /// Parsed CORS origin list.
    pub fn allowed_origin_list(&self) -> Vec<String> {
        self.allowed_origins
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.jwt_expiry_seconds == 0 {
            return Err("JWT_EXPIRY_SECONDS must be greater than zero".to_string());
        }
        if self.allowed_origin_list().is_empty() {
            return Err("ALLOWED_ORIGINS must name at least one origin or '*'".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_from(argv: &[&str]) -> Args {
        Args::parse_from(std::iter::once("ilperata-bridge").chain(argv.iter().copied()))
    }

    #[test]
    fn defaults_are_usable() {
        let args = args_from(&[]);
        assert_eq!(args.listen.port(), 3000);
        assert_eq!(args.jwt_expiry_seconds, 2_592_000);
        assert!(args.using_fallback_secret());
        assert_eq!(args.jwt_secret(), FALLBACK_JWT_SECRET);
        assert_eq!(args.allowed_origin_list(), vec!["*"]);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn explicit_secret_disables_fallback() {
        let args = args_from(&["--jwt-secret", "real-secret"]);
        assert!(!args.using_fallback_secret());
        assert_eq!(args.jwt_secret(), "real-secret");
    }

    #[test]
    fn origin_list_is_split_and_trimmed() {
        let args = args_from(&["--allowed-origins", "https://a.example, https://b.example"]);
        assert_eq!(
            args.allowed_origin_list(),
            vec!["https://a.example", "https://b.example"]
        );
    }

    #[test]
    fn zero_expiry_fails_validation() {
        let args = args_from(&["--jwt-expiry-seconds", "0"]);
        assert!(args.validate().is_err());
    }
}
