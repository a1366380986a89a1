//! JWT session credentials
//!
//! The session credential is a signed, time-limited assertion of
//! `{user_id, username}` used to authorize later API calls. It is
//! independent of the identity token and is never persisted - only its
//! session id goes to the audit log.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::types::{BridgeError, Result};

/// Claims embedded in every session credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Standard JWT subject - set to the username
    pub sub: String,
    /// Server-generated user id
    pub user_id: String,
    /// Audit-log handle for this session
    pub session_id: String,
    /// Issued-at (Unix seconds)
    pub iat: u64,
    /// Expiry (Unix seconds)
    pub exp: u64,
}

/// Result of verifying a session credential.
#[derive(Debug)]
pub struct TokenValidationResult {
    pub valid: bool,
    pub claims: Option<Claims>,
    pub error: Option<String>,
}

/// Issues and verifies HS256 session credentials.
pub struct JwtValidator {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiry_seconds: u64,
}

impl JwtValidator {
    pub fn new(secret: &str, expiry_seconds: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiry_seconds,
        }
    }

    pub fn expiry_seconds(&self) -> u64 {
        self.expiry_seconds
    }

    /// Issue a fresh credential for a user with a new session id.
    pub fn issue_token(&self, user_id: &str, username: &str) -> Result<(String, Claims)> {
        let now = Utc::now().timestamp() as u64;
        let claims = Claims {
            sub: username.to_string(),
            user_id: user_id.to_string(),
            session_id: uuid::Uuid::new_v4().simple().to_string(),
            iat: now,
            exp: now + self.expiry_seconds,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| BridgeError::Auth(format!("Failed to sign session credential: {e}")))?;

        Ok((token, claims))
    }

    /// Verify a credential's signature and expiry.
    pub fn verify_token(&self, token: &str) -> TokenValidationResult {
        let validation = Validation::new(Algorithm::HS256);

        match decode::<Claims>(token, &self.decoding_key, &validation) {
            Ok(data) => TokenValidationResult {
                valid: true,
                claims: Some(data.claims),
                error: None,
            },
            Err(e) => TokenValidationResult {
                valid: false,
                claims: None,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Extract the bearer token from an `Authorization` header value.
pub fn extract_token_from_header(header: Option<&str>) -> Option<&str> {
    header
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_and_verify_round_trip() {
        let jwt = JwtValidator::new("test-secret", 3600);
        let (token, issued) = jwt.issue_token("user-1", "alice").unwrap();

        let result = jwt.verify_token(&token);
        assert!(result.valid);

        let claims = result.claims.unwrap();
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.user_id, "user-1");
        assert_eq!(claims.session_id, issued.session_id);
        assert_eq!(claims.exp, claims.iat + 3600);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let issuer = JwtValidator::new("secret-a", 3600);
        let verifier = JwtValidator::new("secret-b", 3600);

        let (token, _) = issuer.issue_token("user-1", "alice").unwrap();
        let result = verifier.verify_token(&token);

        assert!(!result.valid);
        assert!(result.claims.is_none());
        assert!(result.error.is_some());
    }

    #[test]
    fn expired_token_is_rejected() {
        let jwt = JwtValidator::new("test-secret", 3600);

        // Craft a credential whose expiry is past the default leeway
        let now = Utc::now().timestamp() as u64;
        let claims = Claims {
            sub: "alice".to_string(),
            user_id: "user-1".to_string(),
            session_id: "sess".to_string(),
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        assert!(!jwt.verify_token(&token).valid);
    }

    #[test]
    fn garbage_token_is_rejected() {
        let jwt = JwtValidator::new("test-secret", 3600);
        assert!(!jwt.verify_token("not.a.jwt").valid);
    }

    #[test]
    fn session_ids_are_unique_per_issue() {
        let jwt = JwtValidator::new("test-secret", 3600);
        let (_, a) = jwt.issue_token("user-1", "alice").unwrap();
        let (_, b) = jwt.issue_token("user-1", "alice").unwrap();
        assert_ne!(a.session_id, b.session_id);
    }

    #[test]
    fn bearer_extraction() {
        assert_eq!(
            extract_token_from_header(Some("Bearer abc.def.ghi")),
            Some("abc.def.ghi")
        );
        assert_eq!(extract_token_from_header(Some("Basic abc")), None);
        assert_eq!(extract_token_from_header(Some("Bearer ")), None);
        assert_eq!(extract_token_from_header(None), None);
    }
}
