//! Registration and login flows
//!
//! Registration is terminal per username (no re-registration); each login is
//! a stateless transition that issues a fresh session credential without
//! touching identity fields. The identity token is built once at
//! registration and echoed unchanged by every later login.

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::jwt::JwtValidator;
use crate::auth::password::{hash_password, verify_password};
use crate::db::{SessionRecord, UserRecord, UserStore};
use crate::token::codec::Token;
use crate::types::{BridgeError, Result};

/// The single message for every credential failure. Unknown username and
/// wrong password are indistinguishable by design.
pub const AUTH_FAILED_MESSAGE: &str = "Invalid username or password";

const MIN_USERNAME_CHARS: usize = 3;
const MIN_PASSWORD_CHARS: usize = 6;

/// A freshly issued session credential.
#[derive(Debug, Clone)]
pub struct SessionGrant {
    /// Signed JWT for the Authorization header
    pub token: String,
    /// Audit-log handle
    pub session_id: String,
    /// Unix seconds
    pub expires_at: u64,
    /// Human-readable validity window, e.g. "30d"
    pub expires_in: String,
}

/// Result of a successful registration or login.
#[derive(Debug, Clone)]
pub struct AuthOutcome {
    pub user: UserRecord,
    pub token: Token,
    pub session: SessionGrant,
}

/// Registration and login against a user store.
pub struct AuthService {
    store: Arc<dyn UserStore>,
    jwt: JwtValidator,
}

impl AuthService {
    pub fn new(store: Arc<dyn UserStore>, jwt: JwtValidator) -> Self {
        Self { store, jwt }
    }

    pub fn store(&self) -> &Arc<dyn UserStore> {
        &self.store
    }

    pub fn jwt(&self) -> &JwtValidator {
        &self.jwt
    }

    /// Register a new user.
    ///
    /// Validates input lengths, hashes the password, builds the identity
    /// token, and persists the record through the store's atomic
    /// unique-insert; a duplicate username surfaces as `Conflict`.
    pub async fn register(&self, username: &str, password: &str) -> Result<AuthOutcome> {
        if username.chars().count() < MIN_USERNAME_CHARS {
            return Err(BridgeError::Validation(format!(
                "Username must be at least {MIN_USERNAME_CHARS} characters"
            )));
        }
        if password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(BridgeError::Validation(format!(
                "Password must be at least {MIN_PASSWORD_CHARS} characters"
            )));
        }

        let user_id = Uuid::new_v4().simple().to_string();
        let password_hash = match hash_password(password) {
            Ok(hash) => hash,
            Err(e) => {
                warn!("Password hashing failed: {}", e);
                return Err(BridgeError::Database("Failed to hash password".to_string()));
            }
        };

        let token = Token::build(username, &user_id);
        let user = UserRecord {
            id: user_id.clone(),
            username: username.to_string(),
            password_hash,
            identity_token: token.serialize(),
            created_at: Utc::now(),
            last_login: None,
        };

        self.store.insert_user(user.clone()).await?;
        info!("Registered new user: {}", username);

        let session = self.grant_session(&user).await?;

        Ok(AuthOutcome {
            user,
            token,
            session,
        })
    }

    /// Authenticate an existing user.
    ///
    /// Touches `last_login` and echoes the stored identity token unchanged;
    /// only the session credential is fresh.
    pub async fn login(&self, username: &str, password: &str) -> Result<AuthOutcome> {
        let Some(mut user) = self.store.find_by_username(username).await? else {
            warn!("Login failed - user not found: {}", username);
            return Err(BridgeError::Auth(AUTH_FAILED_MESSAGE.to_string()));
        };

        let password_valid = match verify_password(password, &user.password_hash) {
            Ok(valid) => valid,
            Err(e) => {
                warn!("Password verification error for {}: {}", username, e);
                return Err(BridgeError::Database(
                    "Password verification failed".to_string(),
                ));
            }
        };
        if !password_valid {
            warn!("Login failed - invalid password: {}", username);
            return Err(BridgeError::Auth(AUTH_FAILED_MESSAGE.to_string()));
        }

        let now = Utc::now();
        self.store.touch_last_login(&user.id, now).await?;
        user.last_login = Some(now);

        let token = Token::parse(&user.identity_token).map_err(|e| {
            // A stored token that no longer parses is a persistence-level fault
            BridgeError::Database(format!("Stored identity token is corrupt: {e}"))
        })?;

        info!("Login successful: {}", username);

        let session = self.grant_session(&user).await?;

        Ok(AuthOutcome {
            user,
            token,
            session,
        })
    }

    /// Issue a session credential and append its id to the audit log.
    async fn grant_session(&self, user: &UserRecord) -> Result<SessionGrant> {
        let (token, claims) = self.jwt.issue_token(&user.id, &user.username)?;

        // The audit log is best-effort: a failed write must not undo a
        // registration or login that already succeeded.
        if let Err(e) = self
            .store
            .record_session(SessionRecord {
                id: claims.session_id.clone(),
                user_id: user.id.clone(),
                created_at: Utc::now(),
                expires_at: chrono::DateTime::from_timestamp(claims.exp as i64, 0)
                    .unwrap_or_else(Utc::now),
            })
            .await
        {
            warn!("Failed to record session {}: {}", claims.session_id, e);
        }

        Ok(SessionGrant {
            token,
            session_id: claims.session_id,
            expires_at: claims.exp,
            expires_in: format!("{}d", self.jwt.expiry_seconds() / 86_400),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryUserStore;
    use crate::token::validator::{validate_token, Verdict};

    fn service() -> AuthService {
        AuthService::new(
            Arc::new(MemoryUserStore::new()),
            JwtValidator::new("test-secret", 2_592_000),
        )
    }

    #[tokio::test]
    async fn register_issues_token_and_session() {
        let svc = service();
        let outcome = svc.register("alice", "secret1").await.unwrap();

        assert_eq!(outcome.user.username, "alice");
        assert_eq!(outcome.user.id.len(), 32);
        assert!(outcome.user.password_hash.starts_with("$argon2"));
        assert_eq!(outcome.token.identity, "alice");
        assert_eq!(outcome.token.user_id, outcome.user.id);
        assert!(outcome
            .user
            .identity_token
            .contains("\"protocol\": \"ilperata_protocol_v1_server\""));
        assert_eq!(outcome.session.expires_in, "30d");

        // The session credential verifies against the issuing service
        let result = svc.jwt().verify_token(&outcome.session.token);
        assert!(result.valid);
        assert_eq!(result.claims.unwrap().sub, "alice");
    }

    #[tokio::test]
    async fn register_rejects_short_username_and_password() {
        let svc = service();

        let err = svc.register("ab", "secret1").await.unwrap_err();
        assert!(matches!(err, BridgeError::Validation(_)));

        let err = svc.register("alice", "short").await.unwrap_err();
        assert!(matches!(err, BridgeError::Validation(_)));
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts_without_touching_first() {
        let svc = service();
        let first = svc.register("alice", "secret1").await.unwrap();

        let err = svc.register("alice", "other-password").await.unwrap_err();
        assert!(matches!(err, BridgeError::Conflict(_)));

        let kept = svc.store().find_by_username("alice").await.unwrap().unwrap();
        assert_eq!(kept.id, first.user.id);
        assert_eq!(kept.identity_token, first.user.identity_token);
    }

    #[tokio::test]
    async fn login_failures_share_one_message() {
        let svc = service();
        svc.register("alice", "secret1").await.unwrap();

        let unknown_user = svc.login("nobody", "secret1").await.unwrap_err();
        let wrong_password = svc.login("alice", "wrong-password").await.unwrap_err();

        // No information leak about which part was wrong
        assert_eq!(unknown_user.to_string(), wrong_password.to_string());
        assert_eq!(unknown_user.to_string(), AUTH_FAILED_MESSAGE);
        assert!(matches!(unknown_user, BridgeError::Auth(_)));
        assert!(matches!(wrong_password, BridgeError::Auth(_)));
    }

    #[tokio::test]
    async fn login_echoes_stored_token_and_touches_last_login() {
        let svc = service();
        let registered = svc.register("alice", "secret1").await.unwrap();

        let logged_in = svc.login("alice", "secret1").await.unwrap();

        // Identity token is never regenerated on login
        assert_eq!(logged_in.token, registered.token);
        assert_eq!(
            logged_in.user.identity_token,
            registered.user.identity_token
        );
        assert!(logged_in.user.last_login.is_some());

        // But the session credential is fresh
        assert_ne!(
            logged_in.session.session_id,
            registered.session.session_id
        );
    }

    #[tokio::test]
    async fn sessions_accumulate_in_audit_log() {
        let svc = service();
        let outcome = svc.register("alice", "secret1").await.unwrap();
        svc.login("alice", "secret1").await.unwrap();
        svc.login("alice", "secret1").await.unwrap();

        let count = svc.store().session_count(&outcome.user.id).await.unwrap();
        assert_eq!(count, 3);
    }

    /// Delegates everything to the in-memory store except session audit
    /// writes, which always fail.
    struct AuditFailingStore(MemoryUserStore);

    #[async_trait::async_trait]
    impl UserStore for AuditFailingStore {
        async fn insert_user(&self, user: UserRecord) -> Result<()> {
            self.0.insert_user(user).await
        }

        async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
            self.0.find_by_username(username).await
        }

        async fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>> {
            self.0.find_by_id(id).await
        }

        async fn touch_last_login(&self, id: &str, when: chrono::DateTime<Utc>) -> Result<()> {
            self.0.touch_last_login(id, when).await
        }

        async fn record_session(&self, _session: SessionRecord) -> Result<()> {
            Err(BridgeError::Database(
                "session collection unavailable".to_string(),
            ))
        }

        async fn session_count(&self, user_id: &str) -> Result<u64> {
            self.0.session_count(user_id).await
        }

        async fn stats(&self) -> Result<crate::db::StoreStats> {
            self.0.stats().await
        }

        fn backend(&self) -> &'static str {
            "memory"
        }
    }

    #[tokio::test]
    async fn failed_audit_write_does_not_fail_signup_or_login() {
        let svc = AuthService::new(
            Arc::new(AuditFailingStore(MemoryUserStore::new())),
            JwtValidator::new("test-secret", 3600),
        );

        let outcome = svc.register("alice", "secret1").await.unwrap();
        assert!(svc.jwt().verify_token(&outcome.session.token).valid);

        svc.login("alice", "secret1").await.unwrap();
    }

    #[tokio::test]
    async fn registered_token_validates_against_store() {
        // End-to-end: a token issued at registration must validate as-is
        let svc = service();
        let outcome = svc.register("alice", "secret1").await.unwrap();

        let verdict = validate_token(&outcome.user.identity_token, svc.store().as_ref())
            .await
            .unwrap();
        match verdict {
            Verdict::Checked(report) => {
                assert!(report.valid);
                assert!(report.server_verified);
                assert_eq!(report.identity, "alice");
            }
            Verdict::Rejected(fault) => panic!("unexpected rejection: {fault}"),
        }
    }
}
