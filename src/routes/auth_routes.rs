//! HTTP routes for registration, login and the issued identity token
//!
//! - POST /api/register - create an account, issue identity token + session
//! - POST /api/login    - authenticate, echo stored token, fresh session
//! - GET  /api/token    - fetch the caller's identity token (bearer auth)
//! - GET  /api/profile  - account info plus session audit count (bearer auth)

use chrono::{DateTime, Utc};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::jwt::{extract_token_from_header, Claims};
use crate::auth::AuthOutcome;
use crate::server::http::{
    bridge_error_response, error_response, get_auth_header, json_response, parse_json_body,
    BoxBody,
};
use crate::server::AppState;
use crate::token::codec::Token;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Session-credential block returned by register and login.
#[derive(Debug, Serialize)]
pub struct AuthBlock {
    pub token: String,
    #[serde(rename = "expiresIn")]
    pub expires_in: String,
}

#[derive(Debug, Serialize)]
struct RegisterResponse {
    success: bool,
    message: String,
    user: RegisteredUser,
    auth: AuthBlock,
}

#[derive(Debug, Serialize)]
struct RegisteredUser {
    id: String,
    username: String,
    /// Serialized identity token
    token: String,
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    success: bool,
    message: String,
    user: LoginUser,
    auth: AuthBlock,
}

#[derive(Debug, Serialize)]
struct LoginUser {
    id: String,
    username: String,
    /// Serialized identity token (the stored one, unchanged)
    token: String,
    created_at: DateTime<Utc>,
    last_login: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct TokenResponse {
    success: bool,
    token: Token,
}

#[derive(Debug, Serialize)]
struct ProfileResponse {
    success: bool,
    user: ProfileUser,
}

#[derive(Debug, Serialize)]
struct ProfileUser {
    id: String,
    username: String,
    created_at: DateTime<Utc>,
    last_login: Option<DateTime<Utc>>,
    active_sessions: u64,
}

fn auth_block(outcome: &AuthOutcome) -> AuthBlock {
    AuthBlock {
        token: outcome.session.token.clone(),
        expires_in: outcome.session.expires_in.clone(),
    }
}

/// POST /api/register
pub async fn handle_register(
    req: Request<Incoming>,
    state: Arc<AppState>,
    origin: &str,
) -> Response<BoxBody> {
    let body: RegisterRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return bridge_error_response(e, origin),
    };

    match state.auth.register(&body.username, &body.password).await {
        Ok(outcome) => json_response(
            StatusCode::CREATED,
            &RegisterResponse {
                success: true,
                message: "Account created successfully".to_string(),
                user: RegisteredUser {
                    id: outcome.user.id.clone(),
                    username: outcome.user.username.clone(),
                    token: outcome.user.identity_token.clone(),
                },
                auth: auth_block(&outcome),
            },
            origin,
        ),
        Err(e) => bridge_error_response(e, origin),
    }
}

/// POST /api/login
pub async fn handle_login(
    req: Request<Incoming>,
    state: Arc<AppState>,
    origin: &str,
) -> Response<BoxBody> {
    let body: LoginRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return bridge_error_response(e, origin),
    };

    match state.auth.login(&body.username, &body.password).await {
        Ok(outcome) => json_response(
            StatusCode::OK,
            &LoginResponse {
                success: true,
                message: "Login successful".to_string(),
                user: LoginUser {
                    id: outcome.user.id.clone(),
                    username: outcome.user.username.clone(),
                    token: outcome.user.identity_token.clone(),
                    created_at: outcome.user.created_at,
                    last_login: outcome.user.last_login,
                },
                auth: auth_block(&outcome),
            },
            origin,
        ),
        Err(e) => bridge_error_response(e, origin),
    }
}

/// Authenticate a bearer request; the `Authz` error maps to 401 when the
/// header is absent and 403 when the credential does not verify.
fn require_session(
    req: &Request<Incoming>,
    state: &AppState,
) -> Result<Claims, crate::types::BridgeError> {
    let Some(token) = extract_token_from_header(get_auth_header(req)) else {
        return Err(crate::types::BridgeError::Authz {
            message: "Access denied. Please log in.".to_string(),
            missing: true,
        });
    };

    let result = state.auth.jwt().verify_token(token);
    if !result.valid {
        return Err(crate::types::BridgeError::Authz {
            message: "Invalid session credential".to_string(),
            missing: false,
        });
    }

    // valid implies claims are present
    Ok(result.claims.expect("valid verification carries claims"))
}

/// GET /api/token
pub async fn handle_token(
    req: Request<Incoming>,
    state: Arc<AppState>,
    origin: &str,
) -> Response<BoxBody> {
    let claims = match require_session(&req, &state) {
        Ok(c) => c,
        Err(e) => return bridge_error_response(e, origin),
    };

    let user = match state.store().find_by_id(&claims.user_id).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            return error_response(
                StatusCode::NOT_FOUND,
                "Identity token not found",
                None,
                origin,
            )
        }
        Err(e) => return bridge_error_response(e, origin),
    };

    match Token::parse(&user.identity_token) {
        Ok(token) => json_response(
            StatusCode::OK,
            &TokenResponse {
                success: true,
                token,
            },
            origin,
        ),
        Err(e) => bridge_error_response(
            crate::types::BridgeError::Database(format!("Stored identity token is corrupt: {e}")),
            origin,
        ),
    }
}

/// GET /api/profile
pub async fn handle_profile(
    req: Request<Incoming>,
    state: Arc<AppState>,
    origin: &str,
) -> Response<BoxBody> {
    let claims = match require_session(&req, &state) {
        Ok(c) => c,
        Err(e) => return bridge_error_response(e, origin),
    };

    let user = match state.store().find_by_id(&claims.user_id).await {
        Ok(Some(u)) => u,
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "User not found", None, origin),
        Err(e) => return bridge_error_response(e, origin),
    };

    let active_sessions = match state.store().session_count(&user.id).await {
        Ok(n) => n,
        Err(e) => return bridge_error_response(e, origin),
    };

    json_response(
        StatusCode::OK,
        &ProfileResponse {
            success: true,
            user: ProfileUser {
                id: user.id,
                username: user.username,
                created_at: user.created_at,
                last_login: user.last_login,
                active_sessions,
            },
        },
        origin,
    )
}
