//! HTTP server implementation
//!
//! hyper http1 with TokioIo and hand-matched routing: one spawned task per
//! connection, no background work. Response helpers attach CORS headers
//! resolved from the configured origin list.

use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::auth::AuthService;
use crate::config::Args;
use crate::db::UserStore;
use crate::routes;
use crate::types::BridgeError;

pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Request bodies above this size are rejected outright.
const MAX_BODY_BYTES: usize = 10_240;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub auth: AuthService,
    started: Instant,
}

impl AppState {
    pub fn new(args: Args, auth: AuthService) -> Self {
        Self {
            args,
            auth,
            started: Instant::now(),
        }
    }

    pub fn store(&self) -> &Arc<dyn UserStore> {
        self.auth.store()
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    /// Resolve the `Access-Control-Allow-Origin` value for a request.
    ///
    /// A wildcard entry allows everything; otherwise the request origin is
    /// echoed back only when it appears in the configured list.
    pub fn cors_origin(&self, request_origin: Option<&str>) -> String {
        let allowed = self.args.allowed_origin_list();
        if allowed.iter().any(|o| o == "*") {
            return "*".to_string();
        }
        match request_origin {
            Some(origin) if allowed.iter().any(|o| o == origin) => origin.to_string(),
            _ => allowed.first().cloned().unwrap_or_else(|| "*".to_string()),
        }
    }
}

/// Standard error payload
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

pub fn json_response<T: Serialize>(status: StatusCode, body: &T, origin: &str) -> Response<BoxBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", origin)
        .header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type, Authorization, X-Secret-Phrase")
        .body(full_body(json))
        .unwrap()
}

pub fn error_response(
    status: StatusCode,
    message: impl Into<String>,
    code: Option<&str>,
    origin: &str,
) -> Response<BoxBody> {
    json_response(
        status,
        &ErrorResponse {
            error: message.into(),
            code: code.map(str::to_string),
        },
        origin,
    )
}

/// Map a domain error to its HTTP response. Store failures are logged here
/// and surfaced as a generic 500 without internal detail.
pub fn bridge_error_response(err: BridgeError, origin: &str) -> Response<BoxBody> {
    match err {
        BridgeError::Validation(msg) => {
            error_response(StatusCode::BAD_REQUEST, msg, Some("VALIDATION"), origin)
        }
        BridgeError::Conflict(msg) => {
            error_response(StatusCode::CONFLICT, msg, Some("USER_EXISTS"), origin)
        }
        BridgeError::Auth(msg) => error_response(
            StatusCode::UNAUTHORIZED,
            msg,
            Some("INVALID_CREDENTIALS"),
            origin,
        ),
        BridgeError::Authz { message, missing } => {
            if missing {
                error_response(StatusCode::UNAUTHORIZED, message, Some("NO_TOKEN"), origin)
            } else {
                error_response(StatusCode::FORBIDDEN, message, Some("INVALID_TOKEN"), origin)
            }
        }
        BridgeError::Http(msg) => error_response(StatusCode::BAD_REQUEST, msg, None, origin),
        BridgeError::Database(detail) => {
            error!("Store failure: {}", detail);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                Some("INTERNAL"),
                origin,
            )
        }
        BridgeError::Config(detail) => {
            error!("Configuration failure: {}", detail);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                Some("INTERNAL"),
                origin,
            )
        }
    }
}

fn cors_preflight(origin: &str) -> Response<BoxBody> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", origin)
        .header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type, Authorization, X-Secret-Phrase")
        .header("Access-Control-Max-Age", "86400")
        .body(empty_body())
        .unwrap()
}

pub fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

pub fn empty_body() -> BoxBody {
    Full::new(Bytes::new())
        .map_err(|never| match never {})
        .boxed()
}

/// Read and deserialize a JSON request body.
///
/// The body is streamed through a length limiter, so an oversized request
/// is rejected as soon as the cap is crossed rather than after buffering.
pub async fn parse_json_body<T, B>(req: Request<B>) -> Result<T, BridgeError>
where
    T: for<'de> Deserialize<'de>,
    B: hyper::body::Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let collected = Limited::new(req.into_body(), MAX_BODY_BYTES)
        .collect()
        .await
        .map_err(|e| {
            if e.downcast_ref::<LengthLimitError>().is_some() {
                BridgeError::Http("Request body too large".to_string())
            } else {
                BridgeError::Http(format!("Failed to read body: {e}"))
            }
        })?;

    serde_json::from_slice(&collected.to_bytes())
        .map_err(|e| BridgeError::Http(format!("Invalid JSON: {e}")))
}

pub fn get_auth_header(req: &Request<Incoming>) -> Option<&str> {
    req.headers()
        .get(hyper::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
}

fn not_found_response(path: &str, origin: &str) -> Response<BoxBody> {
    error_response(
        StatusCode::NOT_FOUND,
        format!("Not found: {path}"),
        None,
        origin,
    )
}

/// Run the accept loop until the process exits.
pub async fn run(state: Arc<AppState>) -> Result<(), BridgeError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!("Ilperata bridge listening on {}", state.args.listen);
    if state.args.dev_mode {
        warn!("Development mode enabled");
    }
    if state.args.using_fallback_secret() {
        warn!("JWT_SECRET not set - using the insecure development fallback. Override in production.");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let request_origin = req
        .headers()
        .get(hyper::header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let origin = state.cors_origin(request_origin.as_deref());

    info!("[{}] {} {}", addr, method, path);

    let response = match (method, path.as_str()) {
        // CORS preflight
        (Method::OPTIONS, _) => cors_preflight(&origin),

        // Welcome document listing the endpoints
        (Method::GET, "/") => routes::welcome(&state, &origin),

        // Liveness probe
        (Method::GET, "/health") | (Method::GET, "/healthz") => {
            routes::health_check(&state, &origin)
        }

        (Method::POST, "/api/register") => {
            routes::handle_register(req, Arc::clone(&state), &origin).await
        }
        (Method::POST, "/api/login") => {
            routes::handle_login(req, Arc::clone(&state), &origin).await
        }
        (Method::GET, "/api/token") => {
            routes::handle_token(req, Arc::clone(&state), &origin).await
        }
        (Method::POST, "/api/validate") => {
            routes::handle_validate(req, Arc::clone(&state), &origin).await
        }
        (Method::GET, "/api/profile") => {
            routes::handle_profile(req, Arc::clone(&state), &origin).await
        }
        (Method::GET, "/api/stats") => {
            routes::handle_stats(req, Arc::clone(&state), &origin).await
        }

        _ => not_found_response(&path, &origin),
    };

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::JwtValidator;
    use crate::db::MemoryUserStore;
    use clap::Parser;

    fn state_with_origins(origins: &str) -> AppState {
        let args = Args::parse_from(["ilperata-bridge", "--allowed-origins", origins]);
        let store = Arc::new(MemoryUserStore::new());
        let jwt = JwtValidator::new("test-secret", 3600);
        AppState::new(args, AuthService::new(store, jwt))
    }

    #[test]
    fn session_faults_map_to_their_statuses() {
        let absent = BridgeError::Authz {
            message: "Access denied. Please log in.".to_string(),
            missing: true,
        };
        assert_eq!(
            bridge_error_response(absent, "*").status(),
            StatusCode::UNAUTHORIZED
        );

        let rejected = BridgeError::Authz {
            message: "Invalid session credential".to_string(),
            missing: false,
        };
        assert_eq!(
            bridge_error_response(rejected, "*").status(),
            StatusCode::FORBIDDEN
        );
    }

    #[tokio::test]
    async fn body_over_cap_is_rejected() {
        let payload = format!("{{\"filler\":\"{}\"}}", "x".repeat(MAX_BODY_BYTES));
        let req = Request::builder()
            .body(Full::new(Bytes::from(payload)))
            .unwrap();

        let err = parse_json_body::<serde_json::Value, _>(req)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Request body too large");
    }

    #[tokio::test]
    async fn body_within_cap_parses() {
        let req = Request::builder()
            .body(Full::new(Bytes::from(r#"{"username":"alice"}"#)))
            .unwrap();

        let value: serde_json::Value = parse_json_body(req).await.unwrap();
        assert_eq!(value["username"], "alice");
    }

    #[test]
    fn wildcard_origin_allows_everything() {
        let state = state_with_origins("*");
        assert_eq!(state.cors_origin(Some("https://evil.example")), "*");
        assert_eq!(state.cors_origin(None), "*");
    }

    #[test]
    fn listed_origin_is_echoed_back() {
        let state = state_with_origins("https://a.example,https://b.example");
        assert_eq!(
            state.cors_origin(Some("https://b.example")),
            "https://b.example"
        );
        // Unlisted origins fall back to the first configured entry
        assert_eq!(
            state.cors_origin(Some("https://evil.example")),
            "https://a.example"
        );
    }
}
