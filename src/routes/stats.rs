//! GET /api/stats
//!
//! Admin-only aggregate figures, gated by the `X-Secret-Phrase` header.
//! When no phrase is configured the endpoint is closed entirely.

use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use crate::db::StoreStats;
use crate::server::http::{bridge_error_response, error_response, json_response, BoxBody};
use crate::server::AppState;

#[derive(Debug, Serialize)]
struct StatsResponse {
    success: bool,
    stats: StoreStats,
    system: SystemInfo,
}

#[derive(Debug, Serialize)]
struct SystemInfo {
    version: &'static str,
    uptime_seconds: u64,
}

pub async fn handle_stats(
    req: Request<Incoming>,
    state: Arc<AppState>,
    origin: &str,
) -> Response<BoxBody> {
    let supplied = req
        .headers()
        .get("x-secret-phrase")
        .and_then(|v| v.to_str().ok());

    let authorized = match (&state.args.secret_phrase, supplied) {
        (Some(expected), Some(phrase)) => expected == phrase,
        _ => false,
    };
    if !authorized {
        return error_response(StatusCode::FORBIDDEN, "Access denied", None, origin);
    }

    match state.store().stats().await {
        Ok(stats) => json_response(
            StatusCode::OK,
            &StatsResponse {
                success: true,
                stats,
                system: SystemInfo {
                    version: env!("CARGO_PKG_VERSION"),
                    uptime_seconds: state.uptime_seconds(),
                },
            },
            origin,
        ),
        Err(e) => bridge_error_response(e, origin),
    }
}
