//! Health and welcome endpoints
//!
//! /health is a liveness probe: 200 whenever the process is serving. The
//! welcome document at / lists the available endpoints for humans poking
//! at the server.

use chrono::Utc;
use hyper::{Response, StatusCode};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::server::http::{json_response, BoxBody};
use crate::server::AppState;

#[derive(Serialize)]
struct HealthResponse {
    healthy: bool,
    status: &'static str,
    version: &'static str,
    uptime_seconds: u64,
    timestamp: String,
    mode: &'static str,
    database: DatabaseStatus,
}

#[derive(Serialize)]
struct DatabaseStatus {
    backend: &'static str,
    connected: bool,
}

/// Handle liveness probe (/health, /healthz)
pub fn health_check(state: &AppState, origin: &str) -> Response<BoxBody> {
    let response = HealthResponse {
        healthy: true,
        status: "online",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.uptime_seconds(),
        timestamp: Utc::now().to_rfc3339(),
        mode: if state.args.dev_mode {
            "development"
        } else {
            "production"
        },
        database: DatabaseStatus {
            backend: state.store().backend(),
            connected: true,
        },
    };

    json_response(StatusCode::OK, &response, origin)
}

#[derive(Serialize)]
struct WelcomeResponse {
    message: &'static str,
    version: &'static str,
    status: &'static str,
    endpoints: BTreeMap<&'static str, &'static str>,
}

/// Handle GET / - a human-readable index of the API surface.
pub fn welcome(state: &AppState, origin: &str) -> Response<BoxBody> {
    let endpoints = BTreeMap::from([
        ("register", "POST /api/register"),
        ("login", "POST /api/login"),
        ("token", "GET /api/token (bearer auth)"),
        ("validate", "POST /api/validate"),
        ("profile", "GET /api/profile (bearer auth)"),
        ("stats", "GET /api/stats (admin)"),
        ("health", "GET /health"),
    ]);

    let response = WelcomeResponse {
        message: "Ilperata bridge server",
        version: env!("CARGO_PKG_VERSION"),
        status: if state.args.dev_mode {
            "running (development)"
        } else {
            "running"
        },
        endpoints,
    };

    json_response(StatusCode::OK, &response, origin)
}
