//! POST /api/validate
//!
//! Accepts an untrusted identity-token string and returns its
//! classification. Structural faults (malformed JSON, missing fields,
//! wrong secret) come back as 400 with `valid: false`; an unknown user id
//! is NOT an error, it yields a 200 report with `valid: false`.

use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::server::http::{bridge_error_response, json_response, parse_json_body, BoxBody};
use crate::server::AppState;
use crate::token::validator::{validate_token, ValidationReport, Verdict};

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    /// The raw identity-token JSON string
    pub token: String,
}

#[derive(Debug, Serialize)]
struct ValidateResponse {
    success: bool,
    #[serde(flatten)]
    report: ValidationReport,
}

#[derive(Debug, Serialize)]
struct RejectionResponse {
    error: String,
    valid: bool,
}

pub async fn handle_validate(
    req: Request<Incoming>,
    state: Arc<AppState>,
    origin: &str,
) -> Response<BoxBody> {
    let body: ValidateRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return bridge_error_response(e, origin),
    };

    match validate_token(&body.token, state.store().as_ref()).await {
        Ok(Verdict::Checked(report)) => json_response(
            StatusCode::OK,
            &ValidateResponse {
                success: true,
                report,
            },
            origin,
        ),
        Ok(Verdict::Rejected(fault)) => json_response(
            StatusCode::BAD_REQUEST,
            &RejectionResponse {
                error: fault.to_string(),
                valid: false,
            },
            origin,
        ),
        Err(e) => bridge_error_response(e, origin),
    }
}
