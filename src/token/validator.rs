//! Token validator
//!
//! Accepts an arbitrary untrusted string claiming to be an identity token
//! and classifies it. Checks run in a pinned order so error messages are
//! deterministic: JSON shape, required fields, shared secret, then the
//! server-side user binding.

use serde_json::Value;
use std::fmt;

use crate::db::UserStore;
use crate::token::codec::SHARED_SECRET_KEY;
use crate::types::Result;

/// Required top-level fields, checked in this exact order.
pub const REQUIRED_FIELDS: [&str; 4] = ["protocol", "identity", "user_id", "shared_secret"];

/// Structural rejection of a submitted token. These map to 400; an unknown
/// user is NOT a fault, it yields a `valid: false` report instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenFault {
    /// Not parseable JSON
    Malformed(String),
    /// First missing required field, in [`REQUIRED_FIELDS`] order
    Incomplete(&'static str),
    /// `shared_secret.key` does not equal the process-wide challenge
    SecretMismatch,
}

impl fmt::Display for TokenFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenFault::Malformed(detail) => {
                write!(f, "Identity token is not valid JSON: {detail}")
            }
            TokenFault::Incomplete(field) => {
                write!(f, "Identity token is missing field: {field}")
            }
            TokenFault::SecretMismatch => write!(f, "Shared secret is incorrect"),
        }
    }
}

/// Outcome for a structurally acceptable token.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub message: String,
    /// Claimed username, echoed back without being checked against the
    /// stored record - the validator trusts the id, not the name. Known
    /// looseness, kept deliberately.
    pub identity: String,
    pub user_id: String,
    pub server_verified: bool,
}

/// Classification of a submitted token.
#[derive(Debug)]
pub enum Verdict {
    /// Structure and secret check out; `valid` reflects the user binding
    Checked(ValidationReport),
    /// Structural or secret failure
    Rejected(TokenFault),
}

/// A required field counts as present only when it carries a truthy value:
/// null, `""`, `false` and `0` are all treated as missing.
fn field_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64() != Some(0.0),
        _ => true,
    }
}

/// Echo a claimed field back to the caller. Non-string values are rendered
/// as their JSON text so the report always carries what was submitted.
fn echo_field(value: &Value) -> String {
    match value.as_str() {
        Some(s) => s.to_string(),
        None => value.to_string(),
    }
}

/// Validate an untrusted identity-token document against the store.
///
/// The error branch is reserved for store failures; every token-shaped
/// problem comes back as a [`Verdict`].
pub async fn validate_token(raw: &str, store: &dyn UserStore) -> Result<Verdict> {
    let doc: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => return Ok(Verdict::Rejected(TokenFault::Malformed(e.to_string()))),
    };

    for field in REQUIRED_FIELDS {
        let present = doc.get(field).map(field_present).unwrap_or(false);
        if !present {
            return Ok(Verdict::Rejected(TokenFault::Incomplete(field)));
        }
    }

    let submitted_key = doc
        .get("shared_secret")
        .and_then(|s| s.get("key"))
        .and_then(Value::as_str);
    if submitted_key != Some(SHARED_SECRET_KEY) {
        return Ok(Verdict::Rejected(TokenFault::SecretMismatch));
    }

    let identity = echo_field(&doc["identity"]);
    let user_id = echo_field(&doc["user_id"]);

    // The id is the trust anchor: a token is valid iff a user with that id
    // exists, regardless of the claimed identity string.
    let known = store.find_by_id(&user_id).await?.is_some();

    let message = if known {
        "Identity token is valid and confirmed".to_string()
    } else {
        "Identity token is not registered with this server".to_string()
    };

    Ok(Verdict::Checked(ValidationReport {
        valid: known,
        message,
        identity,
        user_id,
        server_verified: known,
    }))
}
