//! Ilperata Bridge - identity-token issuance and validation server
//!
//! The bridge issues a per-user identity token (a human-readable JSON
//! document embedding a fixed shared-secret challenge/response pair) after
//! username/password registration or login, and exposes a validation
//! endpoint that checks a submitted token's structure, secret, and
//! server-side user binding.
//!
//! ## Services
//!
//! - **Token codec**: deterministic construction and parsing of the token document
//! - **Auth service**: registration and login flows, JWT session credentials
//! - **Validator**: classification of untrusted token documents
//! - **User store**: MongoDB-backed persistence with an in-memory dev-mode fallback

pub mod auth;
pub mod config;
pub mod db;
pub mod routes;
pub mod server;
pub mod token;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{BridgeError, Result};
