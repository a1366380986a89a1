//! Identity-token protocol
//!
//! The token is a deliberately plaintext, human-readable JSON document that
//! proves a registered identity via a fixed shared-secret pair. The codec
//! builds and round-trips the document; the validator classifies untrusted
//! input against the store.

pub mod codec;
pub mod validator;

pub use codec::{ParseError, SharedSecret, Token, TokenMeta, SHARED_SECRET_KEY, SHARED_SECRET_RESPONSE};
pub use validator::{validate_token, TokenFault, ValidationReport, Verdict, REQUIRED_FIELDS};
