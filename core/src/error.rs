//! Error types for the dispatch client.
//!
//! # Design
//! `Error` covers misuse caught while configuring or building a request.
//! Runtime failures of a sent request (non-2xx status, transport failure,
//! unrecognised body shape) are never returned as `Err`: the router reports
//! them to the `onerror` handler and summarises them in an `Outcome`.
//! `TransportError` is the one error a `Transport` implementation produces.

use thiserror::Error;

use crate::handler::HandlerKind;

/// Errors returned while configuring a client or building a request.
#[derive(Debug, Error)]
pub enum Error {
    /// A handler was registered under a name that expects another kind.
    #[error("handler `{name}` must be a {expected} handler, got {actual}")]
    HandlerMismatch {
        name: String,
        expected: HandlerKind,
        actual: HandlerKind,
    },

    /// A status code was mapped to a name reserved for a lifecycle handler.
    #[error("`{0}` is reserved and cannot name a status code")]
    ReservedStatus(String),

    /// The method text is not one of the supported REST verbs.
    #[error("unsupported HTTP method `{0}`")]
    UnsupportedMethod(String),

    /// A JSON configuration document had the wrong shape.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The payload could not be serialized.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// `send` was called on a request built without a transport.
    #[error("request has no transport; use `prepare` and execute it yourself")]
    NoTransport,

    /// An async request's worker went away before reporting completion.
    #[error("request completion was lost")]
    CompletionLost,
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Failure reported by a `Transport` when no HTTP response was obtained.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transport error: {message}")]
pub struct TransportError {
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<ureq::Error> for TransportError {
    fn from(e: ureq::Error) -> Self {
        Self::new(e.to_string())
    }
}
