//! # Engine Errors
//!
//! RoutingError is the only class permitted to surface a non-200 status.
//! Everything user code can cause is recovered at the dispatcher boundary
//! and normalized into an envelope instead.

use thiserror::Error;

use crate::definitions::HttpMethod;

/// Routing failures: bad or missing name, wrong verb, unknown function.
///
/// A disabled function is deliberately indistinguishable from an absent
/// one: same status, same message.
#[derive(Debug, Clone, Error)]
pub enum RoutingError {
    #[error("function name is required")]
    NameRequired,

    #[error("cloud function not found")]
    NotFound,

    #[error("method not allowed, expected {0}")]
    MethodNotAllowed(HttpMethod),

    #[error("internal error")]
    Internal(String),
}

impl RoutingError {
    /// HTTP status for this routing failure
    pub fn status_code(&self) -> u16 {
        match self {
            RoutingError::NameRequired => 400,
            RoutingError::NotFound => 404,
            RoutingError::MethodNotAllowed(_) => 405,
            RoutingError::Internal(_) => 500,
        }
    }

    /// Caller-facing message. Internal detail never leaks here.
    pub fn public_message(&self) -> String {
        match self {
            RoutingError::Internal(_) => "internal error".to_string(),
            other => other.to_string(),
        }
    }
}
