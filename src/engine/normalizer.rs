//! # Response Normalizer
//!
//! The single table mapping every outcome class to an HTTP status and a
//! JSON envelope. Transport status codes are reserved for routing and
//! contract violations; every business outcome, faults in submitted code
//! included, is a 200 with a structured envelope, so thin clients never
//! special-case HTTP failures for expected code-level failures.

use serde_json::{json, Value};

use super::dispatcher::ExecutionOutcome;
use super::envelope::ResponseEnvelope;
use super::errors::RoutingError;

/// Status + body, ready for the transport layer
#[derive(Debug, Clone)]
pub struct NormalizedResponse {
    pub status: u16,
    pub body: Value,
}

/// Routing failures: the only path to a non-200 status
pub fn routing_error(error: &RoutingError) -> NormalizedResponse {
    NormalizedResponse {
        status: error.status_code(),
        body: json!({
            "success": false,
            "message": error.public_message(),
        }),
    }
}

/// Every terminal execution outcome lands at 200 with its envelope
pub fn from_outcome(outcome: ExecutionOutcome) -> NormalizedResponse {
    NormalizedResponse {
        status: 200,
        body: outcome.into_envelope().to_value(),
    }
}

/// A middleware veto: a domain result, not a transport failure
pub fn middleware_rejection(envelope: ResponseEnvelope) -> NormalizedResponse {
    NormalizedResponse {
        status: 200,
        body: envelope.to_value(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definitions::HttpMethod;

    #[test]
    fn test_routing_statuses() {
        assert_eq!(routing_error(&RoutingError::NameRequired).status, 400);
        assert_eq!(routing_error(&RoutingError::NotFound).status, 404);
        assert_eq!(
            routing_error(&RoutingError::MethodNotAllowed(HttpMethod::Put)).status,
            405
        );
    }

    #[test]
    fn test_routing_body_shape() {
        let response = routing_error(&RoutingError::NotFound);
        assert_eq!(response.body["success"], json!(false));
        assert!(response.body["message"].is_string());
    }

    #[test]
    fn test_completed_failure_still_200() {
        let envelope = ResponseEnvelope::from_state(&json!({
            "success": false, "message": "not enough credit",
        }));
        let response = from_outcome(ExecutionOutcome::Completed(envelope));
        assert_eq!(response.status, 200);
        assert_eq!(response.body["success"], json!(false));
    }

    #[test]
    fn test_fault_is_200_with_classification() {
        let response = from_outcome(ExecutionOutcome::Faulted {
            message: "boom".into(),
            error_type: "runtime_error".into(),
        });
        assert_eq!(response.status, 200);
        assert_eq!(response.body["error_type"], json!("runtime_error"));
    }

    #[test]
    fn test_timeout_and_unavailable_messages() {
        let timeout = from_outcome(ExecutionOutcome::TimedOut);
        assert_eq!(timeout.status, 200);
        assert_eq!(timeout.body["message"], json!("execution time exceeded"));

        let unavailable = from_outcome(ExecutionOutcome::BackendUnavailable);
        assert_eq!(unavailable.status, 200);
        assert_eq!(
            unavailable.body["message"],
            json!("execution backend unavailable")
        );
    }

    #[test]
    fn test_rejection_carries_middleware_name() {
        let envelope = ResponseEnvelope::from_state(&json!({
            "success": false, "message": "missing key",
        }))
        .with_middleware("require-key");
        let response = middleware_rejection(envelope);
        assert_eq!(response.status, 200);
        assert_eq!(response.body["middleware"], json!("require-key"));
    }
}
