//! # Response Envelope
//!
//! The uniform JSON result shape returned to API callers. The envelope is
//! the single source of truth for a call's domain-level outcome; HTTP
//! status carries routing failures only.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Uniform JSON result for every call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// Authoritative outcome signal
    pub success: bool,

    /// Payload produced by the code, null when absent
    #[serde(default)]
    pub data: Value,

    /// Human-readable outcome message
    #[serde(default)]
    pub message: String,

    /// Error detail, present on faults
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Coarse fault classification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,

    /// Name of the middleware that produced the terminal result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub middleware: Option<String>,
}

impl ResponseEnvelope {
    /// The scaffold submitted function code mutates: explicit failure until
    /// the code says otherwise.
    pub fn function_scaffold() -> Value {
        json!({
            "success": false,
            "data": null,
            "message": "",
            "error": null,
        })
    }

    /// The scaffold middleware code mutates. Pass-by-default: only a
    /// deliberate `success = false` rejects, so an untouched scaffold (no
    /// explicit flag) reads as a pass.
    pub fn middleware_scaffold() -> Value {
        json!({
            "success": true,
            "data": null,
            "message": "",
            "error": null,
        })
    }

    /// Lenient read of a code-produced response state. Non-object values
    /// (code reassigned `response` to something unusable) become a failure
    /// envelope rather than a fault.
    pub fn from_state(state: &Value) -> Self {
        match state {
            Value::Object(map) => Self {
                success: map.get("success").and_then(Value::as_bool).unwrap_or(false),
                data: map.get("data").cloned().unwrap_or(Value::Null),
                message: map
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string(),
                error: map
                    .get("error")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                error_type: map
                    .get("error_type")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                middleware: None,
            },
            _ => Self {
                success: false,
                data: Value::Null,
                message: "code did not produce a response object".to_string(),
                error: None,
                error_type: None,
                middleware: None,
            },
        }
    }

    /// A code fault, already sanitized by the runtime boundary
    pub fn fault(message: &str, error_type: &str) -> Self {
        Self {
            success: false,
            data: Value::Null,
            message: message.to_string(),
            error: Some(message.to_string()),
            error_type: Some(error_type.to_string()),
            middleware: None,
        }
    }

    /// Wall-clock budget exhausted
    pub fn timed_out() -> Self {
        Self {
            success: false,
            data: Value::Null,
            message: "execution time exceeded".to_string(),
            error: None,
            error_type: None,
            middleware: None,
        }
    }

    /// Sidecar unreachable or its driver uninstallable
    pub fn backend_unavailable() -> Self {
        Self {
            success: false,
            data: Value::Null,
            message: "execution backend unavailable".to_string(),
            error: None,
            error_type: None,
            middleware: None,
        }
    }

    /// Annotate with the middleware that produced this terminal result
    pub fn with_middleware(mut self, name: &str) -> Self {
        self.middleware = Some(name.to_string());
        self
    }

    /// The envelope as a JSON value
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| {
            json!({"success": false, "data": null, "message": "serialization failure"})
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_scaffold_shape() {
        let scaffold = ResponseEnvelope::function_scaffold();
        assert_eq!(scaffold["success"], json!(false));
        assert_eq!(scaffold["data"], Value::Null);
        assert_eq!(scaffold["message"], json!(""));
        assert_eq!(scaffold["error"], Value::Null);
    }

    #[test]
    fn test_middleware_scaffold_passes_by_default() {
        let env = ResponseEnvelope::from_state(&ResponseEnvelope::middleware_scaffold());
        assert!(env.success);
    }

    #[test]
    fn test_from_state_reads_code_fields() {
        let state = json!({"success": true, "data": {"msg": "hi"}, "message": "ok"});
        let env = ResponseEnvelope::from_state(&state);
        assert!(env.success);
        assert_eq!(env.data, json!({"msg": "hi"}));
        assert_eq!(env.message, "ok");
        assert!(env.error.is_none());
    }

    #[test]
    fn test_from_state_non_object_is_failure() {
        let env = ResponseEnvelope::from_state(&json!(42));
        assert!(!env.success);
        assert!(!env.message.is_empty());
    }

    #[test]
    fn test_optional_fields_omitted_when_absent() {
        let env = ResponseEnvelope::from_state(&json!({"success": true}));
        let serialized = env.to_value();
        let object = serialized.as_object().unwrap();
        assert!(!object.contains_key("error"));
        assert!(!object.contains_key("error_type"));
        assert!(!object.contains_key("middleware"));
    }

    #[test]
    fn test_middleware_annotation_serialized() {
        let env = ResponseEnvelope::from_state(&json!({"success": false, "message": "missing key"}))
            .with_middleware("require-key");
        assert_eq!(env.to_value()["middleware"], json!("require-key"));
    }

    #[test]
    fn test_canonical_messages() {
        assert_eq!(ResponseEnvelope::timed_out().message, "execution time exceeded");
        assert_eq!(
            ResponseEnvelope::backend_unavailable().message,
            "execution backend unavailable"
        );
    }
}
