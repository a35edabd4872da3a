//! # Execution Context
//!
//! The per-call bundle visible to submitted code: request body, method,
//! headers, the shared database handle, and the mutable response scaffold.
//! Built fresh for every inbound call, discarded after the response.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::db::Database;

use super::envelope::ResponseEnvelope;

/// Per-call execution context
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Parsed JSON request body; always empty for GET
    pub request: Map<String, Value>,

    /// Inbound HTTP method, uppercased
    pub method: String,

    /// Inbound headers, keys lowercased
    pub headers: HashMap<String, String>,

    /// Shared database handle; the same logical pool the host uses, never
    /// a fresh connection per call
    pub db: Database,

    /// Mutable response scaffold the code writes into
    pub response: Value,
}

impl ExecutionContext {
    /// Build a context from inbound request parts.
    ///
    /// Query parameters are never merged into `request`: a GET call always
    /// binds an empty map, and other methods bind only the parsed JSON
    /// body. An unparseable or non-object body binds empty as well.
    pub fn build(
        method: &str,
        headers: &[(String, String)],
        body: Option<&str>,
        db: Database,
    ) -> Self {
        let method = method.to_ascii_uppercase();

        let request = if method == "GET" {
            Map::new()
        } else {
            body.and_then(|text| serde_json::from_str::<Value>(text).ok())
                .and_then(|value| match value {
                    Value::Object(map) => Some(map),
                    _ => None,
                })
                .unwrap_or_default()
        };

        let headers = headers
            .iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value.clone()))
            .collect();

        Self {
            request,
            method,
            headers,
            db,
            response: ResponseEnvelope::function_scaffold(),
        }
    }

    /// Replace the response scaffold (middleware state merged forward)
    pub fn with_response(mut self, response: Value) -> Self {
        self.response = response;
        self
    }

    /// A context for the middleware pass: same request/method/headers/db
    /// bindings, independent pass-by-default scaffold.
    pub fn for_middleware(&self) -> Self {
        let mut guard = self.clone();
        guard.response = ResponseEnvelope::middleware_scaffold();
        guard
    }

    /// The context as the JSON shape the sidecar protocol carries
    pub fn to_protocol_value(&self) -> Value {
        serde_json::json!({
            "request": Value::Object(self.request.clone()),
            "method": self.method,
            "headers": self.headers,
            "response": self.response,
        })
    }
}
