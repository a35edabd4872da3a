//! Cloud Functions HTTP Routes
//!
//! `<METHOD> /cloud-functions/execute?function=<name>`. The method must
//! match the resolved function's configured method; the name may also
//! arrive as a JSON body field or a trailing path segment, checked in
//! that priority order.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::{Json, Router};
use serde_json::Value;

use crate::engine::{Engine, InboundCall, NormalizedResponse};

/// State shared across execution handlers
pub struct ExecuteState {
    pub engine: Engine,
}

/// Build the execution routes (nested under /cloud-functions)
pub fn execute_routes(state: Arc<ExecuteState>) -> Router {
    Router::new()
        .route("/execute", any(execute_handler))
        .route("/execute/{name}", any(execute_with_path_handler))
        .with_state(state)
}

async fn execute_handler(
    State(state): State<Arc<ExecuteState>>,
    method: Method,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    run(state, method, query, headers, None, body).await
}

async fn execute_with_path_handler(
    State(state): State<Arc<ExecuteState>>,
    method: Method,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Path(name): Path<String>,
    body: String,
) -> Response {
    run(state, method, query, headers, Some(name), body).await
}

async fn run(
    state: Arc<ExecuteState>,
    method: Method,
    query: HashMap<String, String>,
    headers: HeaderMap,
    path_name: Option<String>,
    body: String,
) -> Response {
    let name = function_name(&query, &body, path_name);
    let headers: Vec<(String, String)> = headers
        .iter()
        .map(|(key, value)| {
            (
                key.as_str().to_string(),
                value.to_str().unwrap_or("").to_string(),
            )
        })
        .collect();

    let call = InboundCall {
        name,
        method: method.as_str().to_string(),
        headers,
        body: if body.is_empty() { None } else { Some(body) },
    };

    into_response(state.engine.handle(call).await)
}

/// Name source priority: query parameter, body field, path segment
fn function_name(
    query: &HashMap<String, String>,
    body: &str,
    path_name: Option<String>,
) -> Option<String> {
    if let Some(name) = query.get("function") {
        if !name.is_empty() {
            return Some(name.clone());
        }
    }
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        if let Some(Value::String(name)) = map.get("function") {
            if !name.is_empty() {
                return Some(name.clone());
            }
        }
    }
    path_name.filter(|name| !name.is_empty())
}

fn into_response(normalized: NormalizedResponse) -> Response {
    let status =
        StatusCode::from_u16(normalized.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(normalized.body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_parameter_wins() {
        let mut query = HashMap::new();
        query.insert("function".to_string(), "from-query".to_string());
        let body = json!({"function": "from-body"}).to_string();

        let name = function_name(&query, &body, Some("from-path".to_string()));
        assert_eq!(name.as_deref(), Some("from-query"));
    }

    #[test]
    fn test_body_field_beats_path() {
        let body = json!({"function": "from-body"}).to_string();
        let name = function_name(&HashMap::new(), &body, Some("from-path".to_string()));
        assert_eq!(name.as_deref(), Some("from-body"));
    }

    #[test]
    fn test_path_segment_is_last_resort() {
        let name = function_name(&HashMap::new(), "", Some("from-path".to_string()));
        assert_eq!(name.as_deref(), Some("from-path"));
    }

    #[test]
    fn test_no_source_yields_none() {
        assert!(function_name(&HashMap::new(), "", None).is_none());
        assert!(function_name(&HashMap::new(), "not json", None).is_none());
    }
}
