//! # Middleware Runner
//!
//! Runs the resolved guard before the function, with short-circuit
//! semantics: a deliberate `success = false` vetoes the call, a fault in
//! guard code becomes a CodeFault envelope, and in both cases the
//! function never runs. A pass carries the guard's emitted state forward
//! as the function's starting response scaffold.

use serde_json::Value;
use uuid::Uuid;

use crate::definitions::MiddlewareDefinition;
use crate::observability::Logger;

use super::context::ExecutionContext;
use super::dispatcher::{Dispatcher, ExecutionOutcome};
use super::envelope::ResponseEnvelope;

/// What the guard decided for this call
#[derive(Debug)]
pub enum MiddlewareDecision {
    /// Guard passed; its final response state merges forward
    Pass(Value),

    /// Guard vetoed the call; envelope already annotated with its name
    Reject(ResponseEnvelope),

    /// Guard faulted, timed out, or lost its backend; the outcome is the
    /// call's terminal result and the function is skipped
    Abort(ExecutionOutcome),
}

/// Orchestrates the optional pre-execution pass
pub struct MiddlewareRunner {
    logger: Logger,
}

impl Default for MiddlewareRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl MiddlewareRunner {
    pub fn new() -> Self {
        Self {
            logger: Logger::new("middleware"),
        }
    }

    /// Run the guard against the same request/method/headers/db bindings
    /// but an independent response scaffold.
    pub async fn run(
        &self,
        dispatcher: &Dispatcher,
        middleware: &MiddlewareDefinition,
        context: &ExecutionContext,
    ) -> MiddlewareDecision {
        let guard_context = context.for_middleware();
        let outcome = dispatcher
            .dispatch(
                Uuid::new_v4(),
                middleware.language,
                &middleware.code,
                &guard_context,
            )
            .await;

        match outcome {
            ExecutionOutcome::Completed(envelope) => {
                if envelope.success {
                    MiddlewareDecision::Pass(envelope.to_value())
                } else {
                    self.logger.info(
                        "MIDDLEWARE_REJECTED",
                        &[("middleware", &middleware.name)],
                    );
                    MiddlewareDecision::Reject(envelope.with_middleware(&middleware.name))
                }
            }
            other => {
                self.logger.warn(
                    "MIDDLEWARE_ABORTED",
                    &[
                        ("middleware", &middleware.name),
                        ("state", other.state().as_str()),
                    ],
                );
                MiddlewareDecision::Abort(other)
            }
        }
    }
}

/// The function's starting scaffold after a pass: data and message carry
/// over from the guard, the success flag resets so the function must set
/// its own.
pub fn merged_scaffold(guard_state: &Value) -> Value {
    let mut scaffold = ResponseEnvelope::function_scaffold();
    if let (Value::Object(target), Value::Object(source)) = (&mut scaffold, guard_state) {
        if let Some(data) = source.get("data") {
            if !data.is_null() {
                target.insert("data".to_string(), data.clone());
            }
        }
        if let Some(Value::String(message)) = source.get("message") {
            if !message.is_empty() {
                target.insert("message".to_string(), Value::String(message.clone()));
            }
        }
    }
    scaffold
}
