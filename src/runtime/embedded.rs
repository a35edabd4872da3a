//! # Embedded Runtime
//!
//! Executes Rhai snippets in-process with direct bindings into the
//! execution context: `request`, `method`, `headers`, a mutable `response`
//! map, and the `db_*` helpers over the shared pool.
//!
//! A fresh engine is built per call so nothing leaks across requests. The
//! wall-clock budget is armed through the engine's progress callback
//! before invocation; it interrupts between operations, not inside a
//! blocking one.

use std::time::{Duration, Instant};

use rhai::serde::{from_dynamic, to_dynamic};
use rhai::{Dynamic, Engine, EvalAltResult, Position, Scope};
use serde_json::Value;
use tokio::runtime::Handle;

use crate::db::Database;
use crate::engine::context::ExecutionContext;
use crate::engine::dispatcher::ExecutionOutcome;
use crate::engine::envelope::ResponseEnvelope;
use crate::engine::sanitize::sanitize_error;

/// In-process Rhai execution backend
#[derive(Debug, Clone)]
pub struct EmbeddedRuntime {
    budget: Duration,
}

impl EmbeddedRuntime {
    /// Create a runtime with the given wall-clock execution budget
    pub fn new(budget: Duration) -> Self {
        Self { budget }
    }

    /// Run one snippet to a terminal outcome. Never returns an error:
    /// parse and runtime faults are caught here and classified.
    pub async fn execute(&self, code: &str, context: &ExecutionContext) -> ExecutionOutcome {
        let code = code.to_string();
        let budget = self.budget;
        let request = Value::Object(context.request.clone());
        let method = context.method.clone();
        let headers = serde_json::to_value(&context.headers).unwrap_or(Value::Null);
        let response = context.response.clone();
        let db = context.db.clone();
        let handle = Handle::current();

        let joined = tokio::task::spawn_blocking(move || {
            run_snippet(&code, budget, request, method, headers, response, db, handle)
        })
        .await;

        match joined {
            Ok(outcome) => outcome,
            Err(_) => ExecutionOutcome::Faulted {
                message: "execution thread failure".to_string(),
                error_type: "runtime_error".to_string(),
            },
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run_snippet(
    code: &str,
    budget: Duration,
    request: Value,
    method: String,
    headers: Value,
    response: Value,
    db: Database,
    handle: Handle,
) -> ExecutionOutcome {
    let mut engine = Engine::new();

    let started = Instant::now();
    engine.on_progress(move |_| {
        if started.elapsed() > budget {
            Some(Dynamic::from("execution time exceeded"))
        } else {
            None
        }
    });

    register_db_helpers(&mut engine, db, handle);

    let ast = match engine.compile(code) {
        Ok(ast) => ast,
        Err(parse_error) => {
            return ExecutionOutcome::Faulted {
                message: sanitize_error(&parse_error.to_string()),
                error_type: "syntax_error".to_string(),
            }
        }
    };

    let mut scope = Scope::new();
    let bindings = [
        ("request", &request),
        ("headers", &headers),
        ("response", &response),
    ];
    for (name, value) in bindings {
        match to_dynamic(value) {
            Ok(dynamic) => {
                scope.push_dynamic(name, dynamic);
            }
            Err(e) => {
                return ExecutionOutcome::Faulted {
                    message: sanitize_error(&e.to_string()),
                    error_type: "runtime_error".to_string(),
                }
            }
        }
    }
    scope.push("method", method);

    if let Err(error) = engine.run_ast_with_scope(&mut scope, &ast) {
        if let EvalAltResult::ErrorTerminated(..) = *error {
            return ExecutionOutcome::TimedOut;
        }
        return ExecutionOutcome::Faulted {
            message: sanitize_error(&error.to_string()),
            error_type: "runtime_error".to_string(),
        };
    }

    let state = match scope.get("response") {
        Some(dynamic) => from_dynamic::<Value>(dynamic).unwrap_or(Value::Null),
        None => Value::Null,
    };
    ExecutionOutcome::Completed(ResponseEnvelope::from_state(&state))
}

/// Expose the three DB primitives to scripts, each with and without a
/// params array. Blocking bridges into the async pool ride the runtime
/// handle; this runs on a blocking thread, never on the executor.
fn register_db_helpers(engine: &mut Engine, db: Database, handle: Handle) {
    {
        let db = db.clone();
        let handle = handle.clone();
        engine.register_fn(
            "db_query_many",
            move |sql: &str, params: rhai::Array| -> Result<Dynamic, Box<EvalAltResult>> {
                let params = array_to_json(params)?;
                let rows = handle
                    .block_on(db.query_many(sql, &params))
                    .map_err(runtime_error)?;
                to_dynamic(&rows)
            },
        );
    }
    {
        let db = db.clone();
        let handle = handle.clone();
        engine.register_fn(
            "db_query_many",
            move |sql: &str| -> Result<Dynamic, Box<EvalAltResult>> {
                let rows = handle
                    .block_on(db.query_many(sql, &[]))
                    .map_err(runtime_error)?;
                to_dynamic(&rows)
            },
        );
    }
    {
        let db = db.clone();
        let handle = handle.clone();
        engine.register_fn(
            "db_query_one",
            move |sql: &str, params: rhai::Array| -> Result<Dynamic, Box<EvalAltResult>> {
                let params = array_to_json(params)?;
                let row = handle
                    .block_on(db.query_one(sql, &params))
                    .map_err(runtime_error)?;
                to_dynamic(&row.unwrap_or(Value::Null))
            },
        );
    }
    {
        let db = db.clone();
        let handle = handle.clone();
        engine.register_fn(
            "db_query_one",
            move |sql: &str| -> Result<Dynamic, Box<EvalAltResult>> {
                let row = handle
                    .block_on(db.query_one(sql, &[]))
                    .map_err(runtime_error)?;
                to_dynamic(&row.unwrap_or(Value::Null))
            },
        );
    }
    {
        let db = db.clone();
        let handle = handle.clone();
        engine.register_fn(
            "db_execute",
            move |sql: &str, params: rhai::Array| -> Result<Dynamic, Box<EvalAltResult>> {
                let params = array_to_json(params)?;
                let result = handle
                    .block_on(db.execute(sql, &params))
                    .map_err(runtime_error)?;
                to_dynamic(&result)
            },
        );
    }
    {
        engine.register_fn(
            "db_execute",
            move |sql: &str| -> Result<Dynamic, Box<EvalAltResult>> {
                let result = handle
                    .block_on(db.execute(sql, &[]))
                    .map_err(runtime_error)?;
                to_dynamic(&result)
            },
        );
    }
}

fn array_to_json(params: rhai::Array) -> Result<Vec<Value>, Box<EvalAltResult>> {
    params.iter().map(from_dynamic::<Value>).collect()
}

fn runtime_error(e: crate::db::DbError) -> Box<EvalAltResult> {
    Box::new(EvalAltResult::ErrorRuntime(
        Dynamic::from(e.to_string()),
        Position::NONE,
    ))
}
