//! # Execution Engine
//!
//! The core pipeline: inbound call → resolver → context builder →
//! middleware runner → language dispatcher → response normalizer. Every
//! call ends in exactly one normalized response; no failure class escapes
//! past this module.

pub mod context;
pub mod dispatcher;
pub mod envelope;
pub mod errors;
pub mod middleware;
pub mod normalizer;
pub mod resolver;
pub mod sanitize;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::config::AppConfig;
use crate::db::Database;
use crate::definitions::DefinitionStore;
use crate::observability::Logger;
use crate::runtime::EmbeddedRuntime;
use crate::worker::WorkerClient;

pub use context::ExecutionContext;
pub use dispatcher::{Dispatcher, ExecutionOutcome, ExecutionState};
pub use envelope::ResponseEnvelope;
pub use errors::RoutingError;
pub use middleware::{MiddlewareDecision, MiddlewareRunner};
pub use normalizer::NormalizedResponse;
pub use resolver::{ResolvedCall, Resolver};

/// One inbound call, reduced to the parts the engine needs
#[derive(Debug, Clone)]
pub struct InboundCall {
    /// Function name, already extracted by the transport layer in its
    /// priority order (query parameter, body field, path segment)
    pub name: Option<String>,
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

/// The execution engine
pub struct Engine {
    resolver: Resolver,
    dispatcher: Dispatcher,
    middleware_runner: MiddlewareRunner,
    db: Database,
    logger: Logger,
}

impl Engine {
    /// Wire an engine from parts
    pub fn new(
        store: Arc<dyn DefinitionStore>,
        db: Database,
        embedded: EmbeddedRuntime,
        worker: WorkerClient,
    ) -> Self {
        Self {
            resolver: Resolver::new(store),
            dispatcher: Dispatcher::new(embedded, worker),
            middleware_runner: MiddlewareRunner::new(),
            db,
            logger: Logger::new("engine"),
        }
    }

    /// Wire an engine from configuration. One execution budget feeds both
    /// runtimes; `config_path` lets an auto-started worker read the same
    /// file.
    pub fn from_config(
        config: &AppConfig,
        store: Arc<dyn DefinitionStore>,
        db: Database,
        config_path: Option<PathBuf>,
    ) -> Self {
        let budget = Duration::from_millis(config.engine.execution_timeout_ms);
        let embedded = EmbeddedRuntime::new(budget);
        let worker = WorkerClient::new(
            config.worker.clone(),
            config.engine.execution_timeout_ms,
            config_path,
        );
        Self::new(store, db, embedded, worker)
    }

    /// Handle one call to a normalized response
    pub async fn handle(&self, call: InboundCall) -> NormalizedResponse {
        let call_id = Uuid::new_v4();

        let resolved = match self.resolver.resolve(call.name.as_deref(), &call.method).await {
            Ok(resolved) => resolved,
            Err(error) => {
                self.logger.info(
                    "CALL_REJECTED",
                    &[
                        ("call_id", &call_id.to_string()),
                        ("status", &error.status_code().to_string()),
                    ],
                );
                return normalizer::routing_error(&error);
            }
        };

        self.logger.info(
            "CALL_RESOLVED",
            &[
                ("call_id", &call_id.to_string()),
                ("function", &resolved.function.name),
                ("language", resolved.function.language.as_str()),
            ],
        );

        let mut context = ExecutionContext::build(
            &call.method,
            &call.headers,
            call.body.as_deref(),
            self.db.clone(),
        );

        // Middleware strictly precedes the function; the function never
        // starts unless the guard completed with a pass.
        if let Some(guard) = &resolved.middleware {
            match self
                .middleware_runner
                .run(&self.dispatcher, guard, &context)
                .await
            {
                MiddlewareDecision::Pass(state) => {
                    context = context.with_response(middleware::merged_scaffold(&state));
                }
                MiddlewareDecision::Reject(envelope) => {
                    return normalizer::middleware_rejection(envelope);
                }
                MiddlewareDecision::Abort(outcome) => {
                    return normalizer::from_outcome(outcome);
                }
            }
        }

        let outcome = self
            .dispatcher
            .dispatch(
                call_id,
                resolved.function.language,
                &resolved.function.code,
                &context,
            )
            .await;
        normalizer::from_outcome(outcome)
    }
}
