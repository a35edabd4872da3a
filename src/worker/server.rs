//! # Worker HTTP Server
//!
//! Loopback-only protocol surface:
//! - `POST /` executes a snippet and always answers 200 with an envelope
//!   for code-level outcomes
//! - `OPTIONS /` answers 200 empty (preflight, and the client's liveness
//!   probe)
//! - any other verb gets 405; 400 is reserved for malformed request JSON
//!
//! The database pool is initialized lazily on the first execution request,
//! from the same configuration file the host reads.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{OnceCell, Semaphore};

use crate::config::AppConfig;
use crate::db::Database;
use crate::observability::Logger;

use super::pid::PidFile;
use super::{runtime, WorkerRequest};

/// Worker startup errors
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Invalid worker address '{0}'")]
    Address(String),

    #[error("Worker I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Config(#[from] crate::config::ConfigError),
}

/// State shared across worker request handlers
pub struct WorkerState {
    config: AppConfig,
    database: OnceCell<Database>,
    /// Bounds in-flight executions to the pool size, so inbound requests
    /// queue instead of piling up isolates
    executions: Semaphore,
    logger: Logger,
}

impl WorkerState {
    pub fn new(config: AppConfig) -> Self {
        let permits = config.worker.max_connections.max(1) as usize;
        Self {
            config,
            database: OnceCell::new(),
            executions: Semaphore::new(permits),
            logger: Logger::new("worker"),
        }
    }

    /// The worker's pool, connected on first need. Connect failures are
    /// reported per call so a backend that comes up later still works.
    async fn database(&self) -> Result<Database, crate::db::DbError> {
        self.database
            .get_or_try_init(|| async {
                self.logger.info(
                    "WORKER_DB_CONNECTING",
                    &[("backend", &self.config.database.backend)],
                );
                Database::connect(&self.config.database).await
            })
            .await
            .cloned()
    }

    /// The pool, if it was ever connected (shutdown path)
    fn connected_database(&self) -> Option<Database> {
        self.database.get().cloned()
    }
}

/// Build the worker protocol router
pub fn worker_router(state: Arc<WorkerState>) -> Router {
    Router::new()
        .route("/", post(execute_handler).options(preflight_handler))
        .with_state(state)
}

async fn execute_handler(
    State(state): State<Arc<WorkerState>>,
    body: String,
) -> (StatusCode, Json<Value>) {
    let request: WorkerRequest = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"success": false, "message": "malformed request body"})),
            )
        }
    };

    let db = match state.database().await {
        Ok(db) => db,
        Err(e) => {
            state
                .logger
                .error("WORKER_DB_UNAVAILABLE", &[("error", &e.to_string())]);
            return (StatusCode::OK, Json(runtime::unavailable_envelope()));
        }
    };

    let budget = Duration::from_millis(
        request
            .timeout_ms
            .unwrap_or(state.config.engine.execution_timeout_ms),
    );

    let _permit = state.executions.acquire().await;
    let envelope = runtime::execute(db, request.code, request.context, budget).await;
    (StatusCode::OK, Json(envelope))
}

async fn preflight_handler() -> StatusCode {
    StatusCode::OK
}

/// The long-lived worker process
pub struct WorkerServer {
    config: AppConfig,
}

impl WorkerServer {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// Serve until interrupted, then release the DB handle and remove the
    /// process-identity record.
    pub async fn start(self) -> Result<(), WorkerError> {
        let logger = Logger::new("worker");
        let addr: SocketAddr = self
            .config
            .worker
            .socket_addr()
            .parse()
            .map_err(|_| WorkerError::Address(self.config.worker.socket_addr()))?;

        let pid_file = PidFile::write(&self.config.worker.pid_file, self.config.worker.port)?;
        let state = Arc::new(WorkerState::new(self.config.clone()));
        let router = worker_router(Arc::clone(&state));

        let listener = TcpListener::bind(addr).await?;
        logger.info(
            "WORKER_LISTENING",
            &[("addr", &addr.to_string()), ("pid_file", &pid_file.path().display().to_string())],
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        if let Some(db) = state.connected_database() {
            db.close().await;
        }
        pid_file.remove();
        logger.info("WORKER_STOPPED", &[]);
        Ok(())
    }
}

async fn shutdown_signal() {
    let interrupt = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => {}
        _ = terminate => {}
    }
}
