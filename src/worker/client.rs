//! # Worker Client
//!
//! Host-side loopback HTTP client for the sidecar worker. Applies its own
//! request timeout, distinct from the worker's internal execution
//! deadline; any transport failure maps to `BackendUnavailable`, never to
//! a code fault. Optionally starts the worker binary on first need.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Mutex;

use crate::config::WorkerConfig;
use crate::engine::context::ExecutionContext;
use crate::engine::dispatcher::ExecutionOutcome;
use crate::engine::envelope::ResponseEnvelope;
use crate::observability::Logger;

use super::{WorkerRequest, ERROR_TYPE_TIMEOUT, ERROR_TYPE_UNAVAILABLE};

const PROBE_TIMEOUT: Duration = Duration::from_millis(500);
const STARTUP_PROBES: u32 = 50;
const STARTUP_PROBE_INTERVAL: Duration = Duration::from_millis(100);

/// Client half of the sidecar protocol
pub struct WorkerClient {
    config: WorkerConfig,
    execution_timeout_ms: u64,
    config_path: Option<PathBuf>,
    client: reqwest::Client,
    spawn_attempted: Mutex<bool>,
    logger: Logger,
}

impl WorkerClient {
    /// Build a client. `config_path` is forwarded to an auto-started
    /// worker so both processes read the same configuration.
    pub fn new(
        config: WorkerConfig,
        execution_timeout_ms: u64,
        config_path: Option<PathBuf>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            config,
            execution_timeout_ms,
            config_path,
            client,
            spawn_attempted: Mutex::new(false),
            logger: Logger::new("worker-client"),
        }
    }

    /// Execute a snippet on the worker, landing in a terminal outcome.
    pub async fn execute(&self, code: &str, context: &ExecutionContext) -> ExecutionOutcome {
        let request = WorkerRequest {
            code: code.to_string(),
            context: context.to_protocol_value(),
            timeout_ms: Some(self.execution_timeout_ms),
        };

        match self.post(&request).await {
            Ok(envelope) => classify_envelope(envelope),
            Err(first_error) => {
                if self.config.autostart && self.ensure_started().await {
                    match self.post(&request).await {
                        Ok(envelope) => classify_envelope(envelope),
                        Err(retry_error) => {
                            self.logger
                                .error("WORKER_UNREACHABLE", &[("error", &retry_error)]);
                            ExecutionOutcome::BackendUnavailable
                        }
                    }
                } else {
                    self.logger
                        .error("WORKER_UNREACHABLE", &[("error", &first_error)]);
                    ExecutionOutcome::BackendUnavailable
                }
            }
        }
    }

    async fn post(&self, request: &WorkerRequest) -> Result<Value, String> {
        let response = self
            .client
            .post(self.config.base_url())
            .json(request)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("worker answered status {}", response.status()));
        }
        response.json::<Value>().await.map_err(|e| e.to_string())
    }

    /// Liveness probe via the protocol's OPTIONS preflight
    async fn probe(&self) -> bool {
        self.client
            .request(reqwest::Method::OPTIONS, self.config.base_url())
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .map(|response| response.status().is_success())
            .unwrap_or(false)
    }

    /// Spawn the worker binary once per host process, then wait for it to
    /// answer the probe.
    async fn ensure_started(&self) -> bool {
        {
            let mut attempted = self.spawn_attempted.lock().await;
            if !*attempted {
                *attempted = true;
                if !self.spawn_worker() {
                    return false;
                }
            }
        }

        for _ in 0..STARTUP_PROBES {
            if self.probe().await {
                return true;
            }
            tokio::time::sleep(STARTUP_PROBE_INTERVAL).await;
        }
        false
    }

    fn spawn_worker(&self) -> bool {
        let binary = self.worker_binary();
        let mut command = Command::new(&binary);
        if let Some(path) = &self.config_path {
            command.arg("--config").arg(path);
        }
        match command.spawn() {
            Ok(child) => {
                self.logger.info(
                    "WORKER_SPAWNED",
                    &[
                        ("binary", &binary.display().to_string()),
                        ("pid", &child.id().to_string()),
                    ],
                );
                true
            }
            Err(e) => {
                self.logger.error(
                    "WORKER_SPAWN_FAILED",
                    &[
                        ("binary", &binary.display().to_string()),
                        ("error", &e.to_string()),
                    ],
                );
                false
            }
        }
    }

    /// Configured binary, the host binary's sibling, or PATH lookup
    fn worker_binary(&self) -> PathBuf {
        if let Some(binary) = &self.config.binary {
            return PathBuf::from(binary);
        }
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let sibling = dir.join("nimbus-worker");
                if sibling.exists() {
                    return sibling;
                }
            }
        }
        PathBuf::from("nimbus-worker")
    }
}

/// Map a worker envelope to a terminal outcome. The worker reserves the
/// `error_type` field for faults; envelopes without it are completions.
fn classify_envelope(envelope: Value) -> ExecutionOutcome {
    match envelope.get("error_type").and_then(Value::as_str) {
        Some(ERROR_TYPE_TIMEOUT) => ExecutionOutcome::TimedOut,
        Some(ERROR_TYPE_UNAVAILABLE) => ExecutionOutcome::BackendUnavailable,
        Some(error_type) => ExecutionOutcome::Faulted {
            message: envelope
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("code fault")
                .to_string(),
            error_type: error_type.to_string(),
        },
        None => ExecutionOutcome::Completed(ResponseEnvelope::from_state(&envelope)),
    }
}
