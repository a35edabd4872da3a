//! # Sidecar Worker Module
//!
//! The secondary execution backend: a persistent out-of-process service
//! reachable over loopback HTTP, executing JavaScript with its own
//! database pool. The host side lives in [`client`]; everything else runs
//! inside the `nimbus-worker` binary.

pub mod client;
pub mod ops;
pub mod pid;
pub mod runtime;
pub mod server;

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::AppConfig;

pub use client::WorkerClient;
pub use server::{WorkerError, WorkerServer};

/// Worker process entrypoint: load the shared config, build the runtime,
/// serve until interrupted.
pub fn run(config_path: impl AsRef<Path>) -> Result<(), WorkerError> {
    let config = AppConfig::load_or_default(config_path)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(WorkerServer::new(config).start())
}

/// Wire request the client POSTs to the worker.
///
/// `context` carries `{request, method, headers, response}`; `timeout_ms`
/// threads the engine's execution budget into the worker's own deadline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRequest {
    pub code: String,
    pub context: Value,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// error_type marker the worker uses for a deadline expiry
pub const ERROR_TYPE_TIMEOUT: &str = "timeout";

/// error_type marker for a worker whose database backend never came up
pub const ERROR_TYPE_UNAVAILABLE: &str = "backend_unavailable";
