//! # HTTP Server Module
//!
//! The host-facing axum server: health probe plus the cloud-functions
//! execution endpoint. Worker protocol routes live under `worker`; this
//! server is the one operators and API clients talk to.

pub mod execute_routes;
pub mod health_routes;
pub mod server;

pub use execute_routes::{execute_routes, ExecuteState};
pub use server::HttpServer;
