//! # Observability Module
//!
//! Structured logging for the engine, the HTTP server, and the sidecar
//! worker. One log line = one event, JSON, synchronous.

pub mod logger;

pub use logger::{LogLevel, Logger};
