//! # Runtime Module
//!
//! The embedded (in-process) execution backend. The sidecar backend lives
//! under `worker`.

pub mod embedded;

pub use embedded::EmbeddedRuntime;
