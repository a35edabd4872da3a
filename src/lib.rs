//! nimbus - A self-hostable cloud-functions engine
//!
//! Operator-authored functions and middlewares live in a database, bound to
//! HTTP endpoints. The engine resolves each call, runs the optional
//! middleware guard, dispatches the function to the right execution backend,
//! and normalizes every outcome into a uniform JSON envelope.

pub mod cli;
pub mod config;
pub mod db;
pub mod definitions;
pub mod engine;
pub mod http_server;
pub mod observability;
pub mod runtime;
pub mod worker;
