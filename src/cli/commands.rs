//! CLI command implementations
//!
//! The serving loop owns the tokio runtime; main.rs stays synchronous and
//! free of subsystem knowledge.

use std::path::Path;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::Database;
use crate::definitions::SqlDefinitionStore;
use crate::engine::Engine;
use crate::http_server::HttpServer;
use crate::observability::Logger;

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};

/// Parse arguments and dispatch to a command
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    match cli.command {
        Command::Init { config } => init(&config),
        Command::Serve { config } => serve(&config),
    }
}

/// Write a default config file and bootstrap the definition schema
pub fn init(config_path: &Path) -> CliResult<()> {
    if config_path.exists() {
        return Err(CliError::AlreadyInitialized(
            config_path.display().to_string(),
        ));
    }

    let config = AppConfig::default();
    config.write(config_path)?;

    let runtime = build_runtime()?;
    runtime.block_on(async {
        let db = Database::connect(&config.database)
            .await
            .map_err(|e| CliError::Database(e.to_string()))?;
        SqlDefinitionStore::new(db)
            .ensure_schema()
            .await
            .map_err(|e| CliError::Store(e.to_string()))
    })?;

    Logger::new("cli").info(
        "INITIALIZED",
        &[("config", &config_path.display().to_string())],
    );
    Ok(())
}

/// Boot the engine and serve until stopped
pub fn serve(config_path: &Path) -> CliResult<()> {
    let config = AppConfig::load_or_default(config_path)?;

    let runtime = build_runtime()?;
    runtime.block_on(async {
        let db = Database::connect(&config.database)
            .await
            .map_err(|e| CliError::Database(e.to_string()))?;

        let store = SqlDefinitionStore::new(db.clone());
        store
            .ensure_schema()
            .await
            .map_err(|e| CliError::Store(e.to_string()))?;

        let engine = Engine::from_config(
            &config,
            Arc::new(store),
            db,
            Some(config_path.to_path_buf()),
        );

        HttpServer::new(engine, config.http.clone())
            .start()
            .await
            .map_err(|e| CliError::Server(e.to_string()))
    })
}

fn build_runtime() -> CliResult<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::Runtime(e.to_string()))
}
