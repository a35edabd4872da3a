//! # HTTP Server
//!
//! Main server combining the health probe and the cloud-functions
//! execution endpoint, with CORS configured from the config file.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::HttpConfig;
use crate::engine::Engine;
use crate::observability::Logger;

use super::execute_routes::{execute_routes, ExecuteState};
use super::health_routes::health_routes;

/// The host-facing HTTP server
pub struct HttpServer {
    config: HttpConfig,
    router: Router,
}

impl HttpServer {
    /// Build a server around a wired engine
    pub fn new(engine: Engine, config: HttpConfig) -> Self {
        let router = Self::build_router(engine, &config);
        Self { config, router }
    }

    fn build_router(engine: Engine, config: &HttpConfig) -> Router {
        let state = Arc::new(ExecuteState { engine });

        // No configured origins means permissive (development); configured
        // origins are enforced as a list.
        let cors = if config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = config
                .cors_origins
                .iter()
                .filter_map(|origin| origin.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        Router::new()
            .merge(health_routes())
            .nest("/cloud-functions", execute_routes(state))
            .layer(cors)
    }

    /// The socket address string this server binds
    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// The router (for tests driving it directly)
    pub fn router(self) -> Router {
        self.router
    }

    /// Bind and serve until the process is stopped
    pub async fn start(self) -> Result<(), std::io::Error> {
        let addr: SocketAddr = self.config.socket_addr().parse().map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid listen address '{}'", self.config.socket_addr()),
            )
        })?;

        let logger = Logger::new("http");
        logger.info("SERVER_LISTENING", &[("addr", &addr.to_string())]);

        let listener = TcpListener::bind(addr).await?;
        axum::serve(listener, self.router).await
    }
}
