//! HTTP Server
//!
//! axum router exposing the table operations to the browser client.

pub mod response;
pub mod routes;

use crate::config::{MoldstoreConfig, ServerConfig};
use crate::error::ApiError;
use crate::service::TableService;
use crate::store::{open_store, RemoteFileStore};
use crate::table::TableRegistry;
use crate::writer::{RetryPolicy, RetryingWriter};
use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub service: TableService,
}

/// The table API server
pub struct Server {
    config: ServerConfig,
    service: TableService,
}

impl Server {
    /// Create a server from full configuration, opening the configured store
    pub fn new(config: &MoldstoreConfig) -> Result<Self, ApiError> {
        config.validate()?;
        let store = open_store(&config.store)?;
        Ok(Self::with_store(
            config.server.clone(),
            store,
            config.retry.to_policy(),
        ))
    }

    /// Create a server over an explicit store with the built-in tables
    pub fn with_store(
        config: ServerConfig,
        store: Arc<dyn RemoteFileStore>,
        policy: RetryPolicy,
    ) -> Self {
        let writer = RetryingWriter::new(store, policy);
        let service = TableService::new(Arc::new(TableRegistry::builtin()), writer);
        Self::with_service(config, service)
    }

    pub fn with_service(config: ServerConfig, service: TableService) -> Self {
        Self { config, service }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn router(&self) -> Router {
        let state = AppState {
            service: self.service.clone(),
        };

        Router::new()
            .route("/api/health", get(routes::health))
            .route("/api/add-log", post(routes::add_log))
            .route("/api/add-comment", post(routes::add_comment))
            .route("/api/update-item", post(routes::update_item))
            .route("/api/delete-item", post(routes::delete_item))
            .route("/api/locationlog", post(routes::location_log))
            .route("/api/tables", get(routes::list_tables))
            .route("/api/tables/:endpoint", get(routes::read_table))
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(self.config.body_limit_bytes))
            .layer(self.cors_layer())
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    fn cors_layer(&self) -> CorsLayer {
        let cors = CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
            .max_age(Duration::from_secs(600));

        let origins = &self.config.cors_allowed_origins;
        if origins.is_empty() {
            return cors;
        }
        if origins.iter().any(|origin| origin == "*") {
            if origins.len() > 1 {
                tracing::warn!(origins = ?origins, "'*' combined with explicit origins; allowing any");
            }
            return cors.allow_origin(Any);
        }

        let allowed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::error!(origin = %origin, "Invalid CORS origin; skipping");
                    None
                }
            })
            .collect();
        if allowed.is_empty() {
            tracing::warn!("All configured CORS origins were invalid; disabling CORS");
            cors
        } else {
            cors.allow_origin(AllowOrigin::list(allowed))
        }
    }

    /// Bind and serve until Ctrl-C
    pub async fn serve(&self) -> Result<(), ApiError> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .map_err(|e| {
                ApiError::ConfigError(format!(
                    "invalid listen address {}:{}: {}",
                    self.config.host, self.config.port, e
                ))
            })?;

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ApiError::Internal(format!("failed to bind to {}: {}", addr, e)))?;

        tracing::info!(
            %addr,
            backend = self.service.writer().store().backend_tag(),
            "Starting moldstore server"
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ApiError::Internal(format!("server error: {}", e)))?;

        tracing::info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
