//! Transporter API Server implementation
//!
//! HTTP REST API server using Axum. Runs execute against one shared
//! [`XlsxStore`]; store work happens on the blocking pool.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use super::handlers;
use crate::config::ConfigStore;
use crate::error::TransporterResult;
use crate::store::XlsxStore;

/// API Server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    /// Directory acting as the drive
    pub drive: PathBuf,
    /// Saved configurations file; `<drive>/configs.json` when absent
    pub configs: Option<PathBuf>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            drive: PathBuf::from("."),
            configs: None,
        }
    }
}

/// Shared application state
pub struct AppState {
    pub version: String,
    pub store: Mutex<XlsxStore>,
    pub configs: ConfigStore,
}

impl AppState {
    pub fn open(config: &ApiConfig) -> TransporterResult<Self> {
        let store = XlsxStore::open(&config.drive)?;
        let configs = config
            .configs
            .clone()
            .unwrap_or_else(|| store.root().join("configs.json"));
        Ok(Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            store: Mutex::new(store),
            configs: ConfigStore::new(configs),
        })
    }
}

/// Router with every endpoint, CORS and request tracing
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health and info endpoints
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/version", get(handlers::version))
        // Core API endpoints
        .route("/api/v1/run", post(handlers::run))
        .route("/api/v1/validate", post(handlers::validate))
        .route("/api/v1/sheets", post(handlers::sheets))
        .route("/api/v1/columns", post(handlers::columns))
        // State and middleware
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Run the API server
pub async fn run_api_server(config: ApiConfig) -> anyhow::Result<()> {
    let state = Arc::new(AppState::open(&config)?);
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("🚚 Transporter API Server starting on http://{}", addr);
    info!("   Drive: {}", config.drive.display());
    info!("   Endpoints: /api/v1/run, /api/v1/validate, /api/v1/sheets, /api/v1/columns");
    info!("   Health: /health, Version: /version");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Transporter API Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, stopping server...");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = ApiConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.drive, PathBuf::from("."));
        assert!(config.configs.is_none());
    }

    #[test]
    fn test_config_address_format() {
        let config = ApiConfig {
            host: "192.168.1.100".to_string(),
            port: 9090,
            ..ApiConfig::default()
        };
        let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse().unwrap();
        assert_eq!(addr.port(), 9090);
    }

    #[test]
    fn test_app_state_defaults_configs_into_drive() {
        let dir = TempDir::new().unwrap();
        let config = ApiConfig {
            drive: dir.path().to_path_buf(),
            ..ApiConfig::default()
        };
        let state = AppState::open(&config).unwrap();
        assert_eq!(state.version, env!("CARGO_PKG_VERSION"));
        assert!(state.configs.path().ends_with("configs.json"));
        assert!(state.configs.path().starts_with(dir.path().canonicalize().unwrap()));
    }
}
