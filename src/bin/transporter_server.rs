//! Transporter API Server binary
//!
//! HTTP REST API for running migrations and archives against a drive.

use clap::Parser;
use royalbit_transporter::api::{run_api_server, ApiConfig};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "transporter-server")]
#[command(version)]
#[command(author = "RoyalBit Inc. <admin@royalbit.ca>")]
#[command(about = "Transporter API Server - HTTP REST API for spreadsheet migrations and archives")]
#[command(long_about = r#"
Transporter API Server - HTTP REST API

Endpoints:
  - POST /api/v1/run       - Execute an inline or saved configuration
  - POST /api/v1/validate  - Validate a configuration
  - POST /api/v1/sheets    - List the sheets of a workbook
  - POST /api/v1/columns   - List the header labels of a sheet

Additional endpoints:
  - GET  /health           - Health check
  - GET  /version          - Server version info
  - GET  /                 - API documentation

Features:
  - CORS enabled for cross-origin requests
  - Graceful shutdown on SIGINT/SIGTERM
  - JSON response format with request IDs
  - Tracing and structured logging (RUST_LOG)

Example usage:
  transporter-server --drive ./drive
  transporter-server --host 0.0.0.0 --port 3000

  curl -X POST http://localhost:8080/api/v1/sheets \
    -H "Content-Type: application/json" \
    -d '{"workbook": "3f2a9c0d..."}'
"#)]
struct Args {
    /// Host address to bind to (use 0.0.0.0 for all interfaces)
    #[arg(short = 'H', long, default_value = "127.0.0.1", env = "TRANSPORTER_HOST")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "8080", env = "TRANSPORTER_PORT")]
    port: u16,

    /// Directory acting as the drive
    #[arg(long, default_value = ".", env = "TRANSPORTER_DRIVE")]
    drive: PathBuf,

    /// Saved configurations file (default: <drive>/configs.json)
    #[arg(long, env = "TRANSPORTER_CONFIGS")]
    configs: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "royalbit_transporter=info,transporter=info,tower_http=info".into()),
        )
        .init();

    let args = Args::parse();

    let config = ApiConfig {
        host: args.host,
        port: args.port,
        drive: args.drive,
        configs: args.configs,
    };

    run_api_server(config).await
}
