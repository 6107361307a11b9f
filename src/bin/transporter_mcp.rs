//! Transporter MCP Server binary
//!
//! Model Context Protocol server for AI agent integration.
//! Run with: `transporter-mcp` (drive from `TRANSPORTER_DRIVE`, default `.`)
//!
//! Logs go to stderr; stdout carries the protocol.

use royalbit_transporter::mcp::{run_mcp_server_sync, TransporterMcpServer};
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "royalbit_transporter=info,transporter=info".into()),
        )
        .init();

    let drive = std::env::var_os("TRANSPORTER_DRIVE")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let configs = std::env::var_os("TRANSPORTER_CONFIGS").map(PathBuf::from);

    match TransporterMcpServer::open(&drive, configs) {
        Ok(mut server) => {
            run_mcp_server_sync(&mut server);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("cannot open drive {}: {}", drive.display(), e);
            ExitCode::FAILURE
        }
    }
}
