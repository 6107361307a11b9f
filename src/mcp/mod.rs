//! Transporter MCP Server
//!
//! Model Context Protocol server that lets AI agents run migrations and
//! archives against a drive.
//!
//! ## Tools
//! - `transporter_run` - Execute an inline, file-based or saved configuration
//! - `transporter_validate` - Validate a configuration without running it
//! - `transporter_list_sheets` - List the sheets of a workbook
//! - `transporter_columns` - List the header labels of a sheet
//!
//! ## Usage
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "transporter": {
//!       "command": "transporter-mcp",
//!       "env": { "TRANSPORTER_DRIVE": "/path/to/drive" }
//!     }
//!   }
//! }
//! ```

pub mod server;

pub use server::run_mcp_server_sync;
pub use server::TransporterMcpServer;
