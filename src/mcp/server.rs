//! Transporter MCP Server implementation
//!
//! Implements the Model Context Protocol over stdin/stdout using JSON-RPC.
//! One server owns one drive for the lifetime of the process.

use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::{ConfigStore, Configuration};
use crate::core::{self, RunContext};
use crate::error::{TransporterError, TransporterResult};
use crate::store::{WorkbookId, XlsxStore};

/// JSON-RPC request
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    #[allow(dead_code)]
    jsonrpc: String,
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Value,
}

/// JSON-RPC response
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    jsonrpc: String,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    fn result(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    fn error(id: Value, code: i32, message: String) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message,
                data: None,
            }),
        }
    }
}

/// JSON-RPC error
#[derive(Debug, Serialize)]
struct JsonRpcError {
    code: i32,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

/// MCP Tool definition
#[derive(Debug, Serialize)]
struct Tool {
    name: String,
    description: String,
    #[serde(rename = "inputSchema")]
    input_schema: Value,
}

fn text_result(text: impl Into<String>, is_error: bool) -> Value {
    json!({
        "content": [{
            "type": "text",
            "text": text.into()
        }],
        "isError": is_error
    })
}

fn str_arg<'a>(arguments: &'a Value, key: &str) -> Option<&'a str> {
    arguments.get(key).and_then(|v| v.as_str())
}

/// MCP server bound to a drive
#[derive(Debug)]
pub struct TransporterMcpServer {
    store: XlsxStore,
    configs: ConfigStore,
}

impl TransporterMcpServer {
    pub fn open(drive: &Path, configs: Option<PathBuf>) -> TransporterResult<Self> {
        let store = XlsxStore::open(drive)?;
        let configs = configs.unwrap_or_else(|| store.root().join("configs.json"));
        Ok(Self {
            store,
            configs: ConfigStore::new(configs),
        })
    }

    /// Handle a JSON-RPC request; notifications get no response
    pub fn handle_request(&mut self, request: &JsonRpcRequest) -> Option<JsonRpcResponse> {
        let id = request.id.clone().unwrap_or(Value::Null);
        debug!(method = %request.method, "mcp request");

        match request.method.as_str() {
            "initialize" => Some(JsonRpcResponse::result(
                id,
                json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": {
                        "tools": {
                            "listChanged": false
                        }
                    },
                    "serverInfo": {
                        "name": "transporter-mcp",
                        "version": env!("CARGO_PKG_VERSION")
                    },
                    "instructions": "Transporter MCP Server - migrate rows between spreadsheets and create filtered, compacted archive copies. Workbooks are .xlsx files on the server's drive, addressed by id."
                }),
            )),
            "notifications/initialized" => None,
            "tools/list" => Some(JsonRpcResponse::result(id, json!({ "tools": get_tools() }))),
            "tools/call" => {
                let tool_name = str_arg(&request.params, "name").unwrap_or("");
                let arguments = request
                    .params
                    .get("arguments")
                    .cloned()
                    .unwrap_or(json!({}));
                Some(JsonRpcResponse::result(id, self.call_tool(tool_name, &arguments)))
            }
            "ping" => Some(JsonRpcResponse::result(id, json!({}))),
            _ => Some(JsonRpcResponse::error(
                id,
                -32601,
                format!("Method not found: {}", request.method),
            )),
        }
    }

    /// Call a tool by name
    fn call_tool(&mut self, name: &str, arguments: &Value) -> Value {
        match name {
            "transporter_run" => match self.run(arguments) {
                Ok(outcome) => {
                    let text = serde_json::to_string_pretty(&outcome)
                        .unwrap_or_else(|_| outcome.message.clone());
                    text_result(text, !outcome.is_success())
                }
                Err(e) => text_result(format!("Run failed: {}", e), true),
            },
            "transporter_validate" => match load_config(arguments) {
                Ok(config) => text_result(
                    format!("Validation successful ({} configuration)", config.mode()),
                    false,
                ),
                Err(e) => text_result(format!("Validation failed: {}", e), true),
            },
            "transporter_list_sheets" => {
                let workbook = str_arg(arguments, "workbook").unwrap_or("");
                match core::sheet_names(&mut self.store, workbook) {
                    Ok(sheets) => text_result(sheets.join("\n"), false),
                    Err(e) => text_result(format!("Listing sheets failed: {}", e), true),
                }
            }
            "transporter_columns" => {
                let workbook = str_arg(arguments, "workbook").unwrap_or("");
                let sheet = str_arg(arguments, "sheet").unwrap_or("");
                let header_row = arguments
                    .get("header_row")
                    .and_then(|v| v.as_u64())
                    .map_or(1, |n| u32::try_from(n).unwrap_or(u32::MAX));
                match core::sheet_columns(&mut self.store, workbook, sheet, header_row) {
                    Ok(columns) => text_result(columns.join("\n"), false),
                    Err(e) => text_result(format!("Listing columns failed: {}", e), true),
                }
            }
            _ => text_result(format!("Unknown tool: {}", name), true),
        }
    }

    fn run(&mut self, arguments: &Value) -> TransporterResult<crate::types::RunOutcome> {
        let config = match str_arg(arguments, "config_id") {
            Some(id) => self
                .configs
                .get(id)?
                .map(|saved| saved.config)
                .ok_or_else(|| {
                    TransporterError::config(format!("No saved configuration with id '{}'", id))
                })?,
            None => load_config(arguments)?,
        };

        let mut ctx = RunContext::new();
        if let Some(active) = str_arg(arguments, "active_workbook").filter(|a| !a.trim().is_empty())
        {
            ctx = ctx.with_active_workbook(WorkbookId::new(core::extract_file_id(active)));
        }
        Ok(core::run_execution(&mut self.store, &config, &ctx, Some(&self.configs)))
    }
}

/// Configuration from an inline `config` object or a `config_path` file
fn load_config(arguments: &Value) -> TransporterResult<Configuration> {
    if let Some(value) = arguments.get("config").filter(|v| !v.is_null()) {
        return Configuration::from_value(value.clone());
    }
    match str_arg(arguments, "config_path") {
        Some(path) => Configuration::load(Path::new(path)),
        None => Err(TransporterError::config(
            "Tool needs either 'config' or 'config_path'",
        )),
    }
}

/// Get all available tools
fn get_tools() -> Vec<Tool> {
    let config_properties = json!({
        "config": {
            "type": "object",
            "description": "Inline configuration (mode: transfer or archive)"
        },
        "config_path": {
            "type": "string",
            "description": "Path to a YAML or JSON configuration file"
        }
    });

    let mut run_properties = config_properties.clone();
    if let Some(props) = run_properties.as_object_mut() {
        props.insert(
            "config_id".to_string(),
            json!({
                "type": "string",
                "description": "Id of a saved configuration"
            }),
        );
        props.insert(
            "active_workbook".to_string(),
            json!({
                "type": "string",
                "description": "Workbook id used for the 'current' destination"
            }),
        );
    }

    vec![
        Tool {
            name: "transporter_run".to_string(),
            description: "Execute a transfer (merge rows from source sheets into a destination sheet) or an archive (copy a workbook, keep sheets, filter rows, trim blank space). Returns the run outcome as JSON.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": run_properties
            }),
        },
        Tool {
            name: "transporter_validate".to_string(),
            description: "Validate a configuration against the schema and its semantic rules without running it.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": config_properties
            }),
        },
        Tool {
            name: "transporter_list_sheets".to_string(),
            description: "List the sheet names of a workbook, one per line.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "workbook": {
                        "type": "string",
                        "description": "Workbook id or URL"
                    }
                },
                "required": ["workbook"]
            }),
        },
        Tool {
            name: "transporter_columns".to_string(),
            description: "List the trimmed, non-empty header labels of a sheet, one per line.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "workbook": {
                        "type": "string",
                        "description": "Workbook id or URL"
                    },
                    "sheet": {
                        "type": "string",
                        "description": "Sheet name"
                    },
                    "header_row": {
                        "type": "integer",
                        "description": "1-based header row (default 1)"
                    }
                },
                "required": ["workbook", "sheet"]
            }),
        },
    ]
}

fn write_response<W: Write>(out: &mut W, response: &JsonRpcResponse) {
    match serde_json::to_string(response) {
        Ok(line) => {
            let _ = writeln!(out, "{}", line);
            let _ = out.flush();
        }
        Err(e) => warn!(error = %e, "failed to serialize response"),
    }
}

/// Run the MCP server synchronously over stdin/stdout
///
/// Reads until EOF; request handling is tested through `handle_request()`.
#[cfg(not(coverage))]
pub fn run_mcp_server_sync(server: &mut TransporterMcpServer) {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    let reader = BufReader::new(stdin.lock());

    for line in reader.lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };

        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<JsonRpcRequest>(&line) {
            Ok(request) => {
                if let Some(response) = server.handle_request(&request) {
                    write_response(&mut stdout, &response);
                }
            }
            Err(e) => write_response(
                &mut stdout,
                &JsonRpcResponse::error(Value::Null, -32700, format!("Parse error: {}", e)),
            ),
        }
    }
}

/// Stub for coverage builds
#[cfg(coverage)]
pub fn run_mcp_server_sync(_server: &mut TransporterMcpServer) {}
