//! API request handlers
//!
//! Handlers for all REST API endpoints.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{ConfigStore, Configuration};
use crate::core::{self, RunContext};
use crate::error::TransporterError;
use crate::store::{WorkbookId, XlsxStore};
use crate::types::RunOutcome;

use super::server::AppState;

/// Standard API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            request_id: Uuid::new_v4().to_string(),
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            request_id: Uuid::new_v4().to_string(),
            data: None,
            error: Some(message.into()),
        }
    }
}

type Reply<T> = (StatusCode, Json<ApiResponse<T>>);

fn ok<T: Serialize>(data: T) -> Reply<T> {
    (StatusCode::OK, Json(ApiResponse::ok(data)))
}

fn fail<T: Serialize>(status: StatusCode, message: impl Into<String>) -> Reply<T> {
    (status, Json(ApiResponse::err(message)))
}

/// Status for a lookup error: unknown workbooks/sheets are 404s
fn lookup_status(err: &TransporterError) -> StatusCode {
    match err {
        TransporterError::SourceNotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Run `f` on the blocking pool with the store locked
async fn with_store<T, F>(state: &Arc<AppState>, f: F) -> Result<T, String>
where
    F: FnOnce(&mut XlsxStore, &ConfigStore) -> T + Send + 'static,
    T: Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || {
        let mut store = state
            .store
            .lock()
            .map_err(|_| "store lock poisoned".to_string())?;
        Ok(f(&mut *store, &state.configs))
    })
    .await
    .map_err(|e| e.to_string())?
}

/// Root endpoint response
#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub name: String,
    pub version: String,
    pub description: String,
    pub endpoints: Vec<EndpointInfo>,
}

#[derive(Debug, Serialize)]
pub struct EndpointInfo {
    pub path: String,
    pub method: String,
    pub description: String,
}

impl EndpointInfo {
    fn new(path: &str, method: &str, description: &str) -> Self {
        Self {
            path: path.to_string(),
            method: method.to_string(),
            description: description.to_string(),
        }
    }
}

/// GET / - Root info
pub async fn root(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(ApiResponse::ok(RootResponse {
        name: "Transporter API Server".to_string(),
        version: state.version.clone(),
        description: "HTTP API for spreadsheet migrations and archives".to_string(),
        endpoints: vec![
            EndpointInfo::new("/health", "GET", "Health check endpoint"),
            EndpointInfo::new("/version", "GET", "Get server version"),
            EndpointInfo::new("/api/v1/run", "POST", "Execute a configuration"),
            EndpointInfo::new("/api/v1/validate", "POST", "Validate a configuration"),
            EndpointInfo::new("/api/v1/sheets", "POST", "List the sheets of a workbook"),
            EndpointInfo::new("/api/v1/columns", "POST", "List the header labels of a sheet"),
        ],
    }))
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_message: String,
}

/// GET /health - Health check
pub async fn health() -> impl IntoResponse {
    Json(ApiResponse::ok(HealthResponse {
        status: "healthy".to_string(),
        uptime_message: "Server is running".to_string(),
    }))
}

/// Version response
#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub version: String,
    pub features: Vec<String>,
}

/// GET /version - Server version
pub async fn version(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(ApiResponse::ok(VersionResponse {
        version: state.version.clone(),
        features: ["run", "validate", "sheets", "columns"]
            .iter()
            .map(|f| f.to_string())
            .collect(),
    }))
}

/// Run request: an inline configuration or the id of a saved one
#[derive(Debug, Deserialize)]
pub struct RunRequest {
    #[serde(default)]
    pub config: Option<serde_json::Value>,
    #[serde(default)]
    pub config_id: Option<String>,
    /// Workbook bound to the `current` destination
    #[serde(default)]
    pub active_workbook: Option<String>,
}

/// POST /api/v1/run - Execute a configuration
pub async fn run(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RunRequest>,
) -> Reply<RunOutcome> {
    let config = match (req.config, req.config_id) {
        (Some(value), _) => match Configuration::from_value(value) {
            Ok(config) => config,
            Err(e) => return fail(StatusCode::BAD_REQUEST, e.to_string()),
        },
        (None, Some(id)) => match state.configs.get(&id) {
            Ok(Some(saved)) => saved.config,
            Ok(None) => {
                return fail(
                    StatusCode::NOT_FOUND,
                    format!("No saved configuration with id '{}'", id),
                )
            }
            Err(e) => return fail(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        },
        (None, None) => {
            return fail(
                StatusCode::BAD_REQUEST,
                "Request needs either 'config' or 'config_id'",
            )
        }
    };

    let mut ctx = RunContext::new();
    if let Some(active) = req.active_workbook.filter(|a| !a.trim().is_empty()) {
        ctx = ctx.with_active_workbook(WorkbookId::new(core::extract_file_id(&active)));
    }

    let result = with_store(&state, move |store, configs| {
        core::run_execution(store, &config, &ctx, Some(configs))
    })
    .await;

    match result {
        Ok(outcome) => ok(outcome),
        Err(e) => fail(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

/// Validate request
#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub config: serde_json::Value,
}

/// Validate response
#[derive(Debug, Serialize, Default)]
pub struct ValidateResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    pub message: String,
}

/// POST /api/v1/validate - Validate a configuration
pub async fn validate(Json(req): Json<ValidateRequest>) -> Reply<ValidateResponse> {
    match Configuration::from_value(req.config) {
        Ok(config) => ok(ValidateResponse {
            valid: true,
            mode: Some(config.mode().to_string()),
            message: "Validation successful".to_string(),
        }),
        Err(e) => ok(ValidateResponse {
            valid: false,
            mode: None,
            message: e.to_string(),
        }),
    }
}

/// Sheets request
#[derive(Debug, Deserialize)]
pub struct SheetsRequest {
    /// Workbook id or URL
    pub workbook: String,
}

#[derive(Debug, Serialize, Default)]
pub struct SheetsResponse {
    pub workbook: String,
    pub sheets: Vec<String>,
}

/// POST /api/v1/sheets - List sheets
pub async fn sheets(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SheetsRequest>,
) -> Reply<SheetsResponse> {
    let workbook = req.workbook.clone();
    let result = with_store(&state, move |store, _| core::sheet_names(store, &workbook)).await;

    match result {
        Ok(Ok(sheets)) => ok(SheetsResponse {
            workbook: req.workbook,
            sheets,
        }),
        Ok(Err(e)) => fail(lookup_status(&e), e.to_string()),
        Err(e) => fail(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

/// Columns request
#[derive(Debug, Deserialize)]
pub struct ColumnsRequest {
    pub workbook: String,
    pub sheet: String,
    #[serde(default = "default_header_row")]
    pub header_row: u32,
}

fn default_header_row() -> u32 {
    1
}

#[derive(Debug, Serialize, Default)]
pub struct ColumnsResponse {
    pub sheet: String,
    pub columns: Vec<String>,
}

/// POST /api/v1/columns - List header labels
pub async fn columns(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ColumnsRequest>,
) -> Reply<ColumnsResponse> {
    let (workbook, sheet, header_row) = (req.workbook, req.sheet.clone(), req.header_row);
    let result = with_store(&state, move |store, _| {
        core::sheet_columns(store, &workbook, &sheet, header_row)
    })
    .await;

    match result {
        Ok(Ok(columns)) => ok(ColumnsResponse {
            sheet: req.sheet,
            columns,
        }),
        Ok(Err(e)) => fail(lookup_status(&e), e.to_string()),
        Err(e) => fail(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}
