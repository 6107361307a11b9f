//! API integration tests
//!
//! Requests go through the full router with `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use royalbit_transporter::api::{build_router, ApiConfig, AppState};
use royalbit_transporter::store::{TabularStore, XlsxStore};
use royalbit_transporter::types::text_row;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

// ═══════════════════════════════════════════════════════════════════════════
// FIXTURES
// ═══════════════════════════════════════════════════════════════════════════

/// Drive with a "Sales" workbook; returns the drive, its router and the workbook id
fn app() -> (TempDir, Router, String) {
    let dir = TempDir::new().unwrap();
    let mut store = XlsxStore::open(dir.path()).unwrap();
    let wb = store.create_workbook("Sales").unwrap();
    let sheet = store.first_sheet(&wb).unwrap().unwrap();
    store.rename_sheet(&sheet, "Orders").unwrap();
    store
        .write_range(
            &sheet,
            1,
            1,
            &[
                text_row(&["Id", "Customer", "Total"]),
                text_row(&["1", "Ada", "10"]),
                text_row(&["2", "Grace", "20"]),
            ],
        )
        .unwrap();
    store.flush().unwrap();

    let config = ApiConfig {
        drive: dir.path().to_path_buf(),
        ..ApiConfig::default()
    };
    let state = Arc::new(AppState::open(&config).unwrap());
    (dir, build_router(state), wb.to_string())
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    read(response).await
}

async fn post(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    read(response).await
}

async fn read(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

// ═══════════════════════════════════════════════════════════════════════════
// INFO ENDPOINTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_root_lists_endpoints() {
    let (_dir, app, _) = app();
    let (status, body) = get(app, "/").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["name"], "Transporter API Server");
    assert_eq!(body["data"]["endpoints"].as_array().unwrap().len(), 6);
    assert_eq!(body["request_id"].as_str().unwrap().len(), 36);
}

#[tokio::test]
async fn test_health_and_version() {
    let (_dir, app, _) = app();
    let (status, body) = get(app.clone(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "healthy");

    let (_, body) = get(app, "/version").await;
    assert_eq!(body["data"]["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["data"]["features"], json!(["run", "validate", "sheets", "columns"]));
}

#[tokio::test]
async fn test_unknown_route() {
    let (_dir, app, _) = app();
    let response = app
        .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ═══════════════════════════════════════════════════════════════════════════
// RUN
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_run_inline_transfer() {
    let (_dir, app, wb) = app();
    let (status, body) = post(
        app,
        "/api/v1/run",
        json!({
            "config": {
                "mode": "transfer",
                "destination": "new",
                "includeHeaders": true,
                "sources": [{ "sourceLocator": wb, "sheetName": "Orders" }]
            }
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "success");
    assert_eq!(body["data"]["message"], "Migration complete. Rows written: 2");
}

#[tokio::test]
async fn test_run_failure_is_reported_in_outcome() {
    let (_dir, app, _) = app();
    let (status, body) = post(
        app,
        "/api/v1/run",
        json!({ "config": { "mode": "archive", "sourceLocator": "missing" } }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "error");
    assert!(body["data"]["message"]
        .as_str()
        .unwrap()
        .contains("could not be opened"));
}

#[tokio::test]
async fn test_run_current_destination_with_active_workbook() {
    let (_dir, app, wb) = app();
    let (_, body) = post(
        app.clone(),
        "/api/v1/run",
        json!({
            "config": {
                "mode": "transfer",
                "destination": "current",
                "destinationSheetName": "Copy",
                "sources": [{ "sourceLocator": wb, "sheetName": "Orders" }]
            },
            "active_workbook": wb
        }),
    )
    .await;
    assert_eq!(body["data"]["status"], "success", "{}", body);

    let (_, body) = post(app, "/api/v1/sheets", json!({ "workbook": wb })).await;
    assert_eq!(body["data"]["sheets"], json!(["Orders", "Copy"]));
}

#[tokio::test]
async fn test_run_rejects_bad_requests() {
    let (_dir, app, _) = app();

    let (status, body) = post(app.clone(), "/api/v1/run", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body.get("data").is_none());

    let (status, _) = post(
        app.clone(),
        "/api/v1/run",
        json!({ "config": { "mode": "transfer", "destination": "new", "sources": [] } }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = post(app, "/api/v1/run", json!({ "config_id": "cfg_missing" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("cfg_missing"));
}

// ═══════════════════════════════════════════════════════════════════════════
// VALIDATE
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_validate() {
    let (_dir, app, _) = app();
    let (status, body) = post(
        app.clone(),
        "/api/v1/validate",
        json!({ "config": { "mode": "archive", "sourceLocator": "abc" } }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["valid"], true);
    assert_eq!(body["data"]["mode"], "archive");

    let (status, body) = post(
        app,
        "/api/v1/validate",
        json!({ "config": { "mode": "archive", "sourceLocator": "" } }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["valid"], false);
    assert!(body["data"].get("mode").is_none());
}

// ═══════════════════════════════════════════════════════════════════════════
// SHEETS AND COLUMNS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_sheets() {
    let (_dir, app, wb) = app();
    let (status, body) = post(app.clone(), "/api/v1/sheets", json!({ "workbook": wb })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["sheets"], json!(["Orders"]));

    let (status, _) = post(app, "/api/v1/sheets", json!({ "workbook": "unknown" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_columns() {
    let (_dir, app, wb) = app();
    let (status, body) = post(
        app.clone(),
        "/api/v1/columns",
        json!({ "workbook": wb, "sheet": "Orders" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["columns"], json!(["Id", "Customer", "Total"]));

    let (status, body) = post(
        app,
        "/api/v1/columns",
        json!({ "workbook": wb, "sheet": "Nope" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("\"Nope\""));
}
