//! Bring-your-own-database endpoints
//!
//! `/database/connect` swaps the active user database; `/database/preview`
//! and `/database/query` run SQL against it verbatim; `/database/import`
//! loads JSON or CSV records into a table; `/test_db` pings it.

use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::executor::{Record, DEFAULT_IMPORT_TABLE};
use crate::http::error::ApiError;
use crate::http::extractors::JsonBody;
use crate::http::server::AppState;
use crate::models::{require, ValidationError};

/// POST /database/connect body
#[derive(Debug, Deserialize)]
pub struct ConnectRequest {
    #[serde(default)]
    pub dsn: String,
    #[serde(default)]
    pub driver: String,
    /// Accepted for compatibility; the DSN carries the port.
    #[serde(default)]
    pub port: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct ConnectResponse {
    pub success: bool,
    pub message: String,
}

/// GET /database/preview body
#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    #[serde(default)]
    pub table_name: String,
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub success: bool,
    pub message: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// POST /database/query body
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub sql_query: String,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub result: Vec<Map<String, Value>>,
}

/// POST /database/import body. Exactly one of `data` (array of objects) or
/// `csv` (text with a header row) must be given.
#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    #[serde(default)]
    pub table_name: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub csv: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub success: bool,
    pub message: String,
    pub table_name: String,
    pub rows_inserted: u64,
}

#[derive(Debug, Serialize)]
pub struct PingResponse {
    pub message: String,
}

impl ImportRequest {
    fn table_name(&self) -> &str {
        self.table_name
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_IMPORT_TABLE)
    }

    /// Decode the payload into records with at least one field.
    fn records(&self) -> Result<Vec<Record>, ValidationError> {
        let records = match (&self.data, &self.csv) {
            (Some(_), Some(_)) => {
                return Err(ValidationError::InvalidFormat {
                    field: "data",
                    reason: "give either data or csv, not both",
                })
            }
            (None, None) => return Err(ValidationError::Empty { field: "data" }),
            (Some(data), None) => json_records(data)?,
            (None, Some(csv)) => csv_records(csv)?,
        };

        match records.first() {
            None => Err(ValidationError::Empty { field: "data" }),
            Some(first) if first.is_empty() => Err(ValidationError::InvalidFormat {
                field: "data",
                reason: "records must have at least one field",
            }),
            Some(_) => Ok(records),
        }
    }
}

fn json_records(data: &Value) -> Result<Vec<Record>, ValidationError> {
    let invalid = ValidationError::InvalidFormat {
        field: "data",
        reason: "must be an array of objects",
    };
    let Value::Array(items) = data else {
        return Err(invalid);
    };
    items
        .iter()
        .map(|item| item.as_object().cloned().ok_or_else(|| invalid.clone()))
        .collect()
}

fn csv_records(csv: &str) -> Result<Vec<Record>, ValidationError> {
    let rows = querybridge_core::import_csv(csv.as_bytes())
        .map_err(|e| ValidationError::Malformed { reason: e.to_string() })?;
    Ok(rows
        .into_iter()
        .map(|row| row.into_iter().map(|(k, v)| (k, Value::String(v))).collect())
        .collect())
}

/// POST /database/connect - open a caller-specified database and make it active
async fn connect(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<ConnectRequest>,
) -> Result<Json<ConnectResponse>, ApiError> {
    require("dsn", &req.dsn)?;
    require("driver", &req.driver)?;
    if let Some(port) = &req.port {
        tracing::debug!(%port, "ignoring port; the DSN determines the address");
    }

    let driver = state.connection.connect(&req.dsn, &req.driver).await?;
    tracing::info!(%driver, "active user database replaced");

    Ok(Json(ConnectResponse {
        success: true,
        message: "Successfully connected to the database".to_string(),
    }))
}

/// GET /database/preview - first rows of a table
async fn preview(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<PreviewRequest>,
) -> Result<Json<PreviewResponse>, ApiError> {
    ensure_raw_sql_allowed(&state)?;
    require("table_name", &req.table_name)?;

    let result = state.connection.preview(&req.table_name).await?;

    Ok(Json(PreviewResponse {
        success: true,
        message: "Successfully retrieved preview data".to_string(),
        columns: result.columns,
        rows: result.rows,
    }))
}

/// POST /database/query - run arbitrary SQL on the active database
async fn query(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    ensure_raw_sql_allowed(&state)?;
    require("sql_query", &req.sql_query)?;

    let result = state.connection.execute(&req.sql_query).await?;

    Ok(Json(QueryResponse {
        result: result.into_records(),
    }))
}

/// POST /database/import - create the table if needed and insert every record
async fn import(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<ImportRequest>,
) -> Result<Json<ImportResponse>, ApiError> {
    ensure_raw_sql_allowed(&state)?;
    let records = req.records()?;

    let summary = state
        .connection
        .import_records(req.table_name(), &records)
        .await?;

    Ok(Json(ImportResponse {
        success: true,
        message: "Records inserted into the database successfully".to_string(),
        table_name: summary.table_name,
        rows_inserted: summary.rows_inserted,
    }))
}

/// GET /test_db - confirm the active database answers
async fn test_db(State(state): State<Arc<AppState>>) -> Result<Json<PingResponse>, ApiError> {
    state.connection.ping().await?;
    Ok(Json(PingResponse {
        message: "Connection is successful".to_string(),
    }))
}

fn ensure_raw_sql_allowed(state: &AppState) -> Result<(), ApiError> {
    if state.allow_raw_sql {
        return Ok(());
    }
    Err(ApiError::Forbidden {
        reason: "raw SQL execution is disabled on this server".to_string(),
    })
}

/// Database routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/database/connect", post(connect))
        .route("/database/preview", get(preview))
        .route("/database/query", post(query))
        .route("/database/import", post(import))
        .route("/test_db", get(test_db))
}
