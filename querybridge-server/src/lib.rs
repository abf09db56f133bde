//! querybridge-server: entity CRUD plus bring-your-own-database queries
//!
//! - `db`: application pool, schema and repositories for users,
//!   transactions and sessions
//! - `connector`: opens a caller-specified database as the active connection
//! - `executor`: runs SQL verbatim on a connection and returns loose rows,
//!   and imports JSON or CSV records into it
//! - `http`: axum routes over all of the above

pub mod connector;
pub mod db;
pub mod executor;
pub mod http;
pub mod models;

pub use connector::{ActiveConnection, ConnectionHandle, ConnectorError, DriverKind};
pub use db::repos::DbError;
pub use executor::{ImportSummary, QueryResult, PREVIEW_LIMIT};
pub use http::{build_router, run_server, AppState, ServerConfig, ServerError};
