//! Generic query executor
//!
//! Runs caller-supplied SQL verbatim against a `ConnectionHandle` and returns
//! column names plus loosely-typed row values. There is no allow-list and no
//! parameterization; `preview` interpolates the table name as given.
//!
//! SQL goes out over each engine's simple-query path (`sqlx::raw_sql`, TDS
//! batches), so nothing is prepared and a `;`-separated script runs as one
//! request. The sqlx engines return rows from every statement in order; SQL
//! Server returns its first result set.

mod decode;
pub mod import;

use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::{Column, Executor, Row};
use tracing::{debug, warn};

use crate::connector::{ActiveConnection, ConnectionHandle, ConnectorError, DriverKind};

pub use import::{import_records, ImportSummary, Record, DEFAULT_IMPORT_TABLE};

/// Rows returned by `preview`
pub const PREVIEW_LIMIT: usize = 10;

/// Driver-agnostic result set
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryResult {
    /// One `{column: value}` object per row.
    pub fn into_records(self) -> Vec<Map<String, Value>> {
        let columns = self.columns;
        self.rows
            .into_iter()
            .map(|row| columns.iter().cloned().zip(row).collect())
            .collect()
    }
}

/// Build the preview statement for a table.
///
/// SQL Server has no LIMIT clause and gets `TOP` instead.
pub fn preview_sql(driver: DriverKind, table_name: &str) -> String {
    match driver {
        DriverKind::SqlServer => format!("SELECT TOP {PREVIEW_LIMIT} * FROM {table_name}"),
        _ => format!("SELECT * FROM {table_name} LIMIT {PREVIEW_LIMIT}"),
    }
}

/// Run `sql` against the given handle.
pub async fn execute(handle: &ConnectionHandle, sql: &str) -> Result<QueryResult, ConnectorError> {
    debug!(driver = %handle.driver(), sql, "executing query");

    let result = match handle {
        ConnectionHandle::Postgres(pool) => {
            let rows = sqlx::raw_sql(sql)
                .fetch_all(pool)
                .await
                .map_err(query_error)?;
            let columns = match rows.first() {
                Some(row) => column_names(row),
                None => match pool.describe(sql).await {
                    Ok(describe) => describe.columns().iter().map(|c| c.name().to_owned()).collect(),
                    Err(e) => {
                        debug!(error = %e, "describe failed, returning no columns");
                        Vec::new()
                    }
                },
            };
            QueryResult {
                columns,
                rows: rows.iter().map(decode::pg_row).collect(),
            }
        }
        ConnectionHandle::MySql(pool) => {
            let rows = sqlx::raw_sql(sql)
                .fetch_all(pool)
                .await
                .map_err(query_error)?;
            let columns = match rows.first() {
                Some(row) => column_names(row),
                None => match pool.describe(sql).await {
                    Ok(describe) => describe.columns().iter().map(|c| c.name().to_owned()).collect(),
                    Err(e) => {
                        debug!(error = %e, "describe failed, returning no columns");
                        Vec::new()
                    }
                },
            };
            QueryResult {
                columns,
                rows: rows.iter().map(decode::mysql_row).collect(),
            }
        }
        ConnectionHandle::Sqlite(pool) => {
            let rows = sqlx::raw_sql(sql)
                .fetch_all(pool)
                .await
                .map_err(query_error)?;
            let columns = match rows.first() {
                Some(row) => column_names(row),
                None => match pool.describe(sql).await {
                    Ok(describe) => describe.columns().iter().map(|c| c.name().to_owned()).collect(),
                    Err(e) => {
                        debug!(error = %e, "describe failed, returning no columns");
                        Vec::new()
                    }
                },
            };
            QueryResult {
                columns,
                rows: rows.iter().map(decode::sqlite_row).collect(),
            }
        }
        ConnectionHandle::SqlServer(client) => {
            let (columns, rows) = client
                .query(sql)
                .await
                .map_err(|e| ConnectorError::Query(e.to_string()))?;
            QueryResult {
                columns,
                rows: rows.into_iter().map(decode::mssql_row).collect(),
            }
        }
    };

    debug!(
        columns = result.columns.len(),
        rows = result.rows.len(),
        "query complete"
    );
    Ok(result)
}

/// First `PREVIEW_LIMIT` rows of `table_name`.
pub async fn preview(
    handle: &ConnectionHandle,
    table_name: &str,
) -> Result<QueryResult, ConnectorError> {
    execute(handle, &preview_sql(handle.driver(), table_name)).await
}

impl ActiveConnection {
    /// Run `sql` on whichever handle is active when the call starts.
    pub async fn execute(&self, sql: &str) -> Result<QueryResult, ConnectorError> {
        let handle = self.current()?;
        execute(&handle, sql).await
    }

    /// Preview `table_name` on the active handle.
    pub async fn preview(&self, table_name: &str) -> Result<QueryResult, ConnectorError> {
        let handle = self.current()?;
        preview(&handle, table_name).await
    }
}

fn column_names<R: Row>(row: &R) -> Vec<String> {
    row.columns().iter().map(|c| c.name().to_owned()).collect()
}

fn query_error(e: sqlx::Error) -> ConnectorError {
    warn!(error = %e, "query failed");
    ConnectorError::Query(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn sqlite_with_items(count: i64) -> ActiveConnection {
        let active = ActiveConnection::new();
        active.connect("sqlite::memory:", "sqlite").await.unwrap();
        active
            .execute("CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT, price REAL, note TEXT)")
            .await
            .unwrap();
        for i in 1..=count {
            active
                .execute(&format!(
                    "INSERT INTO items (id, name, price, note) VALUES ({i}, 'item-{i}', {i}.5, NULL)"
                ))
                .await
                .unwrap();
        }
        active
    }

    #[test]
    fn preview_sql_per_dialect() {
        assert_eq!(
            preview_sql(DriverKind::Postgres, "users"),
            "SELECT * FROM users LIMIT 10"
        );
        assert_eq!(
            preview_sql(DriverKind::SqlServer, "dbo.users"),
            "SELECT TOP 10 * FROM dbo.users"
        );
    }

    #[test]
    fn records_are_keyed_by_column() {
        let result = QueryResult {
            columns: vec!["id".into(), "name".into()],
            rows: vec![vec![json!(1), json!("a")], vec![json!(2), Value::Null]],
        };
        let records = result.into_records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["name"], json!("a"));
        assert_eq!(records[1]["name"], Value::Null);
    }

    #[tokio::test]
    async fn execute_before_connect_is_no_active_connection() {
        let active = ActiveConnection::new();
        let err = active.execute("SELECT 1").await.unwrap_err();
        assert!(matches!(err, ConnectorError::NoActiveConnection));
    }

    #[tokio::test]
    async fn execute_decodes_sqlite_values() {
        let active = sqlite_with_items(2).await;
        let result = active
            .execute("SELECT id, name, price, note FROM items ORDER BY id")
            .await
            .unwrap();

        assert_eq!(result.columns, vec!["id", "name", "price", "note"]);
        assert_eq!(
            result.rows[0],
            vec![json!(1), json!("item-1"), json!(1.5), Value::Null]
        );
    }

    #[tokio::test]
    async fn preview_caps_rows_and_matches_select_star_columns() {
        let active = sqlite_with_items(12).await;

        let preview = active.preview("items").await.unwrap();
        let direct = active.execute("SELECT * FROM items").await.unwrap();

        assert_eq!(preview.rows.len(), PREVIEW_LIMIT);
        assert_eq!(direct.rows.len(), 12);
        assert_eq!(preview.columns, direct.columns);
    }

    #[tokio::test]
    async fn preview_of_empty_table_still_lists_columns() {
        let active = sqlite_with_items(0).await;
        let preview = active.preview("items").await.unwrap();

        assert!(preview.rows.is_empty());
        assert_eq!(preview.columns, vec!["id", "name", "price", "note"]);
    }

    #[tokio::test]
    async fn semicolon_separated_script_runs_every_statement() {
        let active = ActiveConnection::new();
        active.connect("sqlite::memory:", "sqlite").await.unwrap();

        let created = active
            .execute("CREATE TABLE t (id INTEGER, label TEXT); INSERT INTO t VALUES (1, 'a'); INSERT INTO t VALUES (2, 'b')")
            .await
            .unwrap();
        assert!(created.rows.is_empty());

        let result = active
            .execute("INSERT INTO t VALUES (3, 'c'); SELECT id, label FROM t ORDER BY id")
            .await
            .unwrap();
        assert_eq!(result.columns, vec!["id", "label"]);
        assert_eq!(
            result.rows,
            vec![
                vec![json!(1), json!("a")],
                vec![json!(2), json!("b")],
                vec![json!(3), json!("c")],
            ]
        );
    }

    #[tokio::test]
    async fn bad_sql_surfaces_engine_text() {
        let active = sqlite_with_items(0).await;
        let err = active.execute("SELECT * FROM missing_table").await.unwrap_err();

        match err {
            ConnectorError::Query(text) => assert!(text.contains("missing_table"), "{text}"),
            other => panic!("expected query error, got {other:?}"),
        }
    }
}
