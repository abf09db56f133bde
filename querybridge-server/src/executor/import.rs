//! Record import into the active database
//!
//! The target table is created when missing: an auto-increment `id` key plus
//! one text column per field of the first record. Every record is then
//! inserted with bound parameters inside one transaction, so a failed row
//! leaves no partial import behind. Fields absent from the first record are
//! ignored; fields missing from a later record are stored as NULL.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::info;

use super::query_error;
use crate::connector::{ActiveConnection, ConnectionHandle, ConnectorError, DriverKind};

/// Table used when the caller names none
pub const DEFAULT_IMPORT_TABLE: &str = "uploaded_json_data";

/// One record to import, keyed by column name
pub type Record = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportSummary {
    pub table_name: String,
    pub columns: Vec<String>,
    pub rows_inserted: u64,
}

/// Column names taken from the first record, or `None` when there is
/// nothing to import.
pub fn record_columns(records: &[Record]) -> Option<Vec<String>> {
    let first = records.first()?;
    if first.is_empty() {
        return None;
    }
    Some(first.keys().cloned().collect())
}

fn quote_ident(driver: DriverKind, name: &str) -> String {
    match driver {
        DriverKind::MySql => format!("`{}`", name.replace('`', "``")),
        DriverKind::SqlServer => format!("[{}]", name.replace(']', "]]")),
        DriverKind::Postgres | DriverKind::Sqlite => format!("\"{}\"", name.replace('"', "\"\"")),
    }
}

fn id_column(driver: DriverKind) -> &'static str {
    match driver {
        DriverKind::Postgres => "id BIGSERIAL PRIMARY KEY",
        DriverKind::MySql => "id BIGINT AUTO_INCREMENT PRIMARY KEY",
        DriverKind::Sqlite => "id INTEGER PRIMARY KEY AUTOINCREMENT",
        DriverKind::SqlServer => "id BIGINT IDENTITY(1,1) PRIMARY KEY",
    }
}

fn text_type(driver: DriverKind) -> &'static str {
    match driver {
        DriverKind::SqlServer => "NVARCHAR(MAX)",
        _ => "TEXT",
    }
}

/// `CREATE TABLE` for an import target. A record field named `id` replaces
/// the generated key.
pub fn create_table_sql(driver: DriverKind, table_name: &str, columns: &[String]) -> String {
    let mut definitions = Vec::with_capacity(columns.len() + 1);
    if !columns.iter().any(|c| c.eq_ignore_ascii_case("id")) {
        definitions.push(id_column(driver).to_owned());
    }
    definitions.extend(
        columns
            .iter()
            .map(|c| format!("{} {}", quote_ident(driver, c), text_type(driver))),
    );
    let body = definitions.join(", ");

    match driver {
        // No IF NOT EXISTS on CREATE TABLE
        DriverKind::SqlServer => format!(
            "IF OBJECT_ID(N'{}', N'U') IS NULL CREATE TABLE {table_name} ({body})",
            table_name.replace('\'', "''")
        ),
        _ => format!("CREATE TABLE IF NOT EXISTS {table_name} ({body})"),
    }
}

/// Parameterized single-row `INSERT` in the driver's placeholder style.
pub fn insert_sql(driver: DriverKind, table_name: &str, columns: &[String]) -> String {
    let names: Vec<String> = columns.iter().map(|c| quote_ident(driver, c)).collect();
    let placeholders: Vec<String> = (1..=columns.len())
        .map(|i| match driver {
            DriverKind::Postgres => format!("${i}"),
            DriverKind::SqlServer => format!("@P{i}"),
            DriverKind::MySql | DriverKind::Sqlite => "?".to_owned(),
        })
        .collect();

    format!(
        "INSERT INTO {table_name} ({}) VALUES ({})",
        names.join(", "),
        placeholders.join(", ")
    )
}

/// Text form of a field. Strings are stored as-is, other JSON values in
/// their JSON spelling.
fn cell(value: Option<&Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    }
}

fn to_rows(records: &[Record], columns: &[String]) -> Vec<Vec<Option<String>>> {
    records
        .iter()
        .map(|record| columns.iter().map(|c| cell(record.get(c))).collect())
        .collect()
}

/// Create `table_name` if needed and insert every record.
pub async fn import_records(
    handle: &ConnectionHandle,
    table_name: &str,
    records: &[Record],
) -> Result<ImportSummary, ConnectorError> {
    let columns = record_columns(records)
        .ok_or_else(|| ConnectorError::Query("no fields to import".to_string()))?;
    let driver = handle.driver();
    let create = create_table_sql(driver, table_name, &columns);
    let insert = insert_sql(driver, table_name, &columns);
    let rows = to_rows(records, &columns);

    info!(%driver, table = table_name, rows = rows.len(), "importing records");

    let rows_inserted = match handle {
        ConnectionHandle::Postgres(pool) => {
            sqlx::raw_sql(&create).execute(pool).await.map_err(query_error)?;
            let mut tx = pool.begin().await.map_err(query_error)?;
            let mut inserted = 0;
            for row in &rows {
                let mut query = sqlx::query(&insert);
                for value in row {
                    query = query.bind(value.as_deref());
                }
                inserted += query.execute(&mut *tx).await.map_err(query_error)?.rows_affected();
            }
            tx.commit().await.map_err(query_error)?;
            inserted
        }
        ConnectionHandle::MySql(pool) => {
            sqlx::raw_sql(&create).execute(pool).await.map_err(query_error)?;
            let mut tx = pool.begin().await.map_err(query_error)?;
            let mut inserted = 0;
            for row in &rows {
                let mut query = sqlx::query(&insert);
                for value in row {
                    query = query.bind(value.as_deref());
                }
                inserted += query.execute(&mut *tx).await.map_err(query_error)?.rows_affected();
            }
            tx.commit().await.map_err(query_error)?;
            inserted
        }
        ConnectionHandle::Sqlite(pool) => {
            sqlx::raw_sql(&create).execute(pool).await.map_err(query_error)?;
            let mut tx = pool.begin().await.map_err(query_error)?;
            let mut inserted = 0;
            for row in &rows {
                let mut query = sqlx::query(&insert);
                for value in row {
                    query = query.bind(value.as_deref());
                }
                inserted += query.execute(&mut *tx).await.map_err(query_error)?.rows_affected();
            }
            tx.commit().await.map_err(query_error)?;
            inserted
        }
        ConnectionHandle::SqlServer(client) => client
            .insert_rows(&create, &insert, &rows)
            .await
            .map_err(|e| ConnectorError::Query(e.to_string()))?,
    };

    info!(table = table_name, rows_inserted, "import complete");

    Ok(ImportSummary {
        table_name: table_name.to_owned(),
        columns,
        rows_inserted,
    })
}

impl ActiveConnection {
    /// Import `records` into `table_name` on the active handle.
    pub async fn import_records(
        &self,
        table_name: &str,
        records: &[Record],
    ) -> Result<ImportSummary, ConnectorError> {
        let handle = self.current()?;
        import_records(&handle, table_name, records).await
    }
}
