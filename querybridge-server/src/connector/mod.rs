//! Dynamic connector - opens a caller-specified database and makes it the
//! single active connection.
//!
//! - The driver name is validated before any network I/O
//! - Every new connection is probed with `SELECT 1`
//! - `ActiveConnection` guards only the read/replace of the handle; handles are
//!   `Arc`-backed clones, so a query that captured the old handle finishes on
//!   it even after a later connect swaps in a new one

pub mod mssql;

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use querybridge_core::mask_dsn;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info, warn};

pub use mssql::SqlServerClient;

/// Pool size for caller-supplied databases
const USER_POOL_MAX_CONNECTIONS: u32 = 5;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Relational dialect / wire-protocol family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverKind {
    Postgres,
    MySql,
    Sqlite,
    SqlServer,
}

impl DriverKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::MySql => "mysql",
            Self::Sqlite => "sqlite",
            Self::SqlServer => "sqlserver",
        }
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DriverKind {
    type Err = ConnectorError;

    /// Exact, case-sensitive match on the four driver names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "postgres" => Ok(Self::Postgres),
            "mysql" => Ok(Self::MySql),
            "sqlite" => Ok(Self::Sqlite),
            "sqlserver" => Ok(Self::SqlServer),
            _ => Err(ConnectorError::UnsupportedDriver(s.to_owned())),
        }
    }
}

/// Connector and executor errors
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    #[error("unsupported database driver: {0}")]
    UnsupportedDriver(String),

    #[error("failed to connect to {driver}: {source}")]
    Connection {
        driver: DriverKind,
        #[source]
        source: BoxError,
    },

    #[error("no active database connection")]
    NoActiveConnection,

    /// Storage engine rejected the statement; carries its error text
    #[error("{0}")]
    Query(String),
}

impl ConnectorError {
    fn connection(driver: DriverKind, source: impl Into<BoxError>) -> Self {
        Self::Connection {
            driver,
            source: source.into(),
        }
    }
}

/// An open connection to a caller-supplied database
#[derive(Clone)]
pub enum ConnectionHandle {
    Postgres(PgPool),
    MySql(MySqlPool),
    Sqlite(SqlitePool),
    SqlServer(SqlServerClient),
}

impl ConnectionHandle {
    pub fn driver(&self) -> DriverKind {
        match self {
            Self::Postgres(_) => DriverKind::Postgres,
            Self::MySql(_) => DriverKind::MySql,
            Self::Sqlite(_) => DriverKind::Sqlite,
            Self::SqlServer(_) => DriverKind::SqlServer,
        }
    }

    /// Trivial round-trip to confirm the database answers.
    pub async fn ping(&self) -> Result<(), ConnectorError> {
        let driver = self.driver();
        match self {
            Self::Postgres(pool) => sqlx::query("SELECT 1")
                .execute(pool)
                .await
                .map(|_| ())
                .map_err(|e| ConnectorError::connection(driver, e)),
            Self::MySql(pool) => sqlx::query("SELECT 1")
                .execute(pool)
                .await
                .map(|_| ())
                .map_err(|e| ConnectorError::connection(driver, e)),
            Self::Sqlite(pool) => sqlx::query("SELECT 1")
                .execute(pool)
                .await
                .map(|_| ())
                .map_err(|e| ConnectorError::connection(driver, e)),
            Self::SqlServer(client) => client
                .ping()
                .await
                .map_err(|e| ConnectorError::connection(driver, e)),
        }
    }

    fn log_pool_stats(&self) {
        let (size, idle) = match self {
            Self::Postgres(pool) => (pool.size(), pool.num_idle()),
            Self::MySql(pool) => (pool.size(), pool.num_idle()),
            Self::Sqlite(pool) => (pool.size(), pool.num_idle()),
            Self::SqlServer(_) => (1, 0),
        };
        info!(open_connections = size, idle_connections = idle, "connection pool settings");
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ConnectionHandle").field(&self.driver()).finish()
    }
}

/// Open a connection to `dsn` with the named driver and verify it answers.
///
/// An unrecognized driver name fails with `UnsupportedDriver` before any I/O.
pub async fn connect(dsn: &str, driver: &str) -> Result<ConnectionHandle, ConnectorError> {
    let kind: DriverKind = driver.parse().inspect_err(|_| {
        warn!(driver, "unsupported database driver");
    })?;

    info!(driver = %kind, dsn = %mask_dsn(dsn), "connecting to user database");

    let handle = match kind {
        DriverKind::Postgres => PgPoolOptions::new()
            .max_connections(USER_POOL_MAX_CONNECTIONS)
            .connect(dsn)
            .await
            .map(ConnectionHandle::Postgres)
            .map_err(|e| ConnectorError::connection(kind, e))?,
        DriverKind::MySql => {
            let options = MySqlConnectOptions::from_str(&normalize_mysql_dsn(dsn))
                .map_err(|e| ConnectorError::connection(kind, e))?;
            MySqlPoolOptions::new()
                .max_connections(USER_POOL_MAX_CONNECTIONS)
                .connect_with(options)
                .await
                .map(ConnectionHandle::MySql)
                .map_err(|e| ConnectorError::connection(kind, e))?
        }
        DriverKind::Sqlite => {
            let options = sqlite_options(dsn).map_err(|e| ConnectorError::connection(kind, e))?;
            // Each connection to :memory: gets its own database
            let max = if is_sqlite_memory(dsn) { 1 } else { USER_POOL_MAX_CONNECTIONS };
            SqlitePoolOptions::new()
                .max_connections(max)
                .connect_with(options)
                .await
                .map(ConnectionHandle::Sqlite)
                .map_err(|e| ConnectorError::connection(kind, e))?
        }
        DriverKind::SqlServer => SqlServerClient::connect(dsn)
            .await
            .map(ConnectionHandle::SqlServer)
            .map_err(|e| ConnectorError::connection(kind, e))?,
    };

    handle.ping().await?;
    info!(driver = %kind, "connected to user database");
    handle.log_pool_stats();

    Ok(handle)
}

/// Accept both `mysql://` URLs and `user:pass@tcp(host:port)/db?params` DSNs.
fn normalize_mysql_dsn(dsn: &str) -> String {
    if dsn.starts_with("mysql://") || dsn.starts_with("mariadb://") {
        return dsn.to_owned();
    }

    let Some(at) = dsn.rfind("@tcp(") else {
        return format!("mysql://{dsn}");
    };
    let credentials = &dsn[..at];
    let rest = &dsn[at + "@tcp(".len()..];
    match rest.split_once(')') {
        Some((host, tail)) => format!("mysql://{credentials}@{host}{tail}"),
        None => format!("mysql://{dsn}"),
    }
}

/// Accept `sqlite:` URLs as well as bare file paths.
fn sqlite_options(dsn: &str) -> Result<SqliteConnectOptions, sqlx::Error> {
    let options = if dsn.starts_with("sqlite:") {
        SqliteConnectOptions::from_str(dsn)?
    } else if dsn == ":memory:" {
        SqliteConnectOptions::from_str("sqlite::memory:")?
    } else {
        SqliteConnectOptions::new().filename(dsn)
    };
    Ok(options.create_if_missing(true))
}

fn is_sqlite_memory(dsn: &str) -> bool {
    dsn.contains(":memory:") || dsn.contains("mode=memory")
}

/// The process's current user-database connection.
///
/// Held in the HTTP `AppState` and passed to every operation that needs it.
/// Last successful connect wins.
#[derive(Clone, Default)]
pub struct ActiveConnection {
    inner: Arc<Mutex<Option<ConnectionHandle>>>,
}

impl ActiveConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect and, on success, replace the active handle.
    ///
    /// The previous handle is not closed here; it is released once every
    /// in-flight query holding a clone of it finishes.
    pub async fn connect(&self, dsn: &str, driver: &str) -> Result<DriverKind, ConnectorError> {
        let handle = connect(dsn, driver).await?;
        let kind = handle.driver();
        if let Some(previous) = self.replace(handle) {
            debug!(previous = %previous.driver(), "replaced active connection");
        }
        Ok(kind)
    }

    /// Swap in a new handle, returning the previous one.
    pub fn replace(&self, handle: ConnectionHandle) -> Option<ConnectionHandle> {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        guard.replace(handle)
    }

    /// Clone the current handle, or fail with `NoActiveConnection`.
    pub fn current(&self) -> Result<ConnectionHandle, ConnectorError> {
        let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        guard.clone().ok_or(ConnectorError::NoActiveConnection)
    }

    /// Round-trip on the active handle.
    pub async fn ping(&self) -> Result<(), ConnectorError> {
        self.current()?.ping().await
    }

    pub fn is_connected(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl fmt::Debug for ActiveConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("ActiveConnection")
            .field("driver", &guard.as_ref().map(ConnectionHandle::driver))
            .finish()
    }
}
