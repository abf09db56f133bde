//! querybridge-core: shared building blocks for the querybridge server and CLI
//!
//! - CSV import into header-keyed records
//! - Best-effort DSN credential masking for logs
//! - Layered TOML configuration

pub mod config;
pub mod csv_import;
pub mod dsn;
pub mod error;

pub use config::QuerybridgeConfig;
pub use csv_import::{import_csv, import_csv_json, CsvRecord};
pub use dsn::mask_dsn;
pub use error::{CoreError, Result};
