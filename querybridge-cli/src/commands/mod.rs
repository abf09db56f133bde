//! Command implementations for the querybridge CLI

pub mod import_csv;
pub mod serve;

pub use import_csv::run_import_csv;
pub use serve::run_serve;
