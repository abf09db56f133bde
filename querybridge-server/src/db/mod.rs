//! Database layer - application pool, schema and repositories
//!
//! # Design Principles
//!
//! - Connection pool, no Arc<Mutex<Connection>>
//! - Eager loading uses one query per child table, not one per parent
//! - Full-record overwrite on update, no partial UPDATE statements

pub mod migrations;
pub mod pool;
pub mod repos;

pub use pool::{create_pool, create_pool_with_options, database_time};
pub use repos::*;
