//! Repository implementations for the entity store
//!
//! Each repository follows these patterns:
//! - `create` inserts and returns the stored row (generated id and timestamps)
//! - `get`/`update`/`delete` report a missing id as `DbError::NotFound`
//! - `update` overwrites every column of the record

pub mod sessions;
pub mod transactions;
pub mod users;

pub use sessions::{NewSession, Session, SessionPatch, SessionRepo, UpsertOutcome};
pub use transactions::{NewTransaction, Transaction, TransactionPatch, TransactionRepo};
pub use users::{NewUser, User, UserPatch, UserRepo};

/// Database error type
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("not found: {resource} '{id}'")]
    NotFound { resource: &'static str, id: String },
}

impl DbError {
    pub(crate) fn not_found(resource: &'static str, id: i64) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }
}
