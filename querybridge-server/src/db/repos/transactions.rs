//! Transaction repository

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use super::DbError;

/// Transaction record
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub date: DateTime<Utc>,
}

/// Fields accepted when creating a transaction
#[derive(Debug, Clone, Deserialize)]
pub struct NewTransaction {
    pub user_id: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    /// Defaults to the database's current time
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

/// Fields a PUT may overwrite
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionPatch {
    pub user_id: Option<i64>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub amount: Option<Decimal>,
    pub date: Option<DateTime<Utc>>,
}

impl TransactionPatch {
    pub fn apply_to(self, tx: &mut Transaction) {
        if let Some(user_id) = self.user_id {
            tx.user_id = user_id;
        }
        if let Some(amount) = self.amount {
            tx.amount = amount;
        }
        if let Some(date) = self.date {
            tx.date = date;
        }
    }
}

/// Transaction repository
pub struct TransactionRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> TransactionRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a transaction. An unknown user_id fails on the foreign key.
    pub async fn create(&self, new: &NewTransaction) -> Result<Transaction, DbError> {
        let tx: Transaction = sqlx::query_as(
            r#"
            INSERT INTO transactions (user_id, amount, date)
            VALUES ($1, $2, COALESCE($3, NOW()))
            RETURNING id, user_id, amount, date
            "#,
        )
        .bind(new.user_id)
        .bind(new.amount)
        .bind(new.date)
        .fetch_one(self.pool)
        .await?;

        Ok(tx)
    }

    /// Get a single transaction by id.
    pub async fn get(&self, id: i64) -> Result<Transaction, DbError> {
        sqlx::query_as("SELECT id, user_id, amount, date FROM transactions WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("transaction", id))
    }

    /// List every transaction.
    pub async fn list(&self) -> Result<Vec<Transaction>, DbError> {
        let items = sqlx::query_as("SELECT id, user_id, amount, date FROM transactions ORDER BY id")
            .fetch_all(self.pool)
            .await?;
        Ok(items)
    }

    /// List the transactions owned by one user.
    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<Transaction>, DbError> {
        let items = sqlx::query_as(
            "SELECT id, user_id, amount, date FROM transactions WHERE user_id = $1 ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(items)
    }

    /// Overwrite every column of the transaction with the given id.
    pub async fn update(&self, tx: &Transaction) -> Result<Transaction, DbError> {
        sqlx::query_as(
            r#"
            UPDATE transactions
            SET user_id = $2, amount = $3, date = $4
            WHERE id = $1
            RETURNING id, user_id, amount, date
            "#,
        )
        .bind(tx.id)
        .bind(tx.user_id)
        .bind(tx.amount)
        .bind(tx.date)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("transaction", tx.id))
    }

    /// Delete a transaction by id.
    pub async fn delete(&self, id: i64) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM transactions WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("transaction", id));
        }
        Ok(())
    }
}
