//! User repository
//!
//! Reads eagerly attach the user's transactions and sessions. The children
//! are fetched with one query per child table for the whole batch of users.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use super::{DbError, Session, Transaction};

const USER_COLUMNS: &str = "id, name, email, password, country, state, created_at, updated_at";

/// User record with its associated rows
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    /// Stored as given; hashing is out of scope for this service.
    pub password: String,
    pub country: String,
    pub state: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(skip)]
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[sqlx(skip)]
    #[serde(default)]
    pub sessions: Vec<Session>,
}

/// Fields accepted when creating a user
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    #[serde(default)]
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub state: String,
}

/// Fields a PUT may overwrite; absent fields keep their stored value
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub country: Option<String>,
    pub state: Option<String>,
}

impl UserPatch {
    pub fn apply_to(self, user: &mut User) {
        if let Some(name) = self.name {
            user.name = name;
        }
        if let Some(email) = self.email {
            user.email = email;
        }
        if let Some(password) = self.password {
            user.password = password;
        }
        if let Some(country) = self.country {
            user.country = country;
        }
        if let Some(state) = self.state {
            user.state = state;
        }
    }
}

/// User repository
pub struct UserRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a user. Duplicate emails fail on the UNIQUE constraint.
    pub async fn create(&self, new: &NewUser) -> Result<User, DbError> {
        let user: User = sqlx::query_as(&format!(
            r#"
            INSERT INTO users (name, email, password, country, state)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.password)
        .bind(&new.country)
        .bind(&new.state)
        .fetch_one(self.pool)
        .await?;

        tracing::debug!(user_id = user.id, "created user");
        Ok(user)
    }

    /// Get a user by id with transactions and sessions attached.
    pub async fn get(&self, id: i64) -> Result<User, DbError> {
        let user: User = sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("user", id))?;

        let mut users = vec![user];
        self.attach_children(&mut users).await?;
        Ok(users.remove(0))
    }

    /// List all users with their transactions and sessions.
    pub async fn list(&self) -> Result<Vec<User>, DbError> {
        let mut users: Vec<User> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))
                .fetch_all(self.pool)
                .await?;

        self.attach_children(&mut users).await?;
        Ok(users)
    }

    /// Overwrite every column of the user with the given id.
    pub async fn update(&self, user: &User) -> Result<User, DbError> {
        let updated: User = sqlx::query_as(&format!(
            r#"
            UPDATE users
            SET name = $2, email = $3, password = $4, country = $5, state = $6,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password)
        .bind(&user.country)
        .bind(&user.state)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("user", user.id))?;

        let mut users = vec![updated];
        self.attach_children(&mut users).await?;
        Ok(users.remove(0))
    }

    /// Delete a user; transactions and sessions go with it (ON DELETE CASCADE).
    pub async fn delete(&self, id: i64) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("user", id));
        }
        Ok(())
    }

    async fn attach_children(&self, users: &mut [User]) -> Result<(), DbError> {
        if users.is_empty() {
            return Ok(());
        }

        let ids: Vec<i64> = users.iter().map(|u| u.id).collect();
        let index: HashMap<i64, usize> = ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();

        let transactions: Vec<Transaction> = sqlx::query_as(
            "SELECT id, user_id, amount, date FROM transactions WHERE user_id = ANY($1) ORDER BY id",
        )
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        let sessions: Vec<Session> = sqlx::query_as(
            "SELECT id, user_id, token, expires_at FROM sessions WHERE user_id = ANY($1) ORDER BY id",
        )
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        for tx in transactions {
            if let Some(&i) = index.get(&tx.user_id) {
                users[i].transactions.push(tx);
            }
        }
        for session in sessions {
            if let Some(&i) = index.get(&session.user_id) {
                users[i].sessions.push(session);
            }
        }

        Ok(())
    }
}
