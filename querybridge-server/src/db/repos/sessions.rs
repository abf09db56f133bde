//! Session repository
//!
//! `upsert_by_user_and_token` is lookup-then-write and not atomic: two
//! concurrent upserts for the same (user_id, token) can both miss the lookup
//! and insert two rows. The schema carries no unique constraint on the pair.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use super::DbError;

/// Session record
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,
    pub user_id: i64,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Fields accepted when creating or upserting a session
#[derive(Debug, Clone, Deserialize)]
pub struct NewSession {
    pub user_id: i64,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Fields a PUT may overwrite
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionPatch {
    pub user_id: Option<i64>,
    pub token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl SessionPatch {
    pub fn apply_to(self, session: &mut Session) {
        if let Some(user_id) = self.user_id {
            session.user_id = user_id;
        }
        if let Some(token) = self.token {
            session.token = token;
        }
        if let Some(expires_at) = self.expires_at {
            session.expires_at = expires_at;
        }
    }
}

/// Result of an upsert
#[derive(Debug, Clone)]
pub enum UpsertOutcome {
    Created(Session),
    Updated(Session),
}

impl UpsertOutcome {
    pub fn session(&self) -> &Session {
        match self {
            Self::Created(s) | Self::Updated(s) => s,
        }
    }

    pub fn into_session(self) -> Session {
        match self {
            Self::Created(s) | Self::Updated(s) => s,
        }
    }
}

/// Session repository
pub struct SessionRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> SessionRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a session.
    pub async fn create(&self, new: &NewSession) -> Result<Session, DbError> {
        let session: Session = sqlx::query_as(
            r#"
            INSERT INTO sessions (user_id, token, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, token, expires_at
            "#,
        )
        .bind(new.user_id)
        .bind(&new.token)
        .bind(new.expires_at)
        .fetch_one(self.pool)
        .await?;

        Ok(session)
    }

    /// Get a single session by id.
    pub async fn get(&self, id: i64) -> Result<Session, DbError> {
        sqlx::query_as("SELECT id, user_id, token, expires_at FROM sessions WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("session", id))
    }

    /// List every session.
    pub async fn list(&self) -> Result<Vec<Session>, DbError> {
        let items = sqlx::query_as("SELECT id, user_id, token, expires_at FROM sessions ORDER BY id")
            .fetch_all(self.pool)
            .await?;
        Ok(items)
    }

    /// Overwrite every column of the session with the given id.
    pub async fn update(&self, session: &Session) -> Result<Session, DbError> {
        sqlx::query_as(
            r#"
            UPDATE sessions
            SET user_id = $2, token = $3, expires_at = $4
            WHERE id = $1
            RETURNING id, user_id, token, expires_at
            "#,
        )
        .bind(session.id)
        .bind(session.user_id)
        .bind(&session.token)
        .bind(session.expires_at)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("session", session.id))
    }

    /// Delete a session by id.
    pub async fn delete(&self, id: i64) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("session", id));
        }
        Ok(())
    }

    /// Overwrite the session matching (user_id, token), or create one.
    ///
    /// An existing row keeps its id; only `expires_at` comes from the payload.
    pub async fn upsert_by_user_and_token(
        &self,
        user_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<UpsertOutcome, DbError> {
        let existing: Option<Session> = sqlx::query_as(
            r#"
            SELECT id, user_id, token, expires_at
            FROM sessions
            WHERE user_id = $1 AND token = $2
            ORDER BY id
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(token)
        .fetch_optional(self.pool)
        .await?;

        match existing {
            Some(mut session) => {
                session.expires_at = expires_at;
                let updated = self.update(&session).await?;
                tracing::debug!(session_id = updated.id, user_id, "session refreshed");
                Ok(UpsertOutcome::Updated(updated))
            }
            None => {
                let created = self
                    .create(&NewSession {
                        user_id,
                        token: token.to_owned(),
                        expires_at,
                    })
                    .await?;
                tracing::debug!(session_id = created.id, user_id, "session created");
                Ok(UpsertOutcome::Created(created))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repos::{NewUser, UserRepo};
    use crate::db::{create_pool, migrations};
    use chrono::Duration;

    #[test]
    fn new_session_requires_expiry() {
        assert!(serde_json::from_str::<NewSession>(r#"{"user_id": 1, "token": "t"}"#).is_err());
        let ok: NewSession = serde_json::from_str(
            r#"{"user_id": 1, "token": "t", "expires_at": "2030-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(ok.token, "t");
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn upsert_twice_keeps_one_row_with_latest_payload() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        let pool = create_pool(&url).await.unwrap();
        migrations::run(&pool).await.unwrap();

        let user = UserRepo::new(&pool)
            .create(&NewUser {
                name: "sess".into(),
                email: format!("sess-{}@example.test", uuid::Uuid::new_v4()),
                password: "p".into(),
                country: String::new(),
                state: String::new(),
            })
            .await
            .unwrap();

        let repo = SessionRepo::new(&pool);
        let first_expiry = Utc::now() + Duration::hours(1);
        let second_expiry = Utc::now() + Duration::hours(2);

        let first = repo
            .upsert_by_user_and_token(user.id, "tok-1", first_expiry)
            .await
            .unwrap();
        assert!(matches!(first, UpsertOutcome::Created(_)));

        let second = repo
            .upsert_by_user_and_token(user.id, "tok-1", second_expiry)
            .await
            .unwrap();
        assert!(matches!(second, UpsertOutcome::Updated(_)));
        assert_eq!(first.session().id, second.session().id);

        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM sessions WHERE user_id = $1 AND token = $2")
                .bind(user.id)
                .bind("tok-1")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(count, 1);

        let stored = repo.get(second.session().id).await.unwrap();
        assert_eq!(
            stored.expires_at.timestamp_micros(),
            second_expiry.timestamp_micros()
        );
    }
}
