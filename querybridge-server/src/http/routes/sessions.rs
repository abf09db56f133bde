//! Session endpoints

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use crate::db::repos::{DbError, NewSession, Session, SessionPatch, SessionRepo, UpsertOutcome};
use crate::http::error::ApiError;
use crate::http::extractors::{JsonBody, ValidId};
use crate::http::server::AppState;
use crate::models::require;

/// POST /sessions
async fn create_session(
    State(state): State<Arc<AppState>>,
    JsonBody(new): JsonBody<NewSession>,
) -> Result<(StatusCode, Json<Session>), ApiError> {
    require("token", &new.token)?;

    let session = SessionRepo::new(&state.pool).create(&new).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// POST /sessions/upsert - overwrite the session for (user_id, token) or create it
async fn upsert_session(
    State(state): State<Arc<AppState>>,
    JsonBody(new): JsonBody<NewSession>,
) -> Result<(StatusCode, Json<Session>), ApiError> {
    require("token", &new.token)?;

    let outcome = SessionRepo::new(&state.pool)
        .upsert_by_user_and_token(new.user_id, &new.token, new.expires_at)
        .await?;

    let status = match outcome {
        UpsertOutcome::Created(_) => StatusCode::CREATED,
        UpsertOutcome::Updated(_) => StatusCode::OK,
    };
    Ok((status, Json(outcome.into_session())))
}

/// GET /sessions
async fn list_sessions(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Session>>, ApiError> {
    let items = SessionRepo::new(&state.pool).list().await?;
    Ok(Json(items))
}

/// GET /sessions/{id}
async fn get_session(
    State(state): State<Arc<AppState>>,
    ValidId(id): ValidId,
) -> Result<Json<Session>, ApiError> {
    let session = SessionRepo::new(&state.pool).get(id).await?;
    Ok(Json(session))
}

/// PUT /sessions/{id}
async fn update_session(
    State(state): State<Arc<AppState>>,
    ValidId(id): ValidId,
    JsonBody(patch): JsonBody<SessionPatch>,
) -> Result<Json<Session>, ApiError> {
    if let Some(token) = &patch.token {
        require("token", token)?;
    }

    let repo = SessionRepo::new(&state.pool);
    let mut session = repo.get(id).await?;
    patch.apply_to(&mut session);

    let updated = repo.update(&session).await?;
    Ok(Json(updated))
}

/// DELETE /sessions/{id}
async fn delete_session(
    State(state): State<Arc<AppState>>,
    ValidId(id): ValidId,
) -> Result<StatusCode, ApiError> {
    match SessionRepo::new(&state.pool).delete(id).await {
        Ok(()) | Err(DbError::NotFound { .. }) => Ok(StatusCode::NO_CONTENT),
        Err(e) => Err(e.into()),
    }
}

/// Session routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sessions", get(list_sessions).post(create_session))
        .route("/sessions/upsert", post(upsert_session))
        .route(
            "/sessions/{id}",
            get(get_session).put(update_session).delete(delete_session),
        )
}
