//! User endpoints

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};

use crate::db::repos::{DbError, NewUser, Transaction, TransactionRepo, User, UserPatch, UserRepo};
use crate::http::error::ApiError;
use crate::http::extractors::{JsonBody, ValidId};
use crate::http::server::AppState;
use crate::models::require;

/// POST /users - create a user
async fn create_user(
    State(state): State<Arc<AppState>>,
    JsonBody(new): JsonBody<NewUser>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    require("email", &new.email)?;
    require("password", &new.password)?;

    let user = UserRepo::new(&state.pool).create(&new).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /users - list users with their transactions and sessions
async fn list_users(State(state): State<Arc<AppState>>) -> Result<Json<Vec<User>>, ApiError> {
    let users = UserRepo::new(&state.pool).list().await?;
    Ok(Json(users))
}

/// GET /users/{id} - get a single user with transactions and sessions
async fn get_user(
    State(state): State<Arc<AppState>>,
    ValidId(id): ValidId,
) -> Result<Json<User>, ApiError> {
    let user = UserRepo::new(&state.pool).get(id).await?;
    Ok(Json(user))
}

/// PUT /users/{id} - overlay the body onto the stored user and write it back
async fn update_user(
    State(state): State<Arc<AppState>>,
    ValidId(id): ValidId,
    JsonBody(patch): JsonBody<UserPatch>,
) -> Result<Json<User>, ApiError> {
    if let Some(email) = &patch.email {
        require("email", email)?;
    }

    let repo = UserRepo::new(&state.pool);
    let mut user = repo.get(id).await?;
    patch.apply_to(&mut user);

    let updated = repo.update(&user).await?;
    Ok(Json(updated))
}

/// DELETE /users/{id} - remove a user; an already-missing id still answers 204
async fn delete_user(
    State(state): State<Arc<AppState>>,
    ValidId(id): ValidId,
) -> Result<StatusCode, ApiError> {
    match UserRepo::new(&state.pool).delete(id).await {
        Ok(()) | Err(DbError::NotFound { .. }) => Ok(StatusCode::NO_CONTENT),
        Err(e) => Err(e.into()),
    }
}

/// GET /users/{id}/transactions - transactions owned by one user
async fn list_user_transactions(
    State(state): State<Arc<AppState>>,
    ValidId(id): ValidId,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    let items = TransactionRepo::new(&state.pool).list_for_user(id).await?;
    Ok(Json(items))
}

/// User routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/users/{id}/transactions", get(list_user_transactions))
}
