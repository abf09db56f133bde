//! Transaction endpoints

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};

use crate::db::repos::{DbError, NewTransaction, Transaction, TransactionPatch, TransactionRepo};
use crate::http::error::ApiError;
use crate::http::extractors::{JsonBody, ValidId};
use crate::http::server::AppState;

/// POST /transactions - record a transaction
async fn create_transaction(
    State(state): State<Arc<AppState>>,
    JsonBody(new): JsonBody<NewTransaction>,
) -> Result<(StatusCode, Json<Transaction>), ApiError> {
    let tx = TransactionRepo::new(&state.pool).create(&new).await?;
    Ok((StatusCode::CREATED, Json(tx)))
}

/// GET /transactions
async fn list_transactions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    let items = TransactionRepo::new(&state.pool).list().await?;
    Ok(Json(items))
}

/// GET /transactions/{id}
async fn get_transaction(
    State(state): State<Arc<AppState>>,
    ValidId(id): ValidId,
) -> Result<Json<Transaction>, ApiError> {
    let tx = TransactionRepo::new(&state.pool).get(id).await?;
    Ok(Json(tx))
}

/// PUT /transactions/{id}
async fn update_transaction(
    State(state): State<Arc<AppState>>,
    ValidId(id): ValidId,
    JsonBody(patch): JsonBody<TransactionPatch>,
) -> Result<Json<Transaction>, ApiError> {
    let repo = TransactionRepo::new(&state.pool);
    let mut tx = repo.get(id).await?;
    patch.apply_to(&mut tx);

    let updated = repo.update(&tx).await?;
    Ok(Json(updated))
}

/// DELETE /transactions/{id}
async fn delete_transaction(
    State(state): State<Arc<AppState>>,
    ValidId(id): ValidId,
) -> Result<StatusCode, ApiError> {
    match TransactionRepo::new(&state.pool).delete(id).await {
        Ok(()) | Err(DbError::NotFound { .. }) => Ok(StatusCode::NO_CONTENT),
        Err(e) => Err(e.into()),
    }
}

/// Transaction routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/transactions",
            get(list_transactions).post(create_transaction),
        )
        .route(
            "/transactions/{id}",
            get(get_transaction)
                .put(update_transaction)
                .delete(delete_transaction),
        )
}
