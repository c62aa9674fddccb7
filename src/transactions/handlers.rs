use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;

use crate::auth::extractors::AuthUser;
use crate::error::ApiError;
use crate::pagination::Paginated;
use crate::state::AppState;
use crate::transactions::dto::{ListTransactionsQuery, TransactionRequest, TransactionResponse};
use crate::transactions::services;

pub fn transaction_routes() -> Router<AppState> {
    Router::new()
        .route("/transactions", get(list).post(create))
        .route(
            "/transactions/:id",
            get(retrieve).put(update).delete(delete),
        )
}

#[instrument(skip(state, payload))]
pub async fn create(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<TransactionRequest>,
) -> Result<(StatusCode, Json<TransactionResponse>), ApiError> {
    let transaction = services::create(&state, user_id, payload).await?;
    Ok((StatusCode::CREATED, Json(transaction)))
}

#[instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<ListTransactionsQuery>,
) -> Result<Json<Paginated<TransactionResponse>>, ApiError> {
    let (data, total, page, limit) = services::list(&state, user_id, query).await?;
    Ok(Json(Paginated::new(data, total, page, limit)))
}

#[instrument(skip(state))]
pub async fn retrieve(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<TransactionResponse>, ApiError> {
    let transaction = services::get(&state, user_id, id).await?;
    Ok(Json(transaction))
}

#[instrument(skip(state, payload))]
pub async fn update(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<TransactionRequest>,
) -> Result<Json<TransactionResponse>, ApiError> {
    let transaction = services::update(&state, user_id, id, payload).await?;
    Ok(Json(transaction))
}

#[instrument(skip(state))]
pub async fn delete(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    services::delete(&state, user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
