use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use tracing::instrument;

use crate::auth::extractors::AuthUser;
use crate::categories::dto::{CategoryRequest, CategoryResponse, ListCategoriesQuery};
use crate::categories::services;
use crate::error::ApiError;
use crate::pagination::Paginated;
use crate::state::AppState;

pub fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list).post(create))
        .route("/categories/:id", put(update).delete(delete))
}

#[instrument(skip(state, payload))]
pub async fn create(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CategoryRequest>,
) -> Result<(StatusCode, Json<CategoryResponse>), ApiError> {
    let category = services::create(&state, user_id, payload).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

#[instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<ListCategoriesQuery>,
) -> Result<Json<Paginated<CategoryResponse>>, ApiError> {
    let (data, total, page, limit) = services::list(&state, user_id, query).await?;
    Ok(Json(Paginated::new(data, total, page, limit)))
}

#[instrument(skip(state, payload))]
pub async fn update(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<CategoryRequest>,
) -> Result<Json<CategoryResponse>, ApiError> {
    let category = services::update(&state, user_id, id, payload).await?;
    Ok(Json(category))
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
