use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, patch, put},
    Json, Router,
};
use tracing::instrument;

use crate::auth::extractors::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;
use crate::users::dto::{
    BalanceResponse, ChangePasswordRequest, DeleteAccountRequest, MeResponse, MessageResponse,
    ProfileResponse, UpdateBalanceRequest, UpdateProfileRequest,
};
use crate::users::services;

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/users/me",
            get(me).put(update_profile).delete(delete_account),
        )
        .route("/users/me/balance", patch(update_balance))
        .route("/users/password", put(change_password))
}

#[instrument(skip(state))]
pub async fn me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<MeResponse>, ApiError> {
    let profile = services::get_me(&state, user_id).await?;
    Ok(Json(profile))
}

#[instrument(skip(state, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let profile = services::update_profile(&state, user_id, payload).await?;
    Ok(Json(profile))
}

#[instrument(skip(state, payload))]
pub async fn update_balance(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UpdateBalanceRequest>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let balance = services::set_balance(&state, user_id, payload.balance).await?;
    Ok(Json(balance))
}

#[instrument(skip(state, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    services::change_password(&state, user_id, payload).await?;
    Ok(Json(MessageResponse {
        message: "password updated successfully".into(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn delete_account(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<DeleteAccountRequest>,
) -> Result<StatusCode, ApiError> {
    services::delete_account(&state, user_id, &payload.password).await?;
    Ok(StatusCode::NO_CONTENT)
}
