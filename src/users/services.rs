use std::time::Duration;

use tracing::info;

use crate::auth::password::{hash_password, verify_password};
use crate::auth::services::{is_valid_email, normalize_email, validate_name, PASSWORD_MIN_LEN};
use crate::cache;
use crate::error::ApiError;
use crate::state::AppState;
use crate::users::dto::{
    BalanceResponse, ChangePasswordRequest, MeResponse, ProfileResponse, UpdateProfileRequest,
};
use crate::users::repo::User;
use crate::{categories, transactions};

const PROFILE_CACHE_TTL: Duration = Duration::from_secs(300);

/// Bcrypt-era ceiling kept on password changes so very long inputs are
/// rejected up front.
const PASSWORD_MAX_LEN: usize = 72;

pub(crate) fn profile_cache_key(user_id: i64) -> String {
    format!("users:{user_id}:me")
}

pub(crate) fn profile_cache_prefix(user_id: i64) -> String {
    format!("users:{user_id}:")
}

pub async fn get_me(state: &AppState, user_id: i64) -> Result<MeResponse, ApiError> {
    let key = profile_cache_key(user_id);
    if let Some(cached) = cache::get_json::<MeResponse>(state.cache.as_ref(), &key).await {
        return Ok(cached);
    }

    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("user not found"))?;
    let resp = MeResponse::from(user);
    cache::put_json(state.cache.as_ref(), &key, &resp, PROFILE_CACHE_TTL).await;
    Ok(resp)
}

pub async fn update_profile(
    state: &AppState,
    user_id: i64,
    input: UpdateProfileRequest,
) -> Result<ProfileResponse, ApiError> {
    if let Some(first_name) = &input.first_name {
        validate_name("first_name", first_name)?;
    }
    if let Some(last_name) = &input.last_name {
        validate_name("last_name", last_name)?;
    }
    let email = match &input.email {
        Some(raw) => {
            let email = normalize_email(raw);
            if !is_valid_email(&email) {
                return Err(ApiError::validation("invalid email"));
            }
            Some(email)
        }
        None => None,
    };

    let user = User::update_profile(
        &state.db,
        user_id,
        input.first_name.as_deref(),
        input.last_name.as_deref(),
        email.as_deref(),
    )
    .await?;
    cache::invalidate(state.cache.as_ref(), &profile_cache_prefix(user_id)).await;
    Ok(ProfileResponse::from(user))
}

pub async fn set_balance(
    state: &AppState,
    user_id: i64,
    balance: rust_decimal::Decimal,
) -> Result<BalanceResponse, ApiError> {
    let user = User::set_balance(&state.db, user_id, balance).await?;
    cache::invalidate(state.cache.as_ref(), &profile_cache_prefix(user_id)).await;
    info!(user_id, "balance overridden");
    Ok(BalanceResponse {
        balance: user.balance,
    })
}

pub async fn change_password(
    state: &AppState,
    user_id: i64,
    input: ChangePasswordRequest,
) -> Result<(), ApiError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("user not found"))?;

    if !verify_password(&input.password, &user.password_hash)? {
        return Err(ApiError::unauthenticated("current password is incorrect"));
    }
    if input.new_password.len() < PASSWORD_MIN_LEN {
        return Err(ApiError::validation(
            "new password must be at least 6 characters",
        ));
    }
    if input.new_password.len() > PASSWORD_MAX_LEN {
        return Err(ApiError::validation(
            "new password must be at most 72 characters",
        ));
    }
    if input.new_password == input.password {
        return Err(ApiError::validation(
            "new password must differ from the current one",
        ));
    }

    let hash = hash_password(&input.new_password)?;
    User::update_password(&state.db, user_id, &hash).await?;
    cache::invalidate(state.cache.as_ref(), &profile_cache_prefix(user_id)).await;
    info!(user_id, "password updated");
    Ok(())
}

/// Deletes the account after re-checking the password. Categories and
/// transactions go with it via `ON DELETE CASCADE`.
pub async fn delete_account(state: &AppState, user_id: i64, password: &str) -> Result<(), ApiError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("user not found"))?;

    if !verify_password(password, &user.password_hash)? {
        return Err(ApiError::unauthenticated("password is incorrect"));
    }

    User::delete(&state.db, user_id).await?;
    cache::invalidate(state.cache.as_ref(), &profile_cache_prefix(user_id)).await;
    cache::invalidate(
        state.cache.as_ref(),
        &categories::services::list_cache_prefix(user_id),
    )
    .await;
    cache::invalidate(
        state.cache.as_ref(),
        &transactions::services::list_cache_prefix(user_id),
    )
    .await;
    info!(user_id, "account deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_keys_are_scoped_per_user() {
        assert_eq!(profile_cache_key(7), "users:7:me");
        assert_eq!(profile_cache_prefix(7), "users:7:");
        assert!(profile_cache_key(7).starts_with(&profile_cache_prefix(7)));
        // Prefix for user 1 must not sweep user 10's entries.
        assert!(!profile_cache_key(10).starts_with(&profile_cache_prefix(1)));
    }
}
