use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{info, warn};

use crate::auth::dto::{LoginResponse, RegisterRequest};
use crate::auth::jwt::JwtKeys;
use crate::auth::password::{hash_password, verify_password};
use crate::error::ApiError;
use crate::state::AppState;
use crate::users::repo::User;

pub(crate) const PASSWORD_MIN_LEN: usize = 6;

/// Failed attempts tolerated before the account is locked.
const MAX_FAILED_LOGINS: i32 = 5;
const LOCKOUT_MINUTES: i64 = 10;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn validate_name(field: &str, value: &str) -> Result<(), ApiError> {
    let len = value.chars().count();
    if len < 2 || len > 50 {
        return Err(ApiError::validation(format!(
            "{field} must be between 2 and 50 characters"
        )));
    }
    Ok(())
}

pub async fn register(state: &AppState, mut input: RegisterRequest) -> Result<(), ApiError> {
    validate_name("first_name", &input.first_name)?;
    validate_name("last_name", &input.last_name)?;

    input.email = normalize_email(&input.email);
    if !is_valid_email(&input.email) {
        return Err(ApiError::validation("invalid email"));
    }
    if input.password.len() < PASSWORD_MIN_LEN {
        return Err(ApiError::validation("password must be at least 6 characters"));
    }

    let hash = hash_password(&input.password)?;
    let user = User::create(
        &state.db,
        &input.first_name,
        &input.last_name,
        &input.email,
        &hash,
    )
    .await?;
    info!(user_id = user.id, "user registered");
    Ok(())
}

pub async fn login(state: &AppState, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
    let email = normalize_email(email);
    if !is_valid_email(&email) {
        return Err(ApiError::validation("invalid email"));
    }

    let Some(user) = User::find_by_email(&state.db, &email).await? else {
        warn!("login with unknown email");
        return Err(ApiError::unauthenticated("invalid credentials"));
    };

    let now = OffsetDateTime::now_utc();
    if let Some(locked_until) = user.locked_until {
        if locked_until > now {
            warn!(user_id = user.id, "login attempt on locked account");
            return Err(ApiError::account_locked("account locked, try again later"));
        }
        // The lock has expired; clear it before checking the password so the
        // counter restarts from zero.
        User::reset_lockout(&state.db, user.id).await?;
    }

    if !verify_password(password, &user.password_hash)? {
        let failed = User::increment_failed_logins(&state.db, user.id).await?;
        if failed >= MAX_FAILED_LOGINS {
            let until = now + TimeDuration::minutes(LOCKOUT_MINUTES);
            User::lock_until(&state.db, user.id, until).await?;
            warn!(user_id = user.id, failed, "account locked after failed logins");
            return Err(ApiError::account_locked("account locked for 10 minutes"));
        }
        warn!(user_id = user.id, failed, "invalid password");
        return Err(ApiError::unauthenticated("invalid credentials"));
    }

    if user.failed_logins > 0 || user.locked_until.is_some() {
        User::reset_lockout(&state.db, user.id).await?;
    }

    let keys = JwtKeys::from_ref(state);
    let access_token = keys.sign_access(user.id)?;
    let refresh_token = keys.sign_refresh(user.id)?;
    info!(user_id = user.id, "login ok");
    Ok(LoginResponse {
        access_token,
        refresh_token,
    })
}

/// Mint a fresh access token from a valid refresh token. No database state
/// is consulted, so a lockout does not cut short already-issued sessions.
pub fn refresh(state: &AppState, refresh_token: &str) -> Result<String, ApiError> {
    let keys = JwtKeys::from_ref(state);
    let claims = keys
        .verify_refresh(refresh_token)
        .map_err(|_| ApiError::unauthenticated("invalid refresh token"))?;
    let token = keys.sign_access(claims.sub)?;
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_reasonable_emails() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("first.last+tag@sub.domain.org"));
    }

    #[test]
    fn rejects_malformed_emails() {
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("spaces in@example.com"));
        assert!(!is_valid_email("user@nodot"));
        assert!(!is_valid_email("user@@example.com"));
    }

    #[test]
    fn normalizes_case_and_whitespace() {
        assert_eq!(normalize_email("  User@Example.COM "), "user@example.com");
    }

    #[test]
    fn name_length_bounds() {
        assert!(validate_name("first_name", "A").is_err());
        assert!(validate_name("first_name", "Al").is_ok());
        assert!(validate_name("first_name", &"x".repeat(50)).is_ok());
        assert!(validate_name("first_name", &"x".repeat(51)).is_err());
    }

    #[tokio::test]
    async fn refresh_rejects_access_tokens() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let access = keys.sign_access(1).expect("sign access");
        let err = refresh(&state, &access).unwrap_err();
        assert!(matches!(err, ApiError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn refresh_accepts_refresh_tokens() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let token = keys.sign_refresh(1).expect("sign refresh");
        let access = refresh(&state, &token).expect("refresh should succeed");
        let claims = keys.verify(&access).expect("verify");
        assert_eq!(claims.sub, 1);
    }
}
