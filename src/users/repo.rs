use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;

use crate::error::{is_unique_violation, ApiError};

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String, // Argon2 hash, never exposed in JSON
    pub balance: Decimal,
    pub failed_logins: i32,
    pub locked_until: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl User {
    pub async fn create(
        db: &PgPool,
        first_name: &str,
        last_name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, ApiError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (first_name, last_name, email, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING id, first_name, last_name, email, password_hash, balance,
                      failed_logins, locked_until, created_at, updated_at
            "#,
        )
        .bind(first_name)
        .bind(last_name)
        .bind(email)
        .bind(password_hash)
        .fetch_one(db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ApiError::conflict("email already registered")
            } else {
                e.into()
            }
        })
    }

    /// Find a user by email.
    pub async fn find_by_email(db: &PgPool, email: &str) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, first_name, last_name, email, password_hash, balance,
                   failed_logins, locked_until, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: i64) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, first_name, last_name, email, password_hash, balance,
                   failed_logins, locked_until, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Partial profile update. `None` fields keep their current value.
    pub async fn update_profile(
        db: &PgPool,
        id: i64,
        first_name: Option<&str>,
        last_name: Option<&str>,
        email: Option<&str>,
    ) -> Result<User, ApiError> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET first_name = COALESCE($1, first_name),
                last_name = COALESCE($2, last_name),
                email = COALESCE($3, email),
                updated_at = now()
            WHERE id = $4
            RETURNING id, first_name, last_name, email, password_hash, balance,
                      failed_logins, locked_until, created_at, updated_at
            "#,
        )
        .bind(first_name)
        .bind(last_name)
        .bind(email)
        .bind(id)
        .fetch_one(db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ApiError::conflict("email already registered")
            } else {
                e.into()
            }
        })
    }

    pub async fn update_password(db: &PgPool, id: i64, password_hash: &str) -> Result<(), ApiError> {
        sqlx::query("UPDATE users SET password_hash = $1, updated_at = now() WHERE id = $2")
            .bind(password_hash)
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Direct balance override, outside the ledger flow.
    pub async fn set_balance(db: &PgPool, id: i64, balance: Decimal) -> Result<User, ApiError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET balance = $1, updated_at = now()
            WHERE id = $2
            RETURNING id, first_name, last_name, email, password_hash, balance,
                      failed_logins, locked_until, created_at, updated_at
            "#,
        )
        .bind(balance)
        .bind(id)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    pub async fn delete(db: &PgPool, id: i64) -> Result<(), ApiError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ApiError::not_found("user not found"));
        }
        Ok(())
    }

    /// Bump the failed login counter and return the new count.
    pub async fn increment_failed_logins(db: &PgPool, id: i64) -> Result<i32, ApiError> {
        let count: i32 = sqlx::query_scalar(
            r#"
            UPDATE users
            SET failed_logins = failed_logins + 1, updated_at = now()
            WHERE id = $1
            RETURNING failed_logins
            "#,
        )
        .bind(id)
        .fetch_one(db)
        .await?;
        Ok(count)
    }

    pub async fn lock_until(db: &PgPool, id: i64, until: OffsetDateTime) -> Result<(), ApiError> {
        sqlx::query("UPDATE users SET locked_until = $1, updated_at = now() WHERE id = $2")
            .bind(until)
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Clear the failed login counter and any active lock.
    pub async fn reset_lockout(db: &PgPool, id: i64) -> Result<(), ApiError> {
        sqlx::query(
            "UPDATE users SET failed_logins = 0, locked_until = NULL, updated_at = now() \
             WHERE id = $1",
        )
        .bind(id)
        .execute(db)
        .await?;
        Ok(())
    }
}
