use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};

use crate::error::{is_foreign_key_violation, ApiError};

/// Category record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct Category {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
}

impl Category {
    pub async fn create(db: &PgPool, user_id: i64, name: &str) -> Result<Category, ApiError> {
        let category = sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (user_id, name)
            VALUES ($1, $2)
            RETURNING id, user_id, name
            "#,
        )
        .bind(user_id)
        .bind(name)
        .fetch_one(db)
        .await?;
        Ok(category)
    }

    /// Page of the user's categories plus the unpaginated total.
    /// `search` is a case-insensitive substring match on the name.
    pub async fn list(
        db: &PgPool,
        user_id: i64,
        search: &str,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Category>, i64), ApiError> {
        let mut count_qb: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM categories WHERE user_id = ");
        count_qb.push_bind(user_id);
        if !search.is_empty() {
            count_qb.push(" AND name ILIKE ");
            count_qb.push_bind(format!("%{search}%"));
        }
        let total: i64 = count_qb.build_query_scalar().fetch_one(db).await?;

        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT id, user_id, name FROM categories WHERE user_id = ");
        qb.push_bind(user_id);
        if !search.is_empty() {
            qb.push(" AND name ILIKE ");
            qb.push_bind(format!("%{search}%"));
        }
        qb.push(" ORDER BY name LIMIT ");
        qb.push_bind(limit);
        qb.push(" OFFSET ");
        qb.push_bind(offset);
        let categories = qb.build_query_as::<Category>().fetch_all(db).await?;

        Ok((categories, total))
    }

    /// Rename, scoped to the owner.
    pub async fn update(
        db: &PgPool,
        id: i64,
        user_id: i64,
        name: &str,
    ) -> Result<Category, ApiError> {
        let category = sqlx::query_as::<_, Category>(
            r#"
            UPDATE categories
            SET name = $1, updated_at = now()
            WHERE id = $2 AND user_id = $3
            RETURNING id, user_id, name
            "#,
        )
        .bind(name)
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| ApiError::not_found("category not found"))?;
        Ok(category)
    }

    /// Delete, scoped to the owner. Categories still referenced by
    /// transactions are kept and reported as a conflict.
    pub async fn delete(db: &PgPool, id: i64, user_id: i64) -> Result<(), ApiError> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(db)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    ApiError::conflict("category still has transactions")
                } else {
                    ApiError::from(e)
                }
            })?;
        if result.rows_affected() == 0 {
            return Err(ApiError::not_found("category not found"));
        }
        Ok(())
    }
}
