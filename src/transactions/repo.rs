//! Ledger unit of work.
//!
//! Every balance-moving operation runs inside a database transaction that
//! locks the account row (`SELECT ... FOR UPDATE`) before reading the
//! balance, so concurrent writes for the same user serialize instead of
//! double-spending. Update and delete additionally lock the transaction row
//! first; create only ever takes the account lock, so the lock order is the
//! same everywhere.

use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use time::{Date, OffsetDateTime};

use crate::error::{is_foreign_key_violation, ApiError};

/// Transaction record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    pub category_id: i64,
    #[sqlx(rename = "type")]
    pub kind: String, // "income" or "expense"
    pub amount: Decimal,
    pub description: Option<String>,
    pub date: Date,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Validated values for an insert or full update.
#[derive(Debug, Clone)]
pub struct TransactionInput {
    pub category_id: i64,
    pub kind: String,
    pub amount: Decimal,
    pub description: Option<String>,
    pub date: Date,
}

/// Optional filters for the paginated listing.
#[derive(Debug, Default)]
pub struct TransactionFilter {
    pub from_date: Option<Date>,
    pub to_date: Option<Date>,
    pub category_id: Option<i64>,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
    pub kind: Option<String>,
}

/// Signed contribution of a transaction to the account balance.
pub fn signed_delta(kind: &str, amount: Decimal) -> Decimal {
    if kind == "income" {
        amount
    } else {
        -amount
    }
}

fn category_fk_to_validation(e: sqlx::Error) -> ApiError {
    if is_foreign_key_violation(&e) {
        ApiError::validation("category not found")
    } else {
        ApiError::from(e)
    }
}

impl Transaction {
    /// Insert a transaction and apply its delta to the account balance.
    /// An expense larger than the current balance is rejected.
    pub async fn create(
        db: &PgPool,
        user_id: i64,
        input: &TransactionInput,
    ) -> Result<Transaction, ApiError> {
        let mut tx = db.begin().await?;

        let balance: Decimal =
            sqlx::query_scalar("SELECT balance FROM users WHERE id = $1 FOR UPDATE")
                .bind(user_id)
                .fetch_one(&mut *tx)
                .await?;

        if input.kind == "expense" && input.amount > balance {
            return Err(ApiError::InsufficientFunds);
        }

        let transaction = sqlx::query_as::<_, Transaction>(
            r#"
            INSERT INTO transactions (user_id, category_id, type, amount, description, date)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, category_id, type, amount, description, date,
                      created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(input.category_id)
        .bind(&input.kind)
        .bind(input.amount)
        .bind(input.description.as_deref())
        .bind(input.date)
        .fetch_one(&mut *tx)
        .await
        .map_err(category_fk_to_validation)?;

        sqlx::query("UPDATE users SET balance = balance + $1, updated_at = now() WHERE id = $2")
            .bind(signed_delta(&input.kind, input.amount))
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(transaction)
    }

    pub async fn find_by_id(
        db: &PgPool,
        user_id: i64,
        id: i64,
    ) -> Result<Option<Transaction>, ApiError> {
        let transaction = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT id, user_id, category_id, type, amount, description, date,
                   created_at, updated_at
            FROM transactions
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(transaction)
    }

    /// Filtered page plus the unpaginated total. Newest dates first, with
    /// the id as tiebreaker so pages never overlap.
    pub async fn list(
        db: &PgPool,
        user_id: i64,
        filter: &TransactionFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Transaction>, i64), ApiError> {
        let mut count_qb: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM transactions");
        push_filters(&mut count_qb, user_id, filter);
        let total: i64 = count_qb.build_query_scalar().fetch_one(db).await?;

        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT id, user_id, category_id, type, amount, description, date, \
             created_at, updated_at FROM transactions",
        );
        push_filters(&mut qb, user_id, filter);
        qb.push(" ORDER BY date DESC, id DESC LIMIT ");
        qb.push_bind(limit);
        qb.push(" OFFSET ");
        qb.push_bind(offset);
        let transactions = qb.build_query_as::<Transaction>().fetch_all(db).await?;

        Ok((transactions, total))
    }

    /// Replace a transaction and reconcile the balance: the old delta is
    /// backed out, the new one applied, and the write is rejected if the
    /// result would be negative.
    pub async fn update(
        db: &PgPool,
        user_id: i64,
        id: i64,
        input: &TransactionInput,
    ) -> Result<Transaction, ApiError> {
        let mut tx = db.begin().await?;

        let existing = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT id, user_id, category_id, type, amount, description, date,
                   created_at, updated_at
            FROM transactions
            WHERE id = $1 AND user_id = $2
            FOR UPDATE
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("transaction not found"))?;

        let balance: Decimal =
            sqlx::query_scalar("SELECT balance FROM users WHERE id = $1 FOR UPDATE")
                .bind(user_id)
                .fetch_one(&mut *tx)
                .await?;

        let new_balance = balance - signed_delta(&existing.kind, existing.amount)
            + signed_delta(&input.kind, input.amount);
        if new_balance < Decimal::ZERO {
            return Err(ApiError::InsufficientFunds);
        }

        let transaction = sqlx::query_as::<_, Transaction>(
            r#"
            UPDATE transactions
            SET category_id = $1, type = $2, amount = $3, description = $4,
                date = $5, updated_at = now()
            WHERE id = $6 AND user_id = $7
            RETURNING id, user_id, category_id, type, amount, description, date,
                      created_at, updated_at
            "#,
        )
        .bind(input.category_id)
        .bind(&input.kind)
        .bind(input.amount)
        .bind(input.description.as_deref())
        .bind(input.date)
        .bind(id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(category_fk_to_validation)?;

        sqlx::query("UPDATE users SET balance = $1, updated_at = now() WHERE id = $2")
            .bind(new_balance)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(transaction)
    }

    /// Delete a transaction and back its delta out of the balance. The
    /// reversal is rejected if it would leave the balance negative.
    pub async fn delete(db: &PgPool, user_id: i64, id: i64) -> Result<(), ApiError> {
        let mut tx = db.begin().await?;

        let existing = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT id, user_id, category_id, type, amount, description, date,
                   created_at, updated_at
            FROM transactions
            WHERE id = $1 AND user_id = $2
            FOR UPDATE
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("transaction not found"))?;

        let balance: Decimal =
            sqlx::query_scalar("SELECT balance FROM users WHERE id = $1 FOR UPDATE")
                .bind(user_id)
                .fetch_one(&mut *tx)
                .await?;

        let new_balance = balance - signed_delta(&existing.kind, existing.amount);
        if new_balance < Decimal::ZERO {
            return Err(ApiError::InsufficientFunds);
        }

        sqlx::query("DELETE FROM transactions WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE users SET balance = $1, updated_at = now() WHERE id = $2")
            .bind(new_balance)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, user_id: i64, filter: &TransactionFilter) {
    qb.push(" WHERE user_id = ");
    qb.push_bind(user_id);
    if let Some(from_date) = filter.from_date {
        qb.push(" AND date >= ");
        qb.push_bind(from_date);
    }
    if let Some(to_date) = filter.to_date {
        qb.push(" AND date <= ");
        qb.push_bind(to_date);
    }
    if let Some(category_id) = filter.category_id {
        qb.push(" AND category_id = ");
        qb.push_bind(category_id);
    }
    if let Some(min_amount) = filter.min_amount {
        qb.push(" AND amount >= ");
        qb.push_bind(min_amount);
    }
    if let Some(max_amount) = filter.max_amount {
        qb.push(" AND amount <= ");
        qb.push_bind(max_amount);
    }
    if let Some(kind) = &filter.kind {
        qb.push(" AND type = ");
        qb.push_bind(kind.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn income_adds_and_expense_subtracts() {
        assert_eq!(signed_delta("income", dec!(100.00)), dec!(100.00));
        assert_eq!(signed_delta("expense", dec!(100.00)), dec!(-100.00));
    }

    #[test]
    fn create_then_delete_is_balance_neutral() {
        let start = dec!(500.00);
        let after_create = start + signed_delta("expense", dec!(120.50));
        let after_delete = after_create - signed_delta("expense", dec!(120.50));
        assert_eq!(after_delete, start);
    }

    #[test]
    fn update_reconciliation_guards_against_negative_balance() {
        // Balance 150, an expense of 100 already applied -> 50 left.
        let balance = dec!(50.00);
        let grown = balance - signed_delta("expense", dec!(100.00))
            + signed_delta("expense", dec!(170.00));
        assert_eq!(grown, dec!(-20.00));
        assert!(grown < Decimal::ZERO);

        let shrunk = balance - signed_delta("expense", dec!(100.00))
            + signed_delta("expense", dec!(120.00));
        assert_eq!(shrunk, dec!(30.00));
        assert!(shrunk >= Decimal::ZERO);
    }

    #[test]
    fn flipping_kind_reconciles_both_deltas() {
        // Income 80 on a balance of 100; turning it into an expense 80
        // removes +80 and applies -80.
        let balance = dec!(100.00);
        let flipped =
            balance - signed_delta("income", dec!(80.00)) + signed_delta("expense", dec!(80.00));
        assert_eq!(flipped, dec!(-60.00));
        assert!(flipped < Decimal::ZERO);
    }
}
