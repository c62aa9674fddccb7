use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::Date;
use tracing::info;

use crate::cache;
use crate::error::ApiError;
use crate::pagination::{page_offset, parse_limit, parse_page};
use crate::state::AppState;
use crate::transactions::dto::{ListTransactionsQuery, TransactionRequest, TransactionResponse};
use crate::transactions::repo::{Transaction, TransactionFilter, TransactionInput};
use crate::users;

const LIST_CACHE_TTL: Duration = Duration::from_secs(120);
const MAX_DESCRIPTION_LEN: usize = 255;

pub(crate) fn list_cache_prefix(user_id: i64) -> String {
    format!("transactions:{user_id}:")
}

/// One cache entry per distinct filter combination. Absent filters are
/// encoded as empty segments so the key shape stays fixed.
fn list_cache_key(user_id: i64, filter: &TransactionFilter, page: i64, limit: i64) -> String {
    fn segment<T: std::fmt::Display>(value: &Option<T>) -> String {
        value.as_ref().map(T::to_string).unwrap_or_default()
    }
    format!(
        "transactions:{user_id}:{}:{}:{}:{}:{}:{}:{page}:{limit}",
        segment(&filter.from_date),
        segment(&filter.to_date),
        segment(&filter.category_id),
        segment(&filter.min_amount),
        segment(&filter.max_amount),
        segment(&filter.kind),
    )
}

/// List page as stored in the cache.
#[derive(Debug, Serialize, Deserialize)]
struct CachedPage {
    transactions: Vec<TransactionResponse>,
    total: i64,
}

fn parse_date(field: &str, raw: &str) -> Result<Date, ApiError> {
    Date::parse(
        raw,
        time::macros::format_description!("[year]-[month]-[day]"),
    )
    .map_err(|_| ApiError::validation(format!("invalid {field}, expected YYYY-MM-DD")))
}

fn validate_request(input: TransactionRequest) -> Result<TransactionInput, ApiError> {
    if input.category_id < 1 {
        return Err(ApiError::validation("category_id is required"));
    }
    if input.kind != "income" && input.kind != "expense" {
        return Err(ApiError::validation("type must be income or expense"));
    }
    if input.amount <= Decimal::ZERO {
        return Err(ApiError::validation("amount must be greater than zero"));
    }
    // The amount column holds two fractional digits; anything finer would
    // be rounded on insert and can no longer equal what the client sent.
    if input.amount.normalize().scale() > 2 {
        return Err(ApiError::validation(
            "amount must have at most two decimal places",
        ));
    }
    if let Some(description) = &input.description {
        if description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(ApiError::validation(
                "description must be at most 255 characters",
            ));
        }
    }
    let date = parse_date("date", &input.date)?;
    Ok(TransactionInput {
        category_id: input.category_id,
        kind: input.kind,
        amount: input.amount,
        description: input.description,
        date,
    })
}

/// Empty query values count as absent, matching how clients omit filters.
fn present(raw: Option<&str>) -> Option<&str> {
    raw.filter(|s| !s.is_empty())
}

fn parse_filters(query: &ListTransactionsQuery) -> Result<TransactionFilter, ApiError> {
    let from_date = present(query.from_date.as_deref())
        .map(|raw| parse_date("from_date", raw))
        .transpose()?;
    let to_date = present(query.to_date.as_deref())
        .map(|raw| parse_date("to_date", raw))
        .transpose()?;
    let category_id = present(query.category_id.as_deref())
        .map(|raw| {
            raw.parse::<i64>()
                .map_err(|_| ApiError::validation("invalid category_id"))
        })
        .transpose()?;
    let min_amount = present(query.min_amount.as_deref())
        .map(|raw| {
            raw.parse::<Decimal>()
                .map_err(|_| ApiError::validation("invalid min_amount"))
        })
        .transpose()?;
    let max_amount = present(query.max_amount.as_deref())
        .map(|raw| {
            raw.parse::<Decimal>()
                .map_err(|_| ApiError::validation("invalid max_amount"))
        })
        .transpose()?;
    let kind = match present(query.kind.as_deref()) {
        Some("income") => Some("income".to_string()),
        Some("expense") => Some("expense".to_string()),
        Some(_) => {
            return Err(ApiError::validation("type must be income or expense"));
        }
        None => None,
    };
    Ok(TransactionFilter {
        from_date,
        to_date,
        category_id,
        min_amount,
        max_amount,
        kind,
    })
}

/// Ledger writes move the balance, so they drop both the cached list pages
/// and the cached profile snapshot.
async fn invalidate_after_write(state: &AppState, user_id: i64) {
    cache::invalidate(state.cache.as_ref(), &list_cache_prefix(user_id)).await;
    cache::invalidate(
        state.cache.as_ref(),
        &users::services::profile_cache_prefix(user_id),
    )
    .await;
}

pub async fn create(
    state: &AppState,
    user_id: i64,
    payload: TransactionRequest,
) -> Result<TransactionResponse, ApiError> {
    let input = validate_request(payload)?;
    let transaction = Transaction::create(&state.db, user_id, &input).await?;
    invalidate_after_write(state, user_id).await;
    info!(
        user_id,
        transaction_id = transaction.id,
        kind = %transaction.kind,
        "transaction created"
    );
    Ok(TransactionResponse::from(transaction))
}

pub async fn get(
    state: &AppState,
    user_id: i64,
    transaction_id: i64,
) -> Result<TransactionResponse, ApiError> {
    let transaction = Transaction::find_by_id(&state.db, user_id, transaction_id)
        .await?
        .ok_or_else(|| ApiError::not_found("transaction not found"))?;
    Ok(TransactionResponse::from(transaction))
}

/// Filtered, paginated listing with a read-through cache.
pub async fn list(
    state: &AppState,
    user_id: i64,
    query: ListTransactionsQuery,
) -> Result<(Vec<TransactionResponse>, i64, i64, i64), ApiError> {
    let filter = parse_filters(&query)?;
    let page = parse_page(query.page.as_deref());
    let limit = parse_limit(query.limit.as_deref());

    let key = list_cache_key(user_id, &filter, page, limit);
    if let Some(cached) = cache::get_json::<CachedPage>(state.cache.as_ref(), &key).await {
        return Ok((cached.transactions, cached.total, page, limit));
    }

    let offset = page_offset(page, limit);
    let (transactions, total) =
        Transaction::list(&state.db, user_id, &filter, limit, offset).await?;
    let transactions: Vec<TransactionResponse> = transactions
        .into_iter()
        .map(TransactionResponse::from)
        .collect();

    cache::put_json(
        state.cache.as_ref(),
        &key,
        &CachedPage {
            transactions: transactions.clone(),
            total,
        },
        LIST_CACHE_TTL,
    )
    .await;

    Ok((transactions, total, page, limit))
}

pub async fn update(
    state: &AppState,
    user_id: i64,
    transaction_id: i64,
    payload: TransactionRequest,
) -> Result<TransactionResponse, ApiError> {
    let input = validate_request(payload)?;
    let transaction = Transaction::update(&state.db, user_id, transaction_id, &input).await?;
    invalidate_after_write(state, user_id).await;
    info!(user_id, transaction_id, "transaction updated");
    Ok(TransactionResponse::from(transaction))
}

pub async fn delete(state: &AppState, user_id: i64, transaction_id: i64) -> Result<(), ApiError> {
    Transaction::delete(&state.db, user_id, transaction_id).await?;
    invalidate_after_write(state, user_id).await;
    info!(user_id, transaction_id, "transaction deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use time::macros::date;

    fn request(kind: &str, amount: Decimal, date: &str) -> TransactionRequest {
        TransactionRequest {
            category_id: 1,
            kind: kind.into(),
            amount,
            description: None,
            date: date.into(),
        }
    }

    #[test]
    fn accepts_a_well_formed_request() {
        let input = validate_request(request("income", dec!(10.00), "2024-03-01")).unwrap();
        assert_eq!(input.kind, "income");
        assert_eq!(input.date, date!(2024 - 03 - 01));
    }

    #[test]
    fn rejects_unknown_kind_zero_amount_and_bad_date() {
        assert!(validate_request(request("transfer", dec!(10.00), "2024-03-01")).is_err());
        assert!(validate_request(request("income", dec!(0.00), "2024-03-01")).is_err());
        assert!(validate_request(request("income", dec!(-5.00), "2024-03-01")).is_err());
        assert!(validate_request(request("income", dec!(10.00), "03/01/2024")).is_err());
        assert!(validate_request(request("income", dec!(10.00), "2024-13-01")).is_err());
    }

    #[test]
    fn rejects_amounts_finer_than_cents() {
        assert!(validate_request(request("expense", dec!(0.001), "2024-03-01")).is_err());
        assert!(validate_request(request("income", dec!(10.005), "2024-03-01")).is_err());
        assert!(validate_request(request("income", dec!(10.50), "2024-03-01")).is_ok());
        // trailing zeros are presentation, not precision
        assert!(validate_request(request("income", dec!(10.500), "2024-03-01")).is_ok());
    }

    #[test]
    fn rejects_oversized_descriptions() {
        let mut payload = request("income", dec!(10.00), "2024-03-01");
        payload.description = Some("x".repeat(256));
        assert!(validate_request(payload).is_err());
    }

    #[test]
    fn filter_parsing_is_strict_for_typed_fields() {
        let query = ListTransactionsQuery {
            from_date: Some("2024-01-01".into()),
            to_date: Some("2024-12-31".into()),
            category_id: Some("7".into()),
            min_amount: Some("5.50".into()),
            max_amount: Some("100".into()),
            kind: Some("expense".into()),
            ..Default::default()
        };
        let filter = parse_filters(&query).unwrap();
        assert_eq!(filter.from_date, Some(date!(2024 - 01 - 01)));
        assert_eq!(filter.category_id, Some(7));
        assert_eq!(filter.min_amount, Some(dec!(5.50)));
        assert_eq!(filter.kind.as_deref(), Some("expense"));

        let bad_date = ListTransactionsQuery {
            from_date: Some("not-a-date".into()),
            ..Default::default()
        };
        assert!(parse_filters(&bad_date).is_err());

        let bad_kind = ListTransactionsQuery {
            kind: Some("transfer".into()),
            ..Default::default()
        };
        assert!(parse_filters(&bad_kind).is_err());
    }

    #[test]
    fn empty_filter_values_count_as_absent() {
        let query = ListTransactionsQuery {
            from_date: Some("".into()),
            category_id: Some("".into()),
            kind: Some("".into()),
            ..Default::default()
        };
        let filter = parse_filters(&query).unwrap();
        assert_eq!(filter.from_date, None);
        assert_eq!(filter.category_id, None);
        assert_eq!(filter.kind, None);
    }

    #[test]
    fn cache_key_embeds_every_filter_segment() {
        let filter = TransactionFilter {
            from_date: Some(date!(2024 - 01 - 01)),
            to_date: None,
            category_id: Some(7),
            min_amount: None,
            max_amount: Some(dec!(100.00)),
            kind: Some("expense".into()),
        };
        assert_eq!(
            list_cache_key(4, &filter, 2, 20),
            "transactions:4:2024-01-01::7::100.00:expense:2:20"
        );
        assert_eq!(
            list_cache_key(4, &TransactionFilter::default(), 1, 10),
            "transactions:4:::::::1:10"
        );
        assert!(list_cache_key(4, &filter, 1, 10).starts_with(&list_cache_prefix(4)));
        assert!(!list_cache_key(40, &filter, 1, 10).starts_with(&list_cache_prefix(4)));
    }
}
