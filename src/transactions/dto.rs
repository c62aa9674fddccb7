use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use super::repo::Transaction;

time::serde::format_description!(date_format, Date, "[year]-[month]-[day]");

/// Body for create and full update. `date` is a plain `YYYY-MM-DD` string
/// and is validated in the service layer.
#[derive(Debug, Deserialize)]
pub struct TransactionRequest {
    pub category_id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub amount: Decimal,
    #[serde(default)]
    pub description: Option<String>,
    pub date: String,
}

/// Serialized transaction. Deserialize is derived as well because list
/// pages round-trip through the cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionResponse {
    pub id: i64,
    pub category_id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub amount: Decimal,
    pub description: Option<String>,
    #[serde(with = "date_format")]
    pub date: Date,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<Transaction> for TransactionResponse {
    fn from(transaction: Transaction) -> Self {
        Self {
            id: transaction.id,
            category_id: transaction.category_id,
            kind: transaction.kind,
            amount: transaction.amount,
            description: transaction.description,
            date: transaction.date,
            created_at: transaction.created_at,
            updated_at: transaction.updated_at,
        }
    }
}

/// Raw query string filters. Dates, amounts and the category id are parsed
/// strictly in the service layer; page and limit fall back to defaults.
#[derive(Debug, Default, Deserialize)]
pub struct ListTransactionsQuery {
    pub from_date: Option<String>,
    pub to_date: Option<String>,
    pub category_id: Option<String>,
    pub min_amount: Option<String>,
    pub max_amount: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use time::macros::{date, datetime};

    fn sample() -> TransactionResponse {
        TransactionResponse {
            id: 9,
            category_id: 3,
            kind: "expense".into(),
            amount: dec!(42.75),
            description: Some("groceries".into()),
            date: date!(2024 - 01 - 15),
            created_at: datetime!(2024-01-15 12:00:00 UTC),
            updated_at: datetime!(2024-01-15 12:00:00 UTC),
        }
    }

    #[test]
    fn response_uses_wire_field_names() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["type"], "expense");
        assert_eq!(json["amount"], "42.75");
        assert_eq!(json["date"], "2024-01-15");
        assert_eq!(json["created_at"], "2024-01-15T12:00:00Z");
    }

    #[test]
    fn response_round_trips_through_json() {
        let serialized = serde_json::to_string(&sample()).unwrap();
        let back: TransactionResponse = serde_json::from_str(&serialized).unwrap();
        assert_eq!(back.id, 9);
        assert_eq!(back.amount, dec!(42.75));
        assert_eq!(back.date, date!(2024 - 01 - 15));
    }

    #[test]
    fn request_accepts_string_amounts() {
        let request: TransactionRequest = serde_json::from_str(
            r#"{"category_id":1,"type":"income","amount":"100.50","date":"2024-02-01"}"#,
        )
        .unwrap();
        assert_eq!(request.amount, dec!(100.50));
        assert_eq!(request.description, None);
    }
}
