use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::users::repo::User;

/// Profile snapshot returned by `GET /users/me`.
///
/// Also the payload cached under `users:{id}:me`, hence `Deserialize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeResponse {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub balance: Decimal,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<User> for MeResponse {
    fn from(user: User) -> Self {
        Self {
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            balance: user.balance,
            created_at: user.created_at,
        }
    }
}

/// Partial profile update; omitted fields are left untouched.
#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<User> for ProfileResponse {
    fn from(user: User) -> Self {
        Self {
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateBalanceRequest {
    pub balance: Decimal,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub balance: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub password: String,
    pub new_password: String,
}

/// Account deletion asks for the password again as confirmation.
#[derive(Debug, Deserialize)]
pub struct DeleteAccountRequest {
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn me_response_serializes_balance_as_decimal_string() {
        let resp = MeResponse {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            balance: dec!(1250.50),
            created_at: OffsetDateTime::UNIX_EPOCH,
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["balance"], "1250.50");
        assert_eq!(json["email"], "ada@example.com");
        assert_eq!(json["created_at"], "1970-01-01T00:00:00Z");
    }

    #[test]
    fn me_response_round_trips_for_the_cache() {
        let resp = MeResponse {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            balance: dec!(0.00),
            created_at: OffsetDateTime::UNIX_EPOCH,
        };
        let raw = serde_json::to_string(&resp).unwrap();
        let back: MeResponse = serde_json::from_str(&raw).unwrap();
        assert_eq!(back.balance, dec!(0.00));
        assert_eq!(back.first_name, "Ada");
    }
}
