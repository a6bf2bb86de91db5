//! Billed clients.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::types::ClientId;
use crate::validation::rules::{validate_post_code, validate_rate};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Client {
    pub id: ClientId,
    #[sqlx(rename = "client_name")]
    pub name: String,
    pub hourly_rate: Decimal,
    pub house_number: String,
    pub street_name: String,
    pub city: String,
    pub post_code: String,
    pub email: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Client {
    /// First word of the client name, used to greet them in emails.
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(&self.name)
    }

    pub fn address_lines(&self) -> Vec<String> {
        vec![
            format!("{} {}", self.house_number, self.street_name),
            self.city.clone(),
            self.post_code.clone(),
        ]
    }
}

/// Body for both create and update.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ClientRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(custom(function = "validate_rate"))]
    pub hourly_rate: Decimal,
    #[validate(length(min = 1, max = 20))]
    pub house_number: String,
    #[validate(length(min = 1, max = 200))]
    pub street_name: String,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[validate(custom(function = "validate_post_code"))]
    pub post_code: String,
    #[validate(email)]
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn request() -> ClientRequest {
        ClientRequest {
            name: "Jane Doe".into(),
            hourly_rate: Decimal::from_str("17.50").unwrap(),
            house_number: "12".into(),
            street_name: "High Street".into(),
            city: "Bristol".into(),
            post_code: "BS1 4DJ".into(),
            email: "jane@example.com".into(),
        }
    }

    #[test]
    fn valid_request_passes() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn bad_email_and_rate_are_reported() {
        let mut req = request();
        req.email = "nope".into();
        req.hourly_rate = Decimal::ZERO;
        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("hourly_rate"));
    }

    #[test]
    fn first_name_is_first_word() {
        let now = Utc::now();
        let client = Client {
            id: ClientId::new(),
            name: "Jane Mary Doe".into(),
            hourly_rate: Decimal::ONE,
            house_number: "1".into(),
            street_name: "Road".into(),
            city: "Town".into(),
            post_code: "AB1 2CD".into(),
            email: "j@example.com".into(),
            active: true,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(client.first_name(), "Jane");
    }
}
