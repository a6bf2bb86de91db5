//! Invoice issuers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::types::SellerId;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Seller {
    pub id: SellerId,
    pub name: String,
    pub street: String,
    pub postcode: String,
    pub city: String,
    pub service_description: String,
    pub bank_name: Option<String>,
    pub account_number: Option<String>,
    pub sort_code: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company_registration_number: Option<String>,
    pub legal_form: Option<String>,
    pub vat_number: Option<String>,
    pub tax_id: Option<String>,
    pub active: bool,
    pub is_system_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Seller {
    pub fn has_bank_details(&self) -> bool {
        [&self.bank_name, &self.account_number, &self.sort_code]
            .iter()
            .any(|field| field.as_deref().is_some_and(|v| !v.trim().is_empty()))
    }

    /// Label used on invoice lines; falls back to "Service".
    pub fn line_label(&self) -> &str {
        let trimmed = self.service_description.trim();
        if trimmed.is_empty() {
            "Service"
        } else {
            trimmed
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct SellerRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 200))]
    pub street: String,
    #[validate(length(min = 1, max = 50))]
    pub postcode: String,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[validate(length(max = 500))]
    #[serde(default)]
    pub service_description: String,
    #[validate(length(max = 100))]
    pub bank_name: Option<String>,
    #[validate(length(max = 20))]
    pub account_number: Option<String>,
    #[validate(length(max = 10))]
    pub sort_code: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    #[validate(length(max = 50))]
    pub company_registration_number: Option<String>,
    #[validate(length(max = 50))]
    pub legal_form: Option<String>,
    #[validate(length(max = 50))]
    pub vat_number: Option<String>,
    #[validate(length(max = 50))]
    pub tax_id: Option<String>,
    #[serde(default)]
    pub is_system_default: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seller_request_rejects_bad_email() {
        let req: SellerRequest = serde_json::from_value(serde_json::json!({
            "name": "Sparkle Ltd",
            "street": "1 Main St",
            "postcode": "BS1 1AA",
            "city": "Bristol",
            "email": "broken"
        }))
        .unwrap();
        assert!(req.validate().is_err());
        assert!(!req.is_system_default);
    }
}
