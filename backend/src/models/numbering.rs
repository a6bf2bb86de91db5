//! Invoice numbering schemes and per-period counters.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::types::{NumberingSchemeId, SellerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResetPeriod {
    Monthly,
    Yearly,
    Never,
}

impl ResetPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResetPeriod::Monthly => "MONTHLY",
            ResetPeriod::Yearly => "YEARLY",
            ResetPeriod::Never => "NEVER",
        }
    }

    /// `(period_year, period_month)` an invoice dated in `(year, month)` counts against.
    pub fn period_components(&self, year: i32, month: u32) -> (i32, i32) {
        match self {
            ResetPeriod::Monthly => (year, month as i32),
            ResetPeriod::Yearly => (year, 0),
            ResetPeriod::Never => (0, 0),
        }
    }

    /// Counter row key: `YYYY-MM`, `YYYY` or `NEVER`.
    pub fn period_key(&self, year: i32, month: u32) -> String {
        match self {
            ResetPeriod::Monthly => format!("{:04}-{:02}", year, month),
            ResetPeriod::Yearly => format!("{:04}", year),
            ResetPeriod::Never => "NEVER".to_string(),
        }
    }
}

impl fmt::Display for ResetPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResetPeriod {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_uppercase().as_str() {
            "MONTHLY" => Ok(ResetPeriod::Monthly),
            "YEARLY" => Ok(ResetPeriod::Yearly),
            "NEVER" => Ok(ResetPeriod::Never),
            other => Err(format!("unknown reset period '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchemeStatus {
    Active,
    Archived,
    Draft,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct NumberingScheme {
    pub id: NumberingSchemeId,
    pub seller_id: SellerId,
    pub template: String,
    pub reset_period: ResetPeriod,
    pub effective_from: NaiveDate,
    pub version: i32,
    pub status: SchemeStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct InvoiceNumberCounter {
    pub id: Uuid,
    pub seller_id: SellerId,
    pub reset_period: String,
    pub period_key: String,
    pub last_value: i32,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateSchemeRequest {
    pub seller_id: SellerId,
    #[validate(length(min = 1, max = 64))]
    pub template: String,
    pub reset_period: ResetPeriod,
    pub effective_from: NaiveDate,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct PreviewTemplateRequest {
    #[validate(length(min = 1, max = 64))]
    pub template: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PreviewTemplateResponse {
    pub template: String,
    pub preview: String,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct SchemeListQuery {
    pub seller_id: Option<SellerId>,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct CounterListQuery {
    pub seller_id: SellerId,
}
