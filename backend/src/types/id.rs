//! Typed ID wrappers for compile-time type safety.
//!
//! Every table keyed by a UUID gets its own newtype so a `ClientId` can never
//! be bound where an `InvoiceId` is expected. The wrappers are transparent to
//! sqlx, so they bind to and decode from `UUID` columns directly.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! typed_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
            sqlx::Type,
        )]
        #[serde(transparent)]
        #[sqlx(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random ID.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl utoipa::PartialSchema for $name {
            fn schema() -> utoipa::openapi::RefOr<utoipa::openapi::schema::Schema> {
                utoipa::openapi::schema::ObjectBuilder::new()
                    .schema_type(utoipa::openapi::schema::Type::String)
                    .format(Some(utoipa::openapi::schema::SchemaFormat::KnownFormat(
                        utoipa::openapi::schema::KnownFormat::Uuid,
                    )))
                    .into()
            }
        }

        impl utoipa::ToSchema for $name {}
    };
}

typed_id!(UserId, "Unique identifier for a user.");
typed_id!(ClientId, "Unique identifier for a billed client.");
typed_id!(SellerId, "Unique identifier for an invoice issuer.");
typed_id!(TimesheetId, "Unique identifier for a timesheet entry.");
typed_id!(InvoiceId, "Unique identifier for an invoice.");
typed_id!(InvoiceItemId, "Unique identifier for an invoice line item.");
typed_id!(NumberingSchemeId, "Unique identifier for an invoice numbering scheme.");
typed_id!(TrackingId, "Unique identifier for an email tracking record.");
typed_id!(PasswordResetId, "Unique identifier for a password reset token.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_ids_round_trip_through_strings() {
        let id = ClientId::new();
        let parsed: ClientId = id.to_string().parse().expect("parse id");
        assert_eq!(parsed, id);
    }

    #[test]
    fn typed_ids_serialize_as_plain_uuid_strings() {
        let uuid = Uuid::new_v4();
        let json = serde_json::to_string(&InvoiceId::from_uuid(uuid)).expect("serialize");
        assert_eq!(json, format!("\"{}\"", uuid));
    }

    #[test]
    fn invalid_strings_are_rejected() {
        assert!("not-a-uuid".parse::<SellerId>().is_err());
    }
}
