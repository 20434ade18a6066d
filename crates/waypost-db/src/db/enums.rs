//! Database enum types with Diesel serialization.
//!
//! Type-safe wrappers for the `redirect` table's CHECK-constrained text
//! columns. Each enum implements `ToSql` and `FromSql` for automatic
//! conversion between Rust and `PostgreSQL`.

use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::pg::{Pg, PgValue};
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Text;
use std::fmt;
use std::io::Write;

/// Which CRM entity kind a mapping's `entity_id` refers to.
///
/// Maps to the `redirect.page_type` CHECK constraint.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    AsExpression,
    FromSqlRow,
    serde::Serialize,
    serde::Deserialize,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "snake_case")]
pub enum PageType {
    Event,
    ContributionPage,
}

impl PageType {
    /// Wire/database representation, also used as the re-keyed query
    /// parameter prefix (`event_id`, `contribution_page_id`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Event => "event",
            Self::ContributionPage => "contribution_page",
        }
    }

    /// The CRM entity name used in API calls for this page type.
    #[must_use]
    pub const fn crm_entity(self) -> &'static str {
        match self {
            Self::Event => "Event",
            Self::ContributionPage => "ContributionPage",
        }
    }
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql<Text, Pg> for PageType {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Pg> for PageType {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        match bytes.as_bytes() {
            b"event" => Ok(Self::Event),
            b"contribution_page" => Ok(Self::ContributionPage),
            _ => Err("Unrecognized enum variant".into()),
        }
    }
}

/// Type of the content item a mapping redirects to.
///
/// Maps to the `redirect.post_type` CHECK constraint.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    AsExpression,
    FromSqlRow,
    serde::Serialize,
    serde::Deserialize,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "snake_case")]
pub enum PostType {
    Post,
    Page,
}

impl PostType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Page => "page",
        }
    }
}

impl fmt::Display for PostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql<Text, Pg> for PostType {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Pg> for PostType {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        match bytes.as_bytes() {
            b"post" => Ok(Self::Post),
            b"page" => Ok(Self::Page),
            _ => Err("Unrecognized enum variant".into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn page_type_serde_uses_snake_case() {
        assert_eq!(
            serde_json::to_string(&PageType::ContributionPage).unwrap(),
            r#""contribution_page""#
        );
        assert_eq!(
            serde_json::from_str::<PageType>(r#""event""#).unwrap(),
            PageType::Event
        );
    }

    #[test]
    fn page_type_crm_entity_names() {
        assert_eq!(PageType::Event.crm_entity(), "Event");
        assert_eq!(PageType::ContributionPage.crm_entity(), "ContributionPage");
    }

    #[test]
    fn post_type_round_trips_through_serde() {
        let parsed: PostType = serde_json::from_str(r#""page""#).unwrap();
        assert_eq!(parsed, PostType::Page);
        assert_eq!(serde_json::to_string(&parsed).unwrap(), r#""page""#);
    }
}
