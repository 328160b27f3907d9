//! Database row types. Distinct from the manavjyot-types API models so the
//! credential and reset-token columns never reach a response body by accident.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use manavjyot_types::models::{Campaign, Profile, User};

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub password: String,
    pub profile: Profile,
    /// SHA-256 hex digest of the outstanding reset token, if any.
    pub password_reset_token: Option<String>,
    /// Epoch milliseconds. Present exactly when `password_reset_token` is.
    pub password_reset_expires: Option<i64>,
    pub created_at: String,
}

impl UserRow {
    pub fn to_user(&self) -> Result<User> {
        Ok(User {
            id: self.id.parse().with_context(|| format!("corrupt user id '{}'", self.id))?,
            email: self.email.clone(),
            profile: self.profile.clone(),
            created_at: parse_timestamp(&self.created_at)
                .with_context(|| format!("user '{}'", self.id))?,
        })
    }
}

/// A campaign document together with the version it was read at.
#[derive(Debug, Clone)]
pub struct CampaignRecord {
    pub campaign: Campaign,
    pub version: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileUpdate {
    Updated,
    EmailTaken,
    NotFound,
}

/// Fixed-width RFC 3339 in UTC, so text ordering in SQL matches time ordering.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Timestamps are written as RFC 3339. Rows written by hand through the
/// sqlite shell tend to use `datetime('now')`, so accept that too.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc()))
        .with_context(|| format!("corrupt timestamp '{}'", raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_rfc3339_and_sqlite_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-03-01T09:30:00Z").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-03-01 09:30:00").unwrap(), expected);
    }

    #[test]
    fn corrupt_timestamp_is_an_error() {
        let err = parse_timestamp("garbage").unwrap_err();
        assert!(err.to_string().contains("garbage"));
    }
}
