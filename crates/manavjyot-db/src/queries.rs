use anyhow::Result;
use chrono::Utc;
use manavjyot_types::models::{Donation, Profile};
use rusqlite::types::Type;
use rusqlite::{Connection, Row};

use crate::Database;
use crate::models::{ProfileUpdate, UserRow, format_timestamp, parse_timestamp};

const USER_COLUMNS: &str =
    "id, email, password, profile, password_reset_token, password_reset_expires, created_at";

impl Database {
    // -- Users --

    /// Inserts a new account. Returns `false` when the email is already registered.
    pub fn create_user(
        &self,
        id: &str,
        email: &str,
        password_hash: &str,
        profile: &Profile,
    ) -> Result<bool> {
        let profile = serde_json::to_string(profile)?;
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (id, email, password, profile, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(email) DO NOTHING",
                (id, normalize_email(email), password_hash, profile, format_timestamp(&Utc::now())),
            )?;
            Ok(inserted == 1)
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", &normalize_email(email)))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    pub fn update_profile(&self, id: &str, email: &str, profile: &Profile) -> Result<ProfileUpdate> {
        let profile = serde_json::to_string(profile)?;
        self.with_conn(|conn| {
            let result = conn.execute(
                "UPDATE users SET email = ?2, profile = ?3 WHERE id = ?1",
                (id, normalize_email(email), profile),
            );
            match result {
                Ok(0) => Ok(ProfileUpdate::NotFound),
                Ok(_) => Ok(ProfileUpdate::Updated),
                Err(e) if is_constraint_violation(&e) => Ok(ProfileUpdate::EmailTaken),
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Replaces the credential hash. Any outstanding reset token is dropped
    /// with it, since it was issued against the old credential.
    pub fn set_password(&self, id: &str, password_hash: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE users
                 SET password = ?2, password_reset_token = NULL, password_reset_expires = NULL
                 WHERE id = ?1",
                (id, password_hash),
            )?;
            Ok(updated == 1)
        })
    }

    pub fn delete_user(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
            Ok(deleted == 1)
        })
    }

    // -- Password reset --

    /// Stores a reset token digest and its expiry on the account with this
    /// email, replacing any earlier token. `None` if no such account exists.
    pub fn set_reset_token(
        &self,
        email: &str,
        token_digest: &str,
        expires_at_ms: i64,
    ) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "UPDATE users
                 SET password_reset_token = ?2, password_reset_expires = ?3
                 WHERE email = ?1
                 RETURNING {USER_COLUMNS}"
            );
            conn.query_row(&sql, (normalize_email(email), token_digest, expires_at_ms), map_user)
                .optional()
        })
    }

    /// Account holding this token digest with an expiry strictly after `now_ms`.
    pub fn find_user_by_reset_token(&self, token_digest: &str, now_ms: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {USER_COLUMNS} FROM users
                 WHERE password_reset_token = ?1 AND password_reset_expires > ?2"
            );
            conn.query_row(&sql, (token_digest, now_ms), map_user).optional()
        })
    }

    /// Swaps in the new credential and clears both token fields in one
    /// conditional statement. Only one caller can win for a given token;
    /// the rest see `None`, as do callers holding an expired token.
    pub fn consume_reset_token(
        &self,
        token_digest: &str,
        now_ms: i64,
        password_hash: &str,
    ) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "UPDATE users
                 SET password = ?3, password_reset_token = NULL, password_reset_expires = NULL
                 WHERE password_reset_token = ?1 AND password_reset_expires > ?2
                 RETURNING {USER_COLUMNS}"
            );
            conn.query_row(&sql, (token_digest, now_ms, password_hash), map_user)
                .optional()
        })
    }

    // -- Donations --

    pub fn insert_donation(&self, donation: &Donation) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO donations (id, donor_id, amount, donated_at) VALUES (?1, ?2, ?3, ?4)",
                (
                    donation.id.to_string(),
                    donation.donor_id.to_string(),
                    i64::try_from(donation.amount)?,
                    format_timestamp(&donation.donated_at),
                ),
            )?;
            Ok(())
        })
    }

    pub fn get_donations_by_donor(&self, donor_id: &str) -> Result<Vec<Donation>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, donor_id, amount, donated_at FROM donations
                 WHERE donor_id = ?1
                 ORDER BY donated_at DESC",
            )?;

            let rows = stmt
                .query_map([donor_id], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter()
                .map(|(id, donor_id, amount, donated_at)| {
                    Ok(Donation {
                        id: id.parse()?,
                        donor_id: donor_id.parse()?,
                        amount: u64::try_from(amount)?,
                        donated_at: parse_timestamp(&donated_at)?,
                    })
                })
                .collect()
        })
    }
}

/// Emails are matched case-insensitively by storing them lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1");
    conn.query_row(&sql, [value], map_user).optional()
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    let profile: String = row.get(3)?;
    let profile = serde_json::from_str(&profile)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;

    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        password: row.get(2)?,
        profile,
        password_reset_token: row.get(4)?,
        password_reset_expires: row.get(5)?,
        created_at: row.get(6)?,
    })
}

pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn db_with_user(email: &str) -> (Database, String) {
        let db = Database::open_in_memory().unwrap();
        let id = Uuid::new_v4().to_string();
        assert!(db.create_user(&id, email, "hash", &Profile::default()).unwrap());
        (db, id)
    }

    #[test]
    fn email_lookup_is_case_insensitive() {
        let (db, id) = db_with_user("Donor@Example.COM");

        let row = db.get_user_by_email("  donor@example.com ").unwrap().unwrap();
        assert_eq!(row.id, id);
        assert_eq!(row.email, "donor@example.com");
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let (db, _) = db_with_user("a@example.com");
        let other = Uuid::new_v4().to_string();
        assert!(!db.create_user(&other, "A@example.com", "hash", &Profile::default()).unwrap());
    }

    #[test]
    fn profile_update_reports_email_collision() {
        let (db, first) = db_with_user("a@example.com");
        let second = Uuid::new_v4().to_string();
        db.create_user(&second, "b@example.com", "hash", &Profile::default()).unwrap();

        let outcome = db.update_profile(&second, "A@EXAMPLE.com", &Profile::default()).unwrap();
        assert_eq!(outcome, ProfileUpdate::EmailTaken);

        let outcome = db.update_profile(&first, "c@example.com", &Profile::default()).unwrap();
        assert_eq!(outcome, ProfileUpdate::Updated);

        let outcome = db.update_profile("missing", "d@example.com", &Profile::default()).unwrap();
        assert_eq!(outcome, ProfileUpdate::NotFound);
    }

    #[test]
    fn reset_token_for_unknown_email_touches_nothing() {
        let (db, id) = db_with_user("a@example.com");
        assert!(db.set_reset_token("nobody@example.com", "digest", 10_000).unwrap().is_none());

        let row = db.get_user_by_id(&id).unwrap().unwrap();
        assert!(row.password_reset_token.is_none());
        assert!(row.password_reset_expires.is_none());
    }

    #[test]
    fn reset_token_lookup_respects_expiry() {
        let (db, id) = db_with_user("a@example.com");
        db.set_reset_token("a@example.com", "digest", 5_000).unwrap().unwrap();

        assert_eq!(db.find_user_by_reset_token("digest", 4_999).unwrap().unwrap().id, id);
        assert!(db.find_user_by_reset_token("digest", 5_000).unwrap().is_none());
        assert!(db.find_user_by_reset_token("other", 0).unwrap().is_none());
    }

    #[test]
    fn consume_clears_token_once() {
        let (db, id) = db_with_user("a@example.com");
        db.set_reset_token("a@example.com", "digest", 5_000).unwrap();

        let row = db.consume_reset_token("digest", 1_000, "new-hash").unwrap().unwrap();
        assert_eq!(row.id, id);
        assert_eq!(row.password, "new-hash");
        assert!(row.password_reset_token.is_none());
        assert!(row.password_reset_expires.is_none());

        assert!(db.consume_reset_token("digest", 1_000, "other-hash").unwrap().is_none());
        assert_eq!(db.get_user_by_id(&id).unwrap().unwrap().password, "new-hash");
    }

    #[test]
    fn set_password_invalidates_outstanding_token() {
        let (db, id) = db_with_user("a@example.com");
        db.set_reset_token("a@example.com", "digest", 5_000).unwrap();

        assert!(db.set_password(&id, "changed").unwrap());
        assert!(db.find_user_by_reset_token("digest", 0).unwrap().is_none());
    }

    #[test]
    fn donations_are_listed_per_donor() {
        let db = Database::open_in_memory().unwrap();
        let donor = Uuid::new_v4();
        for amount in [100, 250] {
            db.insert_donation(&Donation {
                id: Uuid::new_v4(),
                donor_id: donor,
                amount,
                donated_at: Utc::now(),
            })
            .unwrap();
        }

        let donations = db.get_donations_by_donor(&donor.to_string()).unwrap();
        assert_eq!(donations.len(), 2);
        assert_eq!(donations.iter().map(|d| d.amount).sum::<u64>(), 350);
        assert!(db.get_donations_by_donor(&Uuid::new_v4().to_string()).unwrap().is_empty());
    }

    #[test]
    fn deleted_user_is_gone() {
        let (db, id) = db_with_user("a@example.com");
        assert!(db.delete_user(&id).unwrap());
        assert!(!db.delete_user(&id).unwrap());
        assert!(db.get_user_by_id(&id).unwrap().is_none());
    }
}
