use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id                      TEXT PRIMARY KEY,
                email                   TEXT NOT NULL UNIQUE,
                password                TEXT NOT NULL,
                profile                 TEXT NOT NULL,
                password_reset_token    TEXT,
                password_reset_expires  INTEGER,
                created_at              TEXT NOT NULL,
                -- token and expiry are set and cleared together
                CHECK ((password_reset_token IS NULL) = (password_reset_expires IS NULL))
            );

            CREATE UNIQUE INDEX idx_users_reset_token
                ON users(password_reset_token)
                WHERE password_reset_token IS NOT NULL;

            CREATE TABLE campaigns (
                id           TEXT PRIMARY KEY,
                title        TEXT NOT NULL,
                description  TEXT NOT NULL,
                event_date   TEXT NOT NULL,
                address      TEXT NOT NULL DEFAULT '',
                city         TEXT NOT NULL DEFAULT '',
                pin          TEXT NOT NULL DEFAULT '',
                state        TEXT NOT NULL DEFAULT '',
                doctors      TEXT NOT NULL DEFAULT '[]',
                patients     TEXT NOT NULL DEFAULT '[]',
                version      INTEGER NOT NULL DEFAULT 0,
                created_at   TEXT NOT NULL,
                updated_at   TEXT NOT NULL
            );

            CREATE INDEX idx_campaigns_listing
                ON campaigns(created_at DESC, event_date DESC);

            CREATE TABLE donations (
                id          TEXT PRIMARY KEY,
                donor_id    TEXT NOT NULL,
                amount      INTEGER NOT NULL CHECK (amount > 0),
                donated_at  TEXT NOT NULL
            );

            CREATE INDEX idx_donations_donor
                ON donations(donor_id, donated_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
