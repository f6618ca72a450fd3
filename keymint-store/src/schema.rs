//! Schema bootstrap for the license database.

use rusqlite::Connection;

/// Applies connection pragmas and creates missing tables.
pub(crate) fn init(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS license_types (
            id             TEXT PRIMARY KEY,
            name           TEXT NOT NULL UNIQUE,
            description    TEXT NOT NULL DEFAULT '',
            max_instances  INTEGER NOT NULL DEFAULT 1,
            duration_days  INTEGER NOT NULL DEFAULT 365,
            is_active      INTEGER NOT NULL DEFAULT 1
        );

        -- Timestamp columns hold epoch milliseconds.
        CREATE TABLE IF NOT EXISTS licenses (
            id               TEXT PRIMARY KEY,
            key              TEXT NOT NULL UNIQUE,
            owner            TEXT,
            license_type_id  TEXT NOT NULL REFERENCES license_types(id),
            status           TEXT NOT NULL DEFAULT 'pending'
                             CHECK (status IN ('pending', 'active', 'expired', 'revoked')),
            created_at       INTEGER NOT NULL,
            updated_at       INTEGER NOT NULL,
            expires_at       INTEGER,
            last_checked     INTEGER,
            activation_date  INTEGER,
            hardware_id      TEXT,
            max_activations  INTEGER NOT NULL DEFAULT 1,
            notes            TEXT NOT NULL DEFAULT ''
        );

        CREATE INDEX IF NOT EXISTS idx_licenses_status
            ON licenses(status);
        CREATE INDEX IF NOT EXISTS idx_licenses_created
            ON licenses(created_at DESC);
        CREATE INDEX IF NOT EXISTS idx_licenses_expiring
            ON licenses(expires_at) WHERE status = 'active';

        CREATE TABLE IF NOT EXISTS license_checks (
            id           TEXT PRIMARY KEY,
            license_id   TEXT NOT NULL REFERENCES licenses(id) ON DELETE CASCADE,
            timestamp    INTEGER NOT NULL,
            status       TEXT NOT NULL
                         CHECK (status IN ('check_success', 'check_failed',
                                           'activated', 'deactivated', 'revoked')),
            ip_address   TEXT,
            hardware_id  TEXT,
            user_agent   TEXT,
            message      TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_checks_license
            ON license_checks(license_id, timestamp DESC);
        "#,
    )
}
