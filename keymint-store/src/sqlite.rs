//! SQLite-backed [`LicenseStore`].

use crate::schema;
use chrono::{DateTime, Duration, Utc};
use keymint_core::{
    CheckId, CheckStatus, License, LicenseCheck, LicenseId, LicenseOrder, LicenseStatus,
    LicenseStore, LicenseType, LicenseTypeId, SearchFilter, StoreError, StoreResult,
};
use rusqlite::{Connection, OptionalExtension, Row, ToSql, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

const LICENSE_COLUMNS: &str = "id, key, owner, license_type_id, status, created_at, updated_at, \
     expires_at, last_checked, activation_date, hardware_id, max_activations, notes";

const CHECK_COLUMNS: &str =
    "id, license_id, timestamp, status, ip_address, hardware_id, user_agent, message";

/// SQLite-backed store.
///
/// All access is serialized behind a single connection, which gives the
/// guard-then-mutate sequences of the service at most one winner per row.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens a store at the given path, creating the database and schema
    /// when missing.
    ///
    /// # Errors
    ///
    /// Returns a backend fault when the file cannot be opened or the schema
    /// cannot be applied.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path).map_err(backend)?;
        Self::from_connection(conn)
    }

    /// Opens an in-memory store. Data is gone when the store drops.
    ///
    /// # Errors
    ///
    /// Returns a backend fault when the schema cannot be applied.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(backend)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        schema::init(&conn).map_err(backend)?;
        debug!("license schema ready");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Backend("connection mutex poisoned".to_string()))
    }
}

impl LicenseStore for SqliteStore {
    fn insert_license_type(&self, record: &LicenseType) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO license_types (id, name, description, max_instances, duration_days, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.id.to_string(),
                record.name,
                record.description,
                record.max_instances,
                record.duration_days,
                record.is_active,
            ],
        )
        .map_err(backend)?;
        Ok(())
    }

    fn license_type(&self, id: LicenseTypeId) -> StoreResult<Option<LicenseType>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, name, description, max_instances, duration_days, is_active
             FROM license_types WHERE id = ?1",
            params![id.to_string()],
            |row| read_license_type(row),
        )
        .optional()
        .map_err(backend)
    }

    fn update_license_type(&self, record: &LicenseType) -> StoreResult<bool> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE license_types
                 SET name = ?2, description = ?3, max_instances = ?4,
                     duration_days = ?5, is_active = ?6
                 WHERE id = ?1",
                params![
                    record.id.to_string(),
                    record.name,
                    record.description,
                    record.max_instances,
                    record.duration_days,
                    record.is_active,
                ],
            )
            .map_err(backend)?;
        Ok(changed > 0)
    }

    fn insert_license(&self, record: &License) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO licenses
             (id, key, owner, license_type_id, status, created_at, updated_at,
              expires_at, last_checked, activation_date, hardware_id, max_activations, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                record.id.to_string(),
                record.key,
                record.owner,
                record.license_type_id.to_string(),
                record.status.as_str(),
                ts(record.created_at),
                ts(record.updated_at),
                opt_ts(record.expires_at),
                opt_ts(record.last_checked),
                opt_ts(record.activation_date),
                record.hardware_id,
                record.max_activations,
                record.notes,
            ],
        )
        .map_err(|err| insert_license_err(&record.key, err))?;
        Ok(())
    }

    fn license_by_key(&self, key: &str) -> StoreResult<Option<License>> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {LICENSE_COLUMNS} FROM licenses WHERE key = ?1"),
            params![key],
            |row| read_license(row),
        )
        .optional()
        .map_err(backend)
    }

    fn update_license(&self, record: &License) -> StoreResult<bool> {
        let conn = self.lock()?;
        let changed = update_license_row(&conn, record).map_err(backend)?;
        Ok(changed > 0)
    }

    fn commit_transition(&self, record: &License, check: &LicenseCheck) -> StoreResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(backend)?;
        let changed = update_license_row(&tx, record).map_err(backend)?;
        if changed == 0 {
            return Err(StoreError::Backend(format!(
                "unknown license id: {}",
                record.id
            )));
        }
        insert_check_row(&tx, check).map_err(backend)?;
        tx.commit().map_err(backend)?;
        Ok(())
    }

    fn append_check(&self, check: &LicenseCheck) -> StoreResult<()> {
        let conn = self.lock()?;
        insert_check_row(&conn, check).map_err(backend)?;
        Ok(())
    }

    fn checks_for(&self, license_id: LicenseId, limit: usize) -> StoreResult<Vec<LicenseCheck>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {CHECK_COLUMNS} FROM license_checks
                 WHERE license_id = ?1
                 ORDER BY timestamp DESC, rowid DESC
                 LIMIT ?2"
            ))
            .map_err(backend)?;
        let rows = stmt
            .query_map(params![license_id.to_string(), limit as i64], |row| {
                read_check(row)
            })
            .map_err(backend)?;
        let mut hits = Vec::new();
        for row in rows {
            hits.push(row.map_err(backend)?);
        }
        Ok(hits)
    }

    fn search(&self, filter: &SearchFilter) -> StoreResult<Vec<License>> {
        let conn = self.lock()?;
        let mut sql = format!(
            "SELECT l.id, l.key, l.owner, l.license_type_id, l.status, l.created_at, \
             l.updated_at, l.expires_at, l.last_checked, l.activation_date, l.hardware_id, \
             l.max_activations, l.notes \
             FROM licenses l \
             JOIN license_types t ON t.id = l.license_type_id \
             WHERE 1 = 1"
        );
        let mut args: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(query) = filter.query.as_deref() {
            let pattern = like_pattern(query);
            sql.push_str(
                " AND (l.key LIKE ? ESCAPE '\\' OR l.notes LIKE ? ESCAPE '\\' \
                 OR COALESCE(l.owner, '') LIKE ? ESCAPE '\\')",
            );
            args.push(Box::new(pattern.clone()));
            args.push(Box::new(pattern.clone()));
            args.push(Box::new(pattern));
        }
        if let Some(status) = filter.status {
            sql.push_str(" AND l.status = ?");
            args.push(Box::new(status.as_str()));
        }
        if let Some(name) = filter.license_type.as_deref() {
            sql.push_str(" AND t.name = ?");
            args.push(Box::new(name.to_string()));
        }
        if filter.active_only {
            sql.push_str(" AND l.status = 'active'");
        }
        if let Some(days) = filter.expiring_within_days {
            let cutoff = Utc::now() + Duration::days(days);
            sql.push_str(" AND l.status = 'active' AND l.expires_at <= ?");
            args.push(Box::new(cutoff.timestamp_millis()));
        }
        sql.push_str(order_clause(filter.order));

        let mut stmt = conn.prepare(&sql).map_err(backend)?;
        let rows = stmt
            .query_map(
                rusqlite::params_from_iter(args.iter().map(|arg| arg.as_ref())),
                |row| read_license(row),
            )
            .map_err(backend)?;
        let mut hits = Vec::new();
        for row in rows {
            hits.push(row.map_err(backend)?);
        }
        Ok(hits)
    }

    fn delete_license(&self, id: LicenseId) -> StoreResult<bool> {
        let conn = self.lock()?;
        let changed = conn
            .execute("DELETE FROM licenses WHERE id = ?1", params![id.to_string()])
            .map_err(backend)?;
        if changed > 0 {
            debug!(license_id = %id, "deleted license and its audit trail");
        }
        Ok(changed > 0)
    }
}

fn update_license_row(conn: &Connection, record: &License) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE licenses
         SET owner = ?2, status = ?3, updated_at = ?4, expires_at = ?5,
             last_checked = ?6, activation_date = ?7, hardware_id = ?8,
             max_activations = ?9, notes = ?10
         WHERE id = ?1",
        params![
            record.id.to_string(),
            record.owner,
            record.status.as_str(),
            ts(record.updated_at),
            opt_ts(record.expires_at),
            opt_ts(record.last_checked),
            opt_ts(record.activation_date),
            record.hardware_id,
            record.max_activations,
            record.notes,
        ],
    )
}

fn insert_check_row(conn: &Connection, check: &LicenseCheck) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO license_checks
         (id, license_id, timestamp, status, ip_address, hardware_id, user_agent, message)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            check.id.to_string(),
            check.license_id.to_string(),
            ts(check.timestamp),
            check.status.as_str(),
            check.ip_address,
            check.hardware_id,
            check.user_agent,
            check.message,
        ],
    )
}

fn read_license_type(row: &Row<'_>) -> rusqlite::Result<LicenseType> {
    Ok(LicenseType {
        id: read_type_id(row, 0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        max_instances: row.get(3)?,
        duration_days: row.get(4)?,
        is_active: row.get(5)?,
    })
}

fn read_license(row: &Row<'_>) -> rusqlite::Result<License> {
    let raw_status: String = row.get(4)?;
    Ok(License {
        id: read_license_id(row, 0)?,
        key: row.get(1)?,
        owner: row.get(2)?,
        license_type_id: read_type_id(row, 3)?,
        status: parse_status(&raw_status, 4)?,
        created_at: read_ts(row, 5)?,
        updated_at: read_ts(row, 6)?,
        expires_at: read_opt_ts(row, 7)?,
        last_checked: read_opt_ts(row, 8)?,
        activation_date: read_opt_ts(row, 9)?,
        hardware_id: row.get(10)?,
        max_activations: row.get(11)?,
        notes: row.get(12)?,
    })
}

fn read_check(row: &Row<'_>) -> rusqlite::Result<LicenseCheck> {
    let raw_id: String = row.get(0)?;
    let raw_license: String = row.get(1)?;
    let raw_status: String = row.get(3)?;
    Ok(LicenseCheck {
        id: CheckId::parse(&raw_id).map_err(|err| text_conversion(0, err))?,
        license_id: LicenseId::parse(&raw_license).map_err(|err| text_conversion(1, err))?,
        timestamp: read_ts(row, 2)?,
        status: raw_status
            .parse::<CheckStatus>()
            .map_err(|err| text_conversion(3, err))?,
        ip_address: row.get(4)?,
        hardware_id: row.get(5)?,
        user_agent: row.get(6)?,
        message: row.get(7)?,
    })
}

fn read_license_id(row: &Row<'_>, idx: usize) -> rusqlite::Result<LicenseId> {
    let raw: String = row.get(idx)?;
    LicenseId::parse(&raw).map_err(|err| text_conversion(idx, err))
}

fn read_type_id(row: &Row<'_>, idx: usize) -> rusqlite::Result<LicenseTypeId> {
    let raw: String = row.get(idx)?;
    LicenseTypeId::parse(&raw).map_err(|err| text_conversion(idx, err))
}

fn parse_status(raw: &str, idx: usize) -> rusqlite::Result<LicenseStatus> {
    raw.parse::<LicenseStatus>()
        .map_err(|err| text_conversion(idx, err))
}

fn read_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let millis: i64 = row.get(idx)?;
    DateTime::from_timestamp_millis(millis).ok_or_else(|| out_of_range(idx, millis))
}

fn read_opt_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let millis: Option<i64> = row.get(idx)?;
    millis
        .map(|value| DateTime::from_timestamp_millis(value).ok_or_else(|| out_of_range(idx, value)))
        .transpose()
}

fn ts(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn opt_ts(at: Option<DateTime<Utc>>) -> Option<i64> {
    at.map(|value| value.timestamp_millis())
}

fn order_clause(order: LicenseOrder) -> &'static str {
    match order {
        LicenseOrder::CreatedDesc => " ORDER BY l.created_at DESC, l.rowid DESC",
        LicenseOrder::CreatedAsc => " ORDER BY l.created_at ASC, l.rowid ASC",
        LicenseOrder::ExpiresAsc => " ORDER BY l.expires_at ASC, l.rowid ASC",
        LicenseOrder::ExpiresDesc => " ORDER BY l.expires_at DESC, l.rowid DESC",
    }
}

/// Escapes LIKE wildcards so user text matches literally.
fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn insert_license_err(key: &str, err: rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(cause, _) = &err {
        if cause.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE {
            return StoreError::DuplicateKey(key.to_string());
        }
    }
    backend(err)
}

fn backend(err: rusqlite::Error) -> StoreError {
    match err {
        rusqlite::Error::FromSqlConversionFailure(_, _, source) => {
            StoreError::CorruptRecord(source.to_string())
        }
        other => StoreError::Backend(other.to_string()),
    }
}

fn text_conversion(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

fn out_of_range(idx: usize, millis: i64) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Integer,
        format!("timestamp out of range: {millis}").into(),
    )
}
