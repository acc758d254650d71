//! SQLite schema and row mapping for resolution records.
//!
//! Table layout:
//! - `url_hash` (PK): SHA-256 of the normalized URL
//! - identifier columns indexed for the secondary lookup path
//! - metadata and tags stored as JSON text
//! - `fetched_at` stored as fixed-width RFC 3339 (UTC, microseconds) so string
//!   comparison orders by time

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::error::CacheResult;
use crate::identifiers::{CanonicalIdentifier, IdentifierKind};
use crate::models::{BibliographicMetadata, ResolutionRecord, ResolutionStatus, Tag};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS resolutions (
    url_hash          TEXT PRIMARY KEY,
    original_url      TEXT NOT NULL,
    normalized_url    TEXT NOT NULL,
    identifier_kind   TEXT NOT NULL DEFAULT 'none',
    identifier_value  TEXT NOT NULL DEFAULT '',
    status            TEXT NOT NULL,
    metadata_json     TEXT,
    error_message     TEXT,
    tags_json         TEXT NOT NULL DEFAULT '[]',
    fetched_at        TEXT NOT NULL,
    manual            INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_resolutions_identifier
    ON resolutions (identifier_kind, identifier_value)
    WHERE identifier_kind != 'none';
CREATE INDEX IF NOT EXISTS idx_resolutions_status ON resolutions (status);
";

const COLUMNS: &str = "original_url, normalized_url, identifier_kind, identifier_value, status, \
                       metadata_json, error_message, tags_json, fetched_at, manual";

/// Apply pragmas and create the schema.
pub(super) fn initialize(conn: &Connection) -> CacheResult<()> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        ",
    )?;
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// Format a timestamp for storage.
pub(super) fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Raw row before JSON decoding, so a corrupt row can be reported and skipped.
pub(super) struct StoredRow {
    pub original_url: String,
    pub normalized_url: String,
    pub identifier_kind: String,
    pub identifier_value: String,
    pub status: String,
    pub metadata_json: Option<String>,
    pub error_message: Option<String>,
    pub tags_json: String,
    pub fetched_at: String,
    pub manual: bool,
}

impl StoredRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            original_url: row.get(0)?,
            normalized_url: row.get(1)?,
            identifier_kind: row.get(2)?,
            identifier_value: row.get(3)?,
            status: row.get(4)?,
            metadata_json: row.get(5)?,
            error_message: row.get(6)?,
            tags_json: row.get(7)?,
            fetched_at: row.get(8)?,
            manual: row.get(9)?,
        })
    }

    /// Decode JSON columns into a record. Returns `None` for rows that no
    /// longer decode (they are treated as absent).
    pub fn into_record(self) -> Option<ResolutionRecord> {
        let decoded = (|| -> Result<ResolutionRecord, String> {
            let status = ResolutionStatus::parse(&self.status)
                .ok_or_else(|| format!("unknown status {}", self.status))?;
            let metadata = self
                .metadata_json
                .as_deref()
                .map(serde_json::from_str::<BibliographicMetadata>)
                .transpose()
                .map_err(|e| e.to_string())?;
            let tags = serde_json::from_str::<Vec<Tag>>(&self.tags_json).map_err(|e| e.to_string())?;
            let fetched_at = DateTime::parse_from_rfc3339(&self.fetched_at)
                .map_err(|e| e.to_string())?
                .with_timezone(&Utc);
            let identifier = match IdentifierKind::parse(&self.identifier_kind) {
                IdentifierKind::Doi => CanonicalIdentifier::doi(&self.identifier_value),
                IdentifierKind::Arxiv => CanonicalIdentifier::arxiv(&self.identifier_value),
                IdentifierKind::Pmcid => CanonicalIdentifier::pmc(&self.identifier_value),
                IdentifierKind::None => CanonicalIdentifier::none(),
            };

            Ok(ResolutionRecord {
                original_url: self.original_url.clone(),
                normalized_url: self.normalized_url.clone(),
                identifier,
                status,
                metadata,
                error_message: self.error_message.clone(),
                tags,
                fetched_at,
                manual: self.manual,
            })
        })();

        match decoded {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(url = %self.normalized_url, error = %e, "Skipping undecodable cache row");
                None
            }
        }
    }
}

/// Fetch the row stored under a URL hash.
pub(super) fn select_by_hash(conn: &Connection, hash: &str) -> CacheResult<Option<StoredRow>> {
    let sql = format!("SELECT {COLUMNS} FROM resolutions WHERE url_hash = ?1");
    Ok(conn.query_row(&sql, params![hash], StoredRow::from_row).optional()?)
}

/// Fetch rows sharing an identifier, manual and newest first.
pub(super) fn select_by_identifier(
    conn: &Connection,
    identifier: &CanonicalIdentifier,
) -> CacheResult<Vec<StoredRow>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM resolutions \
         WHERE identifier_kind = ?1 AND identifier_value = ?2 \
         ORDER BY manual DESC, fetched_at DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![identifier.kind.as_str(), identifier.value], StoredRow::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Fetch rows with the given status, newest first.
pub(super) fn select_by_status(
    conn: &Connection,
    status: ResolutionStatus,
) -> CacheResult<Vec<StoredRow>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM resolutions WHERE status = ?1 ORDER BY fetched_at DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![status.as_str()], StoredRow::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Insert or replace a record. A manual row is only replaced by another
/// manual row. Returns true if the row was written.
pub(super) fn upsert(conn: &Connection, hash: &str, record: &ResolutionRecord) -> CacheResult<bool> {
    let metadata_json = record.metadata.as_ref().map(serde_json::to_string).transpose()?;
    let tags_json = serde_json::to_string(&record.tags)?;

    let changed = conn.execute(
        "INSERT INTO resolutions (url_hash, original_url, normalized_url, identifier_kind,
                                  identifier_value, status, metadata_json, error_message,
                                  tags_json, fetched_at, manual)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT(url_hash) DO UPDATE SET
             original_url = excluded.original_url,
             normalized_url = excluded.normalized_url,
             identifier_kind = excluded.identifier_kind,
             identifier_value = excluded.identifier_value,
             status = excluded.status,
             metadata_json = excluded.metadata_json,
             error_message = excluded.error_message,
             tags_json = excluded.tags_json,
             fetched_at = excluded.fetched_at,
             manual = excluded.manual
         WHERE resolutions.manual = 0 OR excluded.manual = 1",
        params![
            hash,
            record.original_url,
            record.normalized_url,
            record.identifier.kind.as_str(),
            record.identifier.value,
            record.status.as_str(),
            metadata_json,
            record.error_message,
            tags_json,
            timestamp(record.fetched_at),
            record.manual,
        ],
    )?;

    Ok(changed > 0)
}

/// Delete the row under a hash.
pub(super) fn delete_by_hash(conn: &Connection, hash: &str) -> CacheResult<bool> {
    Ok(conn.execute("DELETE FROM resolutions WHERE url_hash = ?1", params![hash])? > 0)
}

/// Number of automated rows older than the cutoff.
pub(super) fn count_expired(conn: &Connection, cutoff: &str) -> CacheResult<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM resolutions WHERE manual = 0 AND fetched_at < ?1",
        params![cutoff],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

/// Delete automated rows older than the cutoff.
pub(super) fn delete_expired(conn: &Connection, cutoff: &str) -> CacheResult<usize> {
    Ok(conn.execute("DELETE FROM resolutions WHERE manual = 0 AND fetched_at < ?1", params![cutoff])?)
}

/// Delete every row.
pub(super) fn delete_all(conn: &Connection) -> CacheResult<usize> {
    Ok(conn.execute("DELETE FROM resolutions", [])?)
}

/// Aggregate counts: (total, valid, with_identifier, errors).
pub(super) fn counts(conn: &Connection, cutoff: &str) -> CacheResult<(usize, usize, usize, usize)> {
    let row = conn.query_row(
        "SELECT COUNT(*),
                COALESCE(SUM(CASE WHEN manual = 1 OR fetched_at >= ?1 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN identifier_kind != 'none' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'error' THEN 1 ELSE 0 END), 0)
         FROM resolutions",
        params![cutoff],
        |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
            ))
        },
    )?;
    Ok((row.0 as usize, row.1 as usize, row.2 as usize, row.3 as usize))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_is_fixed_width() {
        let a = timestamp(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap());
        let b = timestamp(Utc.with_ymd_and_hms(2024, 11, 12, 13, 14, 15).unwrap());
        assert_eq!(a.len(), b.len());
        assert!(a < b);
        assert!(a.ends_with('Z'));
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        initialize(&conn).unwrap();
        let (total, ..) = counts(&conn, &timestamp(Utc::now())).unwrap();
        assert_eq!(total, 0);
    }
}
