//! Persistent resolution cache.
//!
//! One SQLite database per user holds one record per normalized URL, keyed by
//! the SHA-256 of that URL and secondarily indexed by identifier so distinct
//! URLs for the same DOI share a hit. Automated records expire after the
//! configured TTL (they read as absent but stay on disk until
//! [`ResolutionCache::cleanup_expired`]); manual records never expire and are
//! never replaced by automated writes.
//!
//! Destructive bulk operations and restores snapshot the database first.

mod backup;
mod store;

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use sha2::{Digest, Sha256};

pub use backup::BackupHandle;

use crate::config::Config;
use crate::error::CacheResult;
use crate::identifiers::{self, CanonicalIdentifier};
use crate::models::{BibliographicMetadata, ResolutionRecord, ResolutionStatus};

/// What to store for a URL.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Metadata was resolved.
    Resolved(BibliographicMetadata),
    /// Resolution failed with this message.
    Failed(String),
}

/// Aggregate counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Rows on disk, expired included.
    pub total: usize,
    /// Rows that are still fresh (or manual).
    pub valid: usize,
    /// Rows with a derived identifier.
    pub with_identifier: usize,
    /// Rows holding a cached error.
    pub errors: usize,
}

/// Durable URL → resolution store.
#[derive(Debug)]
pub struct ResolutionCache {
    conn: Mutex<Connection>,
    path: PathBuf,
    backup_dir: PathBuf,
    ttl: chrono::Duration,
    retention: usize,
    backup_interval: Duration,
}

impl ResolutionCache {
    /// Open (or create) the cache described by the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or database cannot be created.
    pub fn open(config: &Config) -> CacheResult<Self> {
        std::fs::create_dir_all(&config.cache_dir)?;
        let path = config.cache_path();
        let conn = Connection::open(&path)?;
        store::initialize(&conn)?;

        let cache = Self {
            conn: Mutex::new(conn),
            path,
            backup_dir: config.backup_dir(),
            ttl: config.cache_ttl,
            retention: config.backup_retention,
            backup_interval: config.backup_interval,
        };

        tracing::debug!(path = %cache.path.display(), "Opened resolution cache");
        cache.maybe_scheduled_backup()?;
        Ok(cache)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record lifetime.
    #[must_use]
    pub const fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    /// Cache key for a URL: SHA-256 of its normalized form.
    #[must_use]
    pub fn key_for(url: &str) -> String {
        hash_normalized(&identifiers::normalize(url).url)
    }

    /// Look up a URL, treating expired automated records as absent.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub fn get(&self, url: &str) -> CacheResult<Option<ResolutionRecord>> {
        self.get_at(url, Utc::now())
    }

    /// Look up a URL as of `now`.
    ///
    /// A manual record wins wherever it is stored: under the URL's own hash or
    /// under another URL sharing its identifier. Otherwise a fresh record at
    /// the URL's hash is returned, then the freshest row sharing the identifier.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub fn get_at(&self, url: &str, now: DateTime<Utc>) -> CacheResult<Option<ResolutionRecord>> {
        let normalized = identifiers::normalize(url);
        let conn = self.conn();

        let direct = store::select_by_hash(&conn, &hash_normalized(&normalized.url))?
            .and_then(store::StoredRow::into_record)
            .filter(|record| {
                let fresh = !record.is_expired(now, self.ttl);
                if !fresh {
                    tracing::debug!(url = %normalized.url, "Cached record expired");
                }
                fresh
            });
        if direct.as_ref().is_some_and(|record| record.manual) || normalized.identifier.is_none() {
            return Ok(direct);
        }

        // Rows come back manual first, newest first.
        let shared = store::select_by_identifier(&conn, &normalized.identifier)?
            .into_iter()
            .filter_map(store::StoredRow::into_record)
            .find(|record| !record.is_expired(now, self.ttl));
        if direct.is_some() && !shared.as_ref().is_some_and(|record| record.manual) {
            return Ok(direct);
        }
        if shared.is_some() {
            tracing::debug!(
                url = %normalized.url,
                identifier = %normalized.identifier.value,
                "Cache hit via identifier"
            );
        }
        Ok(shared)
    }

    /// Look up the record stored under a URL regardless of age.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub fn get_any(&self, url: &str) -> CacheResult<Option<ResolutionRecord>> {
        let normalized = identifiers::normalize(url);
        Ok(store::select_by_hash(&self.conn(), &hash_normalized(&normalized.url))?
            .and_then(store::StoredRow::into_record))
    }

    /// Store an outcome for a URL, replacing any automated record.
    ///
    /// Returns the record as built. When a manual record already occupies
    /// the key and `manual` is false, nothing is written.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub fn put(&self, url: &str, outcome: Outcome, manual: bool) -> CacheResult<ResolutionRecord> {
        let normalized = identifiers::normalize(url);
        let (status, metadata, error_message) = match outcome {
            Outcome::Resolved(metadata) => (ResolutionStatus::Success, Some(metadata), None),
            Outcome::Failed(message) => (ResolutionStatus::Error, None, Some(message)),
        };
        let identifier = effective_identifier(normalized.identifier, metadata.as_ref());

        let record = ResolutionRecord {
            original_url: url.trim().to_string(),
            normalized_url: normalized.url,
            identifier,
            status,
            metadata,
            error_message,
            tags: Vec::new(),
            fetched_at: Utc::now(),
            manual,
        };
        self.put_record(&record)?;
        Ok(record)
    }

    /// Upsert a complete record under its normalized URL.
    ///
    /// Returns false when a manual record shielded the key.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub fn put_record(&self, record: &ResolutionRecord) -> CacheResult<bool> {
        let hash = hash_normalized(&record.normalized_url);
        let written = store::upsert(&self.conn(), &hash, record)?;
        if written {
            tracing::debug!(
                url = %record.normalized_url,
                status = record.status.as_str(),
                manual = record.manual,
                "Stored resolution"
            );
        } else {
            tracing::debug!(url = %record.normalized_url, "Manual record kept; automated write skipped");
        }
        Ok(written)
    }

    /// Delete the record for a URL. Returns true if one existed.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub fn remove(&self, url: &str) -> CacheResult<bool> {
        let normalized = identifiers::normalize(url);
        store::delete_by_hash(&self.conn(), &hash_normalized(&normalized.url))
    }

    /// All cached errors, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub fn list_failed(&self) -> CacheResult<Vec<ResolutionRecord>> {
        Ok(store::select_by_status(&self.conn(), ResolutionStatus::Error)?
            .into_iter()
            .filter_map(store::StoredRow::into_record)
            .collect())
    }

    /// Aggregate counts.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub fn stats(&self) -> CacheResult<CacheStats> {
        let cutoff = store::timestamp(self.expiry_cutoff());
        let (total, valid, with_identifier, errors) = store::counts(&self.conn(), &cutoff)?;
        Ok(CacheStats { total, valid, with_identifier, errors })
    }

    /// Number of rows on disk.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub fn len(&self) -> CacheResult<usize> {
        Ok(self.stats()?.total)
    }

    /// Returns true if the cache holds no rows.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub fn is_empty(&self) -> CacheResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Automated records fetched before this instant are expired.
    fn expiry_cutoff(&self) -> DateTime<Utc> {
        Utc::now().checked_sub_signed(self.ttl).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Physically delete expired automated records, snapshotting first.
    ///
    /// # Errors
    ///
    /// Returns an error on database or filesystem failure.
    pub fn cleanup_expired(&self) -> CacheResult<usize> {
        let cutoff = store::timestamp(self.expiry_cutoff());
        let conn = self.conn();
        if store::count_expired(&conn, &cutoff)? == 0 {
            return Ok(0);
        }

        self.snapshot(&conn)?;
        let removed = store::delete_expired(&conn, &cutoff)?;
        tracing::info!(removed, "Removed expired cache records");
        Ok(removed)
    }

    /// Delete every record, snapshotting first.
    ///
    /// # Errors
    ///
    /// Returns an error on database or filesystem failure.
    pub fn clear(&self) -> CacheResult<usize> {
        let cutoff = store::timestamp(Utc::now());
        let conn = self.conn();
        let (total, ..) = store::counts(&conn, &cutoff)?;
        if total == 0 {
            return Ok(0);
        }

        self.snapshot(&conn)?;
        let removed = store::delete_all(&conn)?;
        tracing::info!(removed, "Cleared resolution cache");
        Ok(removed)
    }

    /// Take a snapshot now.
    ///
    /// # Errors
    ///
    /// Returns an error on database or filesystem failure.
    pub fn backup(&self) -> CacheResult<BackupHandle> {
        let conn = self.conn();
        self.snapshot(&conn)
    }

    /// Roll the database back to a snapshot.
    ///
    /// The current state is snapshotted first; the handle of that safety
    /// snapshot is returned so the restore itself can be undone.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::BackupNotFound` if the snapshot is gone, or an
    /// error on database or filesystem failure.
    pub fn restore(&self, handle: &BackupHandle) -> CacheResult<BackupHandle> {
        if !handle.path.is_file() {
            return Err(crate::error::CacheError::BackupNotFound(handle.path.clone()));
        }

        let mut conn = self.conn();
        let safety = backup::create(&conn, &self.backup_dir)?;
        backup::restore(&mut conn, handle)?;
        tracing::info!(
            from = %handle.path.display(),
            safety = %safety.path.display(),
            "Restored resolution cache"
        );

        // Prune after the restore so the requested snapshot is not removed first.
        backup::prune(&self.backup_dir, self.retention.max(2))?;
        Ok(safety)
    }

    /// Snapshots on disk, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the backup directory cannot be read.
    pub fn list_backups(&self) -> CacheResult<Vec<BackupHandle>> {
        backup::list(&self.backup_dir)
    }

    /// Take a snapshot if the newest one is older than the backup interval.
    ///
    /// Empty caches are not snapshotted.
    ///
    /// # Errors
    ///
    /// Returns an error on database or filesystem failure.
    pub fn maybe_scheduled_backup(&self) -> CacheResult<Option<BackupHandle>> {
        let newest = backup::list(&self.backup_dir)?.into_iter().next();
        let interval = chrono::Duration::from_std(self.backup_interval)
            .unwrap_or_else(|_| chrono::Duration::days(1));
        let due = newest.is_none_or(|handle| Utc::now() - handle.created_at >= interval);
        if !due {
            return Ok(None);
        }

        let conn = self.conn();
        let (total, ..) = store::counts(&conn, &store::timestamp(Utc::now()))?;
        if total == 0 {
            return Ok(None);
        }
        self.snapshot(&conn).map(Some)
    }

    fn snapshot(&self, conn: &Connection) -> CacheResult<BackupHandle> {
        let handle = backup::create(conn, &self.backup_dir)?;
        let pruned = backup::prune(&self.backup_dir, self.retention)?;
        tracing::info!(path = %handle.path.display(), pruned, "Cache backup created");
        Ok(handle)
    }
}

/// Identifier to index a record under: the URL's own identifier, else the
/// DOI of the resolved metadata.
#[must_use]
pub fn effective_identifier(
    from_url: CanonicalIdentifier,
    metadata: Option<&BibliographicMetadata>,
) -> CanonicalIdentifier {
    if !from_url.is_none() {
        return from_url;
    }
    metadata
        .and_then(|m| m.doi.as_deref())
        .and_then(identifiers::clean_doi)
        .map_or(from_url, CanonicalIdentifier::doi)
}

fn hash_normalized(normalized_url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalized_url.as_bytes());
    format!("{:x}", hasher.finalize())
}
