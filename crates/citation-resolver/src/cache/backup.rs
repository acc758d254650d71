//! Point-in-time snapshots of the cache database.
//!
//! Snapshots are written with the SQLite online-backup API into
//! `<cache_dir>/backups/resolutions-<UTC timestamp>-<suffix>.sqlite3`. The
//! timestamp in the file name is the snapshot time; listing sorts on it.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::Connection;
use rusqlite::backup::Backup;
use serde::{Deserialize, Serialize};

use crate::error::{CacheError, CacheResult};

const PREFIX: &str = "resolutions-";
const EXTENSION: &str = ".sqlite3";
const STAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.6fZ";

/// Handle to one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupHandle {
    /// Snapshot file.
    pub path: PathBuf,
    /// When the snapshot was taken.
    pub created_at: DateTime<Utc>,
}

impl BackupHandle {
    /// Build a handle from a snapshot path, reading the time from the file name.
    #[must_use]
    pub fn from_path(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let name = path.file_name()?.to_str()?;
        let stem = name.strip_prefix(PREFIX)?.strip_suffix(EXTENSION)?;
        let (stamp, _suffix) = stem.rsplit_once('-')?;
        let created_at = NaiveDateTime::parse_from_str(stamp, STAMP_FORMAT).ok()?.and_utc();
        Some(Self { path, created_at })
    }
}

/// Copy the live database into a new snapshot file.
pub(super) fn create(conn: &Connection, dir: &Path) -> CacheResult<BackupHandle> {
    fs::create_dir_all(dir)?;

    let created_at = Utc::now();
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let name = format!("{PREFIX}{}-{}{EXTENSION}", created_at.format(STAMP_FORMAT), &suffix[..8]);
    let path = dir.join(name);

    let mut dst = Connection::open(&path)?;
    let backup = Backup::new(conn, &mut dst)?;
    backup.run_to_completion(100, Duration::from_millis(10), None)?;

    Ok(BackupHandle { path, created_at })
}

/// Overwrite the live database with a snapshot.
pub(super) fn restore(conn: &mut Connection, handle: &BackupHandle) -> CacheResult<()> {
    if !handle.path.is_file() {
        return Err(CacheError::BackupNotFound(handle.path.clone()));
    }

    let src = Connection::open(&handle.path)?;
    let backup = Backup::new(&src, conn)?;
    backup.run_to_completion(100, Duration::from_millis(10), None)?;
    Ok(())
}

/// List snapshots, newest first.
pub(super) fn list(dir: &Path) -> CacheResult<Vec<BackupHandle>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut handles: Vec<BackupHandle> = fs::read_dir(dir)?
        .filter_map(Result::ok)
        .filter_map(|entry| BackupHandle::from_path(entry.path()))
        .collect();
    handles.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.path.cmp(&a.path)));
    Ok(handles)
}

/// Delete all but the `keep` newest snapshots. Returns the number removed.
pub(super) fn prune(dir: &Path, keep: usize) -> CacheResult<usize> {
    let handles = list(dir)?;
    let mut removed = 0;
    for handle in handles.iter().skip(keep.max(1)) {
        match fs::remove_file(&handle.path) {
            Ok(()) => {
                removed += 1;
                for sidecar in ["-wal", "-shm"] {
                    let mut name = handle.path.clone().into_os_string();
                    name.push(sidecar);
                    let _ = fs::remove_file(PathBuf::from(name));
                }
            }
            Err(e) => {
                tracing::warn!(path = %handle.path.display(), error = %e, "Failed to prune backup");
            }
        }
    }
    Ok(removed)
}
