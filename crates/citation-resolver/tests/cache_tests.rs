//! Resolution cache tests against on-disk SQLite databases.

use chrono::{Duration, Utc};
use tempfile::TempDir;

use citation_resolver::cache::{Outcome, ResolutionCache};
use citation_resolver::config::Config;
use citation_resolver::error::CacheError;
use citation_resolver::identifiers::{CanonicalIdentifier, normalize};
use citation_resolver::models::{BibliographicMetadata, ResolutionRecord, ResolutionStatus, Tag};

fn open_cache(dir: &TempDir) -> ResolutionCache {
    ResolutionCache::open(&Config::for_testing("http://127.0.0.1:1", dir.path())).unwrap()
}

fn sample_metadata(title: &str, authors: &[&str]) -> BibliographicMetadata {
    BibliographicMetadata {
        title: Some(title.to_string()),
        authors: authors.iter().map(ToString::to_string).collect(),
        year: Some(2023),
        ..BibliographicMetadata::from_provider("doi.org")
    }
}

fn aged_record(url: &str, age: Duration, manual: bool) -> ResolutionRecord {
    let normalized = normalize(url);
    ResolutionRecord {
        original_url: url.to_string(),
        normalized_url: normalized.url,
        identifier: normalized.identifier,
        status: ResolutionStatus::Success,
        metadata: Some(sample_metadata("Old", &["Roe, Rita"])),
        error_message: None,
        tags: vec![Tag::Doi],
        fetched_at: Utc::now() - age,
        manual,
    }
}

// =============================================================================
// Round trip and TTL
// =============================================================================

#[test]
fn test_put_then_get_returns_metadata() {
    let dir = TempDir::new().unwrap();
    let cache = open_cache(&dir);
    let meta = sample_metadata("Deep Citations", &["Smith, John", "Doe, Jane"]);

    cache.put("https://doi.org/10.1234/abc", Outcome::Resolved(meta.clone()), false).unwrap();

    let record = cache.get("https://doi.org/10.1234/abc").unwrap().unwrap();
    assert_eq!(record.status, ResolutionStatus::Success);
    assert_eq!(record.metadata, Some(meta));
    assert_eq!(record.identifier, CanonicalIdentifier::doi("10.1234/abc"));
}

#[test]
fn test_alias_url_hits_same_record() {
    let dir = TempDir::new().unwrap();
    let cache = open_cache(&dir);
    cache
        .put("https://doi.org/10.1000/x", Outcome::Resolved(sample_metadata("X", &["A, B"])), false)
        .unwrap();

    assert!(cache.get("http://dx.doi.org/10.1000/X").unwrap().is_some());
    assert!(cache.get("https://onlinelibrary.wiley.com/doi/abs/10.1000/x").unwrap().is_some());
}

#[test]
fn test_identifier_index_links_page_url_to_doi_url() {
    let dir = TempDir::new().unwrap();
    let cache = open_cache(&dir);
    let mut meta = sample_metadata("Linked", &["Lee, David"]);
    meta.doi = Some("10.5555/linked".to_string());

    cache.put("https://journal.example.org/article/17", Outcome::Resolved(meta), false).unwrap();

    let record = cache.get("https://doi.org/10.5555/linked").unwrap().unwrap();
    assert_eq!(record.normalized_url, "https://journal.example.org/article/17");
}

#[test]
fn test_manual_record_under_other_url_wins_over_fresh_automated_record() {
    let dir = TempDir::new().unwrap();
    let cache = open_cache(&dir);
    cache
        .put("https://doi.org/10.5555/shared", Outcome::Resolved(sample_metadata("Auto", &["Roe, Rita"])), false)
        .unwrap();
    let mut corrected = sample_metadata("Corrected", &["Lee, David"]);
    corrected.doi = Some("10.5555/shared".to_string());
    cache.put("https://journal.example.org/article/9", Outcome::Resolved(corrected), true).unwrap();

    let record = cache.get("https://doi.org/10.5555/shared").unwrap().unwrap();
    assert!(record.manual);
    assert_eq!(record.normalized_url, "https://journal.example.org/article/9");

    let page = cache.get("https://journal.example.org/article/9").unwrap().unwrap();
    assert!(page.manual);
}

#[test]
fn test_expired_record_reads_as_absent() {
    let dir = TempDir::new().unwrap();
    let cache = open_cache(&dir);
    cache
        .put("https://doi.org/10.5555/ttl", Outcome::Resolved(sample_metadata("T", &["A, B"])), false)
        .unwrap();

    let later = Utc::now() + Duration::days(31);
    assert!(cache.get_at("https://doi.org/10.5555/ttl", later).unwrap().is_none());
    assert!(cache.get_any("https://doi.org/10.5555/ttl").unwrap().is_some());
}

#[test]
fn test_manual_record_never_expires() {
    let dir = TempDir::new().unwrap();
    let cache = open_cache(&dir);
    cache
        .put("https://doi.org/10.5555/manual", Outcome::Resolved(sample_metadata("M", &["A, B"])), true)
        .unwrap();

    let much_later = Utc::now() + Duration::days(3650);
    let record = cache.get_at("https://doi.org/10.5555/manual", much_later).unwrap().unwrap();
    assert!(record.manual);
}

#[test]
fn test_failures_are_cached() {
    let dir = TempDir::new().unwrap();
    let cache = open_cache(&dir);
    cache.put("https://example.org/gone", Outcome::Failed("404".to_string()), false).unwrap();

    let record = cache.get("https://example.org/gone").unwrap().unwrap();
    assert_eq!(record.status, ResolutionStatus::Error);
    assert_eq!(record.error_message.as_deref(), Some("404"));
    assert_eq!(cache.list_failed().unwrap().len(), 1);
}

// =============================================================================
// Manual precedence
// =============================================================================

#[test]
fn test_automated_write_cannot_replace_manual_record() {
    let dir = TempDir::new().unwrap();
    let cache = open_cache(&dir);
    let url = "https://doi.org/10.5555/shield";
    cache.put(url, Outcome::Resolved(sample_metadata("Human", &["Kumar, R"])), true).unwrap();

    let automated = aged_record(url, Duration::zero(), false);
    assert!(!cache.put_record(&automated).unwrap());

    let record = cache.get(url).unwrap().unwrap();
    assert!(record.manual);
    assert_eq!(record.metadata.unwrap().title.as_deref(), Some("Human"));
}

#[test]
fn test_manual_write_replaces_automated_record() {
    let dir = TempDir::new().unwrap();
    let cache = open_cache(&dir);
    let url = "https://doi.org/10.5555/upgrade";
    cache.put(url, Outcome::Failed("timeout".to_string()), false).unwrap();
    cache.put(url, Outcome::Resolved(sample_metadata("Fixed", &["Lee, D"])), true).unwrap();

    let record = cache.get(url).unwrap().unwrap();
    assert!(record.manual);
    assert!(record.is_success());
}

// =============================================================================
// Maintenance
// =============================================================================

#[test]
fn test_cleanup_removes_only_expired_automated_records() {
    let dir = TempDir::new().unwrap();
    let cache = open_cache(&dir);
    cache.put_record(&aged_record("https://doi.org/10.5555/old", Duration::days(40), false)).unwrap();
    cache.put_record(&aged_record("https://doi.org/10.5555/oldmanual", Duration::days(400), true)).unwrap();
    cache.put_record(&aged_record("https://doi.org/10.5555/fresh", Duration::days(1), false)).unwrap();

    let stats = cache.stats().unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.valid, 2);

    assert_eq!(cache.cleanup_expired().unwrap(), 1);
    assert_eq!(cache.len().unwrap(), 2);
    assert!(cache.get_any("https://doi.org/10.5555/old").unwrap().is_none());
    assert_eq!(cache.list_backups().unwrap().len(), 1);
}

#[test]
fn test_remove_single_record() {
    let dir = TempDir::new().unwrap();
    let cache = open_cache(&dir);
    cache.put("https://example.org/a", Outcome::Failed("x".to_string()), false).unwrap();

    assert!(cache.remove("https://example.org/a?utm_source=feed").unwrap());
    assert!(!cache.remove("https://example.org/a").unwrap());
}

#[test]
fn test_cache_survives_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let cache = open_cache(&dir);
        cache
            .put("https://doi.org/10.5555/durable", Outcome::Resolved(sample_metadata("D", &["A, B"])), false)
            .unwrap();
    }
    let cache = open_cache(&dir);
    assert!(cache.get("https://doi.org/10.5555/durable").unwrap().is_some());
}

// =============================================================================
// Backup and restore
// =============================================================================

#[test]
fn test_restore_yields_exact_pre_mutation_state() {
    let dir = TempDir::new().unwrap();
    let cache = open_cache(&dir);
    let urls = ["https://doi.org/10.5555/a", "https://doi.org/10.5555/b"];
    for url in urls {
        cache.put(url, Outcome::Resolved(sample_metadata(url, &["Smith, J"])), false).unwrap();
    }
    let before: Vec<_> = urls.iter().map(|u| cache.get_any(u).unwrap()).collect();

    let handle = cache.backup().unwrap();

    cache.remove(urls[0]).unwrap();
    cache.put(urls[1], Outcome::Failed("changed".to_string()), false).unwrap();
    cache.put("https://doi.org/10.5555/c", Outcome::Failed("new".to_string()), false).unwrap();
    assert_eq!(cache.len().unwrap(), 2);

    let safety = cache.restore(&handle).unwrap();
    assert_ne!(safety.path, handle.path);

    assert_eq!(cache.len().unwrap(), 2);
    let after: Vec<_> = urls.iter().map(|u| cache.get_any(u).unwrap()).collect();
    assert_eq!(before, after);
    assert!(cache.get_any("https://doi.org/10.5555/c").unwrap().is_none());
}

#[test]
fn test_restore_can_be_undone() {
    let dir = TempDir::new().unwrap();
    let cache = open_cache(&dir);
    let snapshot = {
        cache.put("https://doi.org/10.5555/z", Outcome::Failed("x".to_string()), false).unwrap();
        let handle = cache.backup().unwrap();
        cache.put("https://doi.org/10.5555/y", Outcome::Failed("y".to_string()), false).unwrap();
        handle
    };

    let safety = cache.restore(&snapshot).unwrap();
    assert_eq!(cache.len().unwrap(), 1);

    cache.restore(&safety).unwrap();
    assert_eq!(cache.len().unwrap(), 2);
}

#[test]
fn test_restore_missing_backup_fails() {
    let dir = TempDir::new().unwrap();
    let cache = open_cache(&dir);
    let mut handle = cache.backup().unwrap();
    handle.path = dir.path().join("backups").join("missing.sqlite3");

    let err = cache.restore(&handle).unwrap_err();
    assert!(matches!(err, CacheError::BackupNotFound(_)));
}

#[test]
fn test_backup_retention_prunes_oldest() {
    let dir = TempDir::new().unwrap();
    let cache = open_cache(&dir);
    cache.put("https://doi.org/10.5555/r", Outcome::Failed("x".to_string()), false).unwrap();

    for _ in 0..5 {
        cache.backup().unwrap();
    }
    // Retention is 3 in the test configuration.
    assert_eq!(cache.list_backups().unwrap().len(), 3);
}

#[test]
fn test_scheduled_backup_runs_once_per_interval() {
    let dir = TempDir::new().unwrap();
    let cache = open_cache(&dir);
    assert!(cache.maybe_scheduled_backup().unwrap().is_none());

    cache.put("https://doi.org/10.5555/s", Outcome::Failed("x".to_string()), false).unwrap();
    assert!(cache.maybe_scheduled_backup().unwrap().is_some());
    assert!(cache.maybe_scheduled_backup().unwrap().is_none());
}
