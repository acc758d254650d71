//! Cache entries.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{BibliographicMetadata, Tag};
use crate::identifiers::CanonicalIdentifier;

/// Outcome stored for a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    /// Metadata was resolved.
    Success,
    /// Every resolver failed; the error is a terminal cached state.
    Error,
}

impl ResolutionStatus {
    /// Column value used by the store.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }

    /// Parse a column value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "success" => Some(Self::Success),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// One resolution attempt for one normalized URL.
///
/// Records are replaced as a whole; nothing mutates a stored record in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionRecord {
    /// URL as first seen.
    pub original_url: String,

    /// Output of the normalizer; the cache key is a hash of this.
    pub normalized_url: String,

    /// Identifier derived from the URL.
    pub identifier: CanonicalIdentifier,

    /// Success or Error.
    pub status: ResolutionStatus,

    /// Resolved metadata when `status` is Success.
    #[serde(default)]
    pub metadata: Option<BibliographicMetadata>,

    /// Failure description when `status` is Error.
    #[serde(default)]
    pub error_message: Option<String>,

    /// Diagnostic tags accumulated by the resolver chain.
    #[serde(default)]
    pub tags: Vec<Tag>,

    /// When the attempt was made.
    pub fetched_at: DateTime<Utc>,

    /// Human-supplied record; never expires.
    #[serde(default)]
    pub manual: bool,
}

impl ResolutionRecord {
    /// Returns true if this record should be treated as absent at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        !self.manual && now.signed_duration_since(self.fetched_at) > ttl
    }

    /// Returns true for a successful resolution.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == ResolutionStatus::Success
    }

    /// Resolved author names, empty for error records.
    #[must_use]
    pub fn resolved_authors(&self) -> &[String] {
        self.metadata.as_ref().map_or(&[], |m| m.authors.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fetched_at: DateTime<Utc>, manual: bool) -> ResolutionRecord {
        ResolutionRecord {
            original_url: "https://doi.org/10.1/x".to_string(),
            normalized_url: "https://doi.org/10.1/x".to_string(),
            identifier: CanonicalIdentifier::none(),
            status: ResolutionStatus::Error,
            metadata: None,
            error_message: Some("boom".to_string()),
            tags: Vec::new(),
            fetched_at,
            manual,
        }
    }

    #[test]
    fn test_expiry_respects_manual_flag() {
        let now = Utc::now();
        let old = now - Duration::days(45);
        assert!(record(old, false).is_expired(now, Duration::days(30)));
        assert!(!record(old, true).is_expired(now, Duration::days(30)));
        assert!(!record(now, false).is_expired(now, Duration::days(30)));
    }

    #[test]
    fn test_status_column_roundtrip() {
        for status in [ResolutionStatus::Success, ResolutionStatus::Error] {
            assert_eq!(ResolutionStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ResolutionStatus::parse("pending"), None);
    }
}
