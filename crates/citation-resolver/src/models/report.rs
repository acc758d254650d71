//! Engine output per citation and per batch.

use serde::{Deserialize, Serialize};

use super::{BibliographicMetadata, RawCitation, Tag, ValidationResult, ValidationStatus};

/// Rendered citation text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattedCitation {
    /// Text for the corrected document; never carries diagnostic tags.
    pub prose: String,

    /// Text for review output, with status marker and tags.
    pub review: String,

    /// Tags rendered into `review`.
    pub tags: Vec<Tag>,
}

/// Everything the engine knows about one citation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CitationReport {
    /// The citation as asserted.
    pub citation: RawCitation,

    /// Scorer output.
    pub validation: ValidationResult,

    /// Resolved metadata, if any.
    #[serde(default)]
    pub metadata: Option<BibliographicMetadata>,

    /// Rendered text.
    pub formatted: FormattedCitation,

    /// Diagnostic tags from the cache record and the lookup.
    #[serde(default)]
    pub tags: Vec<Tag>,

    /// Served from the cache without running the chain.
    #[serde(default)]
    pub from_cache: bool,

    /// Resolver that produced the metadata on this run.
    #[serde(default)]
    pub resolver: Option<String>,
}

impl CitationReport {
    /// Identifier of the citation.
    #[must_use]
    pub fn citation_id(&self) -> &str {
        &self.validation.citation_id
    }

    /// Validation status.
    #[must_use]
    pub const fn status(&self) -> ValidationStatus {
        self.validation.status
    }

    /// Returns true when resolved authors contradict the asserted ones.
    #[must_use]
    pub fn is_candidate_hallucination(&self) -> bool {
        self.validation.is_candidate_hallucination()
    }
}

/// Result of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    /// Per-citation reports, in completion order.
    pub reports: Vec<CitationReport>,

    /// Citations not started because the run was cancelled.
    #[serde(default)]
    pub skipped: usize,

    /// The run was cancelled before every citation started.
    #[serde(default)]
    pub cancelled: bool,
}

impl BatchReport {
    /// Number of reports with the given status.
    #[must_use]
    pub fn count(&self, status: ValidationStatus) -> usize {
        self.reports.iter().filter(|r| r.status() == status).count()
    }

    /// Reports whose resolved authors contradict the asserted ones.
    pub fn candidate_hallucinations(&self) -> impl Iterator<Item = &CitationReport> {
        self.reports.iter().filter(|r| r.is_candidate_hallucination())
    }

    /// Returns true if any citation is a candidate hallucination.
    #[must_use]
    pub fn has_candidate_hallucinations(&self) -> bool {
        self.candidate_hallucinations().next().is_some()
    }
}
