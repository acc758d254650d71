//! Scorer output.

use serde::{Deserialize, Serialize};

use crate::error::{CitationError, CitationResult};

/// Trust classification of a citation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    /// Confidence at or above the validated threshold.
    Validated,
    /// Confidence at or above the partial threshold.
    Partial,
    /// Resolved authors exist but do not corroborate the asserted ones.
    Failed,
    /// No resolution data to compare against.
    Unvalidated,
}

impl ValidationStatus {
    /// Marker rendered in review output.
    #[must_use]
    pub const fn marker(self) -> &'static str {
        match self {
            Self::Validated => "VALIDATED",
            Self::Partial => "PARTIAL",
            Self::Failed => "FAILED",
            Self::Unvalidated => "UNVALIDATED",
        }
    }

    /// Parse a review marker.
    #[must_use]
    pub fn from_marker(marker: &str) -> Option<Self> {
        match marker {
            "VALIDATED" => Some(Self::Validated),
            "PARTIAL" => Some(Self::Partial),
            "FAILED" => Some(Self::Failed),
            "UNVALIDATED" => Some(Self::Unvalidated),
            _ => None,
        }
    }
}

/// Category of a validation issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// An asserted author has no counterpart among the resolved authors.
    UnmatchedAuthor,
    /// The resolved list is longer than the asserted list.
    AdditionalResolvedAuthors,
    /// The asserted text elides authors with "et al.".
    EtAlElision,
    /// Nothing was resolved for the citation.
    NoResolutionData,
}

/// One finding of the scorer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Category.
    pub kind: IssueKind,
    /// Human-readable description.
    pub message: String,
}

impl ValidationIssue {
    /// Create an issue.
    #[must_use]
    pub fn new(kind: IssueKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }
}

/// Agreement between asserted and resolved authors for one citation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// Citation this result belongs to.
    pub citation_id: String,
    /// Authors as asserted in the document.
    pub asserted_authors: Vec<String>,
    /// Authors reported by the provider; authoritative when they disagree.
    pub resolved_authors: Vec<String>,
    /// Classification.
    pub status: ValidationStatus,
    /// Fraction of asserted authors corroborated, in [0, 1].
    pub confidence_score: f64,
    /// Findings, possibly non-empty even when validated.
    pub issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Returns true when resolved data contradicts the asserted authors.
    #[must_use]
    pub fn is_candidate_hallucination(&self) -> bool {
        self.status == ValidationStatus::Failed && !self.resolved_authors.is_empty()
    }

    /// Returns true if an issue of the given kind was raised.
    #[must_use]
    pub fn has_issue(&self, kind: IssueKind) -> bool {
        self.issues.iter().any(|issue| issue.kind == kind)
    }

    /// Turn a candidate hallucination into `CitationError::ValidationFailed`.
    pub fn ensure_corroborated(&self) -> CitationResult<()> {
        if self.is_candidate_hallucination() {
            return Err(CitationError::ValidationFailed {
                citation_id: self.citation_id.clone(),
                confidence: self.confidence_score,
                resolved_authors: self.resolved_authors.clone(),
            });
        }
        Ok(())
    }
}
