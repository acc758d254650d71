//! Confidence scorer and hallucination detector.
//!
//! Compares the authors a document asserts with the authors a provider
//! resolved. Names are normalized (lowercase, punctuation stripped, `-`/`_`
//! as spaces) and matched on their first or last token, which covers
//! "Last, First" against "First Last" and partial names. Each resolved author
//! can corroborate at most one asserted author, and a bare initial never
//! matches on its own.
//!
//! `confidence = matches / max(1, asserted)`; the status follows the
//! configured thresholds, with `Failed` reserved for the case where resolved
//! authors exist and contradict the document.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::{
    BibliographicMetadata, IssueKind, RawCitation, ValidationIssue, ValidationResult,
    ValidationStatus,
};

static ET_AL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bet\.?\s*al\b\.?").expect("valid regex"));

/// Confidence cut-offs for the status mapping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceThresholds {
    /// Minimum confidence for `Validated`.
    pub validated: f64,
    /// Minimum confidence for `Partial`.
    pub partial: f64,
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self { validated: 0.8, partial: 0.5 }
    }
}

impl ConfidenceThresholds {
    /// Map a confidence to a status.
    #[must_use]
    pub fn classify(&self, confidence: f64, has_resolved_authors: bool) -> ValidationStatus {
        if !has_resolved_authors {
            ValidationStatus::Unvalidated
        } else if confidence >= self.validated {
            ValidationStatus::Validated
        } else if confidence >= self.partial {
            ValidationStatus::Partial
        } else {
            ValidationStatus::Failed
        }
    }
}

/// Normalize an author name for comparison.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    let mapped: String = name
        .chars()
        .filter_map(|c| match c {
            '-' | '_' | ',' => Some(' '),
            c if c.is_whitespace() => Some(' '),
            c if c.is_alphanumeric() => Some(c),
            _ => None,
        })
        .collect();
    mapped.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Returns true if the text elides authors with "et al.".
#[must_use]
pub fn contains_et_al(text: &str) -> bool {
    ET_AL.is_match(text)
}

/// A normalized name reduced to its usable match tokens.
struct NameKey {
    first: Option<String>,
    last: Option<String>,
}

impl NameKey {
    fn new(raw: &str) -> Option<Self> {
        let stripped = ET_AL.replace_all(raw, " ");
        let normalized = normalize_name(&stripped);
        let tokens: Vec<&str> = normalized.split(' ').filter(|t| !t.is_empty()).collect();
        if tokens.is_empty() {
            return None;
        }
        let significant = |t: &&str| t.chars().count() > 1;
        Some(Self {
            first: tokens.first().copied().filter(significant).map(str::to_string),
            last: tokens.last().copied().filter(significant).map(str::to_string),
        })
    }

    fn tokens(&self) -> impl Iterator<Item = &str> {
        self.first.iter().chain(self.last.iter()).map(String::as_str)
    }

    fn matches(&self, other: &Self) -> bool {
        self.tokens().any(|mine| other.tokens().any(|theirs| mine == theirs))
    }
}

/// Score asserted authors against resolved authors.
#[must_use]
pub fn score_authors(
    citation_id: &str,
    asserted: &[String],
    resolved: &[String],
    asserted_text: &str,
    thresholds: &ConfidenceThresholds,
) -> ValidationResult {
    let mut issues = Vec::new();

    let elided = contains_et_al(asserted_text) || asserted.iter().any(|a| contains_et_al(a));
    if elided {
        issues.push(ValidationIssue::new(
            IssueKind::EtAlElision,
            "asserted citation elides authors with \"et al.\"",
        ));
    }

    // Entries that are only "et al." name nobody and do not count.
    let asserted_keys: Vec<(&String, NameKey)> =
        asserted.iter().filter_map(|a| NameKey::new(a).map(|key| (a, key))).collect();
    let resolved_keys: Vec<Option<NameKey>> = resolved.iter().map(|r| NameKey::new(r)).collect();

    if resolved.is_empty() {
        issues.push(ValidationIssue::new(
            IssueKind::NoResolutionData,
            "no resolved authors to compare against",
        ));
        return ValidationResult {
            citation_id: citation_id.to_string(),
            asserted_authors: asserted.to_vec(),
            resolved_authors: Vec::new(),
            status: ValidationStatus::Unvalidated,
            confidence_score: 0.0,
            issues,
        };
    }

    let mut used = vec![false; resolved_keys.len()];
    let mut matches = 0usize;
    for (raw, key) in &asserted_keys {
        let hit = resolved_keys
            .iter()
            .enumerate()
            .find(|(i, candidate)| !used[*i] && candidate.as_ref().is_some_and(|c| key.matches(c)))
            .map(|(i, _)| i);
        match hit {
            Some(i) => {
                used[i] = true;
                matches += 1;
            }
            None => issues.push(ValidationIssue::new(
                IssueKind::UnmatchedAuthor,
                format!("asserted author \"{raw}\" not found among resolved authors"),
            )),
        }
    }

    if resolved.len() > asserted_keys.len() {
        let surplus: Vec<&str> = resolved
            .iter()
            .zip(&used)
            .filter(|(_, used)| !**used)
            .map(|(name, _)| name.as_str())
            .collect();
        let count = resolved.len() - asserted_keys.len();
        issues.push(ValidationIssue::new(
            IssueKind::AdditionalResolvedAuthors,
            format!(
                "{count} additional resolved author{}: {}",
                if count == 1 { "" } else { "s" },
                surplus.join("; ")
            ),
        ));
    }

    #[allow(clippy::cast_precision_loss)]
    let confidence = (matches as f64 / asserted_keys.len().max(1) as f64).clamp(0.0, 1.0);
    let status = thresholds.classify(confidence, true);

    tracing::debug!(citation_id, confidence, status = status.marker(), "Scored citation");

    ValidationResult {
        citation_id: citation_id.to_string(),
        asserted_authors: asserted.to_vec(),
        resolved_authors: resolved.to_vec(),
        status,
        confidence_score: confidence,
        issues,
    }
}

/// Score a citation against optional resolved metadata.
///
/// A manual override that carries corrected text but no authors is taken as
/// human-verified and validated outright.
#[must_use]
pub fn score_citation(
    citation: &RawCitation,
    metadata: Option<&BibliographicMetadata>,
    thresholds: &ConfidenceThresholds,
) -> ValidationResult {
    let resolved = metadata.map_or(&[][..], |m| m.authors.as_slice());
    let mut result = score_authors(
        &citation.citation_id(),
        &citation.asserted_authors,
        resolved,
        &citation.asserted_text,
        thresholds,
    );

    let vouched = metadata.and_then(BibliographicMetadata::manual_citation_text).is_some();
    if vouched && result.status == ValidationStatus::Unvalidated {
        result.status = ValidationStatus::Validated;
        result.confidence_score = 1.0;
        result.issues.retain(|issue| issue.kind != IssueKind::NoResolutionData);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    fn score(asserted: &[&str], resolved: &[&str], text: &str) -> ValidationResult {
        score_authors(
            "c",
            &names(asserted),
            &names(resolved),
            text,
            &ConfidenceThresholds::default(),
        )
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  Smith,  John "), "smith john");
        assert_eq!(normalize_name("Jean-Paul_Sartre"), "jean paul sartre");
        assert_eq!(normalize_name("O'Brien, J.R."), "obrien jr");
        assert_eq!(normalize_name("ÅSTRÖM, K."), "åström k");
    }

    #[test]
    fn test_last_first_forms_match() {
        let result = score(&["John Smith"], &["Smith, John"], "Smith (2020)");
        assert!((result.confidence_score - 1.0).abs() < f64::EPSILON);
        assert_eq!(result.status, ValidationStatus::Validated);
        assert!(result.issues.is_empty());
    }

    #[test]
    fn test_name_key_drops_initials() {
        let key = NameKey::new("Smith, J.").unwrap();
        assert_eq!(key.first.as_deref(), Some("smith"));
        assert_eq!(key.last, None);

        let key = NameKey::new("J Smith").unwrap();
        assert_eq!(key.first, None);
        assert_eq!(key.last.as_deref(), Some("smith"));

        assert!(NameKey::new("et al.").is_none());
    }

    #[test]
    fn test_initials_alone_do_not_match() {
        let result = score(&["J"], &["Jones, J"], "J (2020)");
        assert_eq!(result.confidence_score, 0.0);
        assert_eq!(result.status, ValidationStatus::Failed);
    }

    #[test]
    fn test_resolved_author_used_once() {
        let result = score(&["Smith J", "Smith K"], &["Smith, John"], "Smith and Smith");
        assert!((result.confidence_score - 0.5).abs() < f64::EPSILON);
        assert_eq!(result.status, ValidationStatus::Partial);
        assert!(result.has_issue(IssueKind::UnmatchedAuthor));
    }

    #[test]
    fn test_et_al_entry_excluded_from_denominator() {
        let result = score(&["Smith", "et al."], &["Smith, John", "Doe, Jane"], "Smith et al. (2023)");
        assert!((result.confidence_score - 1.0).abs() < f64::EPSILON);
        assert!(result.has_issue(IssueKind::EtAlElision));
        assert!(result.has_issue(IssueKind::AdditionalResolvedAuthors));
    }

    #[test]
    fn test_thresholds_are_configurable() {
        let strict = ConfidenceThresholds { validated: 0.95, partial: 0.9 };
        assert_eq!(strict.classify(0.9, true), ValidationStatus::Partial);
        assert_eq!(strict.classify(0.85, true), ValidationStatus::Failed);
        assert_eq!(strict.classify(0.0, false), ValidationStatus::Unvalidated);
    }
}
