//! Confidence scorer tests.

use proptest::prelude::*;

use citation_resolver::models::{
    BibliographicMetadata, IssueKind, RawCitation, ValidationStatus,
};
use citation_resolver::scoring::{ConfidenceThresholds, score_authors, score_citation};

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(ToString::to_string).collect()
}

fn thresholds() -> ConfidenceThresholds {
    ConfidenceThresholds::default()
}

// =============================================================================
// Reference scenarios
// =============================================================================

#[test]
fn test_lead_author_with_elided_coauthor() {
    let result = score_authors(
        "a",
        &names(&["Smith J"]),
        &names(&["Smith, John", "Doe, Jane"]),
        "Smith (2023)",
        &thresholds(),
    );
    assert!((result.confidence_score - 1.0).abs() < f64::EPSILON);
    assert_eq!(result.status, ValidationStatus::Validated);
    assert_eq!(result.issues.len(), 1);
    assert!(result.has_issue(IssueKind::AdditionalResolvedAuthors));
    assert!(!result.is_candidate_hallucination());
}

#[test]
fn test_contradicting_authors_fail() {
    let result = score_authors(
        "b",
        &names(&["Kumar R"]),
        &names(&["Lee, David"]),
        "Kumar (2021)",
        &thresholds(),
    );
    assert_eq!(result.confidence_score, 0.0);
    assert_eq!(result.status, ValidationStatus::Failed);
    assert!(result.has_issue(IssueKind::UnmatchedAuthor));
    assert!(result.is_candidate_hallucination());
    assert!(result.ensure_corroborated().is_err());
}

#[test]
fn test_half_match_is_partial() {
    let result = score_authors(
        "c",
        &names(&["Smith J", "Ghost G"]),
        &names(&["Smith, John", "Doe, Jane"]),
        "Smith and Ghost (2020)",
        &thresholds(),
    );
    assert!((result.confidence_score - 0.5).abs() < f64::EPSILON);
    assert_eq!(result.status, ValidationStatus::Partial);
}

#[test]
fn test_no_metadata_is_unvalidated() {
    let citation = RawCitation::new("https://example.org", "Roe (2019)").with_authors(["Roe R"]);
    let result = score_citation(&citation, None, &thresholds());
    assert_eq!(result.status, ValidationStatus::Unvalidated);
    assert!(result.has_issue(IssueKind::NoResolutionData));
    assert!(result.ensure_corroborated().is_ok());
}

#[test]
fn test_custom_thresholds() {
    let strict = ConfidenceThresholds { validated: 1.0, partial: 0.9 };
    let meta = BibliographicMetadata {
        authors: names(&["Smith, John", "Doe, Jane"]),
        ..BibliographicMetadata::default()
    };
    let citation = RawCitation::new("https://doi.org/10.1/x", "Smith and Roe (2020)")
        .with_authors(["Smith J", "Roe R"]);
    let result = score_citation(&citation, Some(&meta), &strict);
    assert_eq!(result.status, ValidationStatus::Failed);
}

#[test]
fn test_et_al_only_entry_excluded_from_denominator() {
    let result = score_authors(
        "d",
        &names(&["Smith J", "et al."]),
        &names(&["Smith, John", "Doe, Jane", "Roe, Rita"]),
        "Smith et al. (2022)",
        &thresholds(),
    );
    assert!((result.confidence_score - 1.0).abs() < f64::EPSILON);
    assert!(result.has_issue(IssueKind::EtAlElision));
}

// =============================================================================
// Properties
// =============================================================================

fn surname() -> impl Strategy<Value = String> {
    "[A-Z][a-z]{2,9}"
}

proptest! {
    /// Identical lists always validate with full confidence.
    #[test]
    fn identical_lists_validate(authors in proptest::collection::vec(surname(), 1..6)) {
        let result = score_authors("p", &authors, &authors, "", &thresholds());
        prop_assert!((result.confidence_score - 1.0).abs() < f64::EPSILON);
        prop_assert_eq!(result.status, ValidationStatus::Validated);
    }

    /// Disjoint lists with at least one resolved author always fail.
    #[test]
    fn disjoint_lists_fail(
        asserted in proptest::collection::vec("[A-M][a-z]{2,6}q", 1..4),
        resolved in proptest::collection::vec("[N-Z][a-z]{2,6}x", 1..4),
    ) {
        let result = score_authors("p", &asserted, &resolved, "", &thresholds());
        prop_assert_eq!(result.confidence_score, 0.0);
        prop_assert_eq!(result.status, ValidationStatus::Failed);
    }

    /// No resolved authors always means Unvalidated.
    #[test]
    fn empty_resolved_is_unvalidated(asserted in proptest::collection::vec(surname(), 0..4)) {
        let result = score_authors("p", &asserted, &[], "", &thresholds());
        prop_assert_eq!(result.status, ValidationStatus::Unvalidated);
    }

    /// "et al." anywhere in the asserted authors raises an issue.
    #[test]
    fn et_al_always_raises_issue(
        lead in surname(),
        resolved in proptest::collection::vec(surname(), 0..4),
    ) {
        let asserted = vec![format!("{lead} et al.")];
        let result = score_authors("p", &asserted, &resolved, "", &thresholds());
        prop_assert!(!result.issues.is_empty());
        prop_assert!(result.has_issue(IssueKind::EtAlElision));
    }

    /// Confidence stays within [0, 1].
    #[test]
    fn confidence_is_bounded(
        asserted in proptest::collection::vec("[A-Za-z ,.]{0,20}", 0..5),
        resolved in proptest::collection::vec("[A-Za-z ,.]{0,20}", 0..5),
    ) {
        let result = score_authors("p", &asserted, &resolved, "", &thresholds());
        prop_assert!((0.0..=1.0).contains(&result.confidence_score));
    }
}
