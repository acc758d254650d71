//! Citation rendering.
//!
//! `prose` is what goes back into the document: an author-year label and
//! nothing else. `review` adds the status marker and diagnostic tags. Failed
//! citations take the resolved authors as authoritative; unvalidated ones
//! keep the asserted text and are marked for manual verification. Corrected
//! text from a manual override is used verbatim.

pub mod json;
mod label;
pub mod markdown;

use std::sync::LazyLock;

use regex::Regex;

pub use label::{format_label, format_lead_label, surname};

use crate::models::{
    BibliographicMetadata, CitationReport, FormattedCitation, IssueKind, RawCitation, Tag,
    ValidationResult, ValidationStatus,
};

/// Note appended to review text of citations nothing could corroborate.
pub const VERIFICATION_NOTE: &str = "needs manual verification";

static DIAGNOSTIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"[ \t]*(?:\[(?:VALIDATED|PARTIAL|FAILED|UNVALIDATED)\]|#(?:GUESSED|LAY|PRESS)\b|\b(?:CACHE|MANUAL|FETCH_ERROR|PARSE_ERROR|NO_IDENTIFIER|BLOCKED_[A-Z0-9_]+)\b|\(?needs manual verification\)?)",
    )
    .expect("valid regex")
});

/// Render one citation.
#[must_use]
pub fn format_citation(
    citation: &RawCitation,
    validation: &ValidationResult,
    metadata: Option<&BibliographicMetadata>,
    tags: &[Tag],
) -> FormattedCitation {
    let year = metadata.and_then(|m| m.year).or(citation.asserted_year);
    let resolved = &validation.resolved_authors;
    let status = validation.status;

    let manual_text = metadata.and_then(BibliographicMetadata::manual_citation_text);

    let prose = match (manual_text, status) {
        (Some(text), _) => text.to_string(),
        (None, ValidationStatus::Validated | ValidationStatus::Partial) => {
            if validation.has_issue(IssueKind::AdditionalResolvedAuthors) {
                format_lead_label(resolved, year)
            } else {
                format_label(resolved, year)
            }
        }
        (None, ValidationStatus::Failed) => format_label(resolved, year),
        (None, ValidationStatus::Unvalidated) => citation.asserted_text.trim().to_string(),
    };

    let mut review_tags: Vec<Tag> = Vec::with_capacity(tags.len() + 2);
    for tag in tags.iter().cloned().chain(
        (status == ValidationStatus::Unvalidated).then_some(Tag::Guessed),
    ) {
        if !matches!(tag, Tag::Status(_)) && !review_tags.contains(&tag) {
            review_tags.push(tag);
        }
    }

    let mut review = format!("{prose} [{}]", status.marker());
    if status == ValidationStatus::Failed {
        review.push_str(&format!(" (asserted: \"{}\")", citation.asserted_text.trim()));
    }
    for tag in &review_tags {
        review.push(' ');
        review.push_str(&tag.to_string());
    }
    if status == ValidationStatus::Unvalidated {
        review.push_str(&format!(" ({VERIFICATION_NOTE})"));
    }

    review_tags.insert(0, Tag::Status(status));
    FormattedCitation { prose, review, tags: review_tags }
}

/// Remove status markers and diagnostic tags from text.
#[must_use]
pub fn strip_diagnostic_tags(text: &str) -> String {
    DIAGNOSTIC.replace_all(text, "").trim().to_string()
}

/// Replace each citation's asserted text with its corrected prose.
///
/// Citations are located by their literal text, not by order, so reports
/// may arrive in any order. The recorded location is used when it still
/// points at the asserted text; otherwise the first unclaimed occurrence is
/// taken.
#[must_use]
pub fn substitute(document: &str, reports: &[CitationReport]) -> String {
    let mut edits: Vec<(usize, usize, String)> = Vec::new();

    for report in reports {
        let asserted = report.citation.asserted_text.as_str();
        let prose = strip_diagnostic_tags(&report.formatted.prose);
        if asserted.is_empty() || prose.is_empty() || asserted == prose {
            continue;
        }
        let overlaps = |start: usize, end: usize, edits: &[(usize, usize, String)]| {
            edits.iter().any(|(s, e, _)| start < *e && *s < end)
        };

        let location = report.citation.location;
        let hinted = (document.get(location.start..location.end) == Some(asserted)
            && !overlaps(location.start, location.end, &edits))
        .then_some(location.start);
        let start = hinted.or_else(|| {
            document
                .match_indices(asserted)
                .map(|(i, _)| i)
                .find(|&i| !overlaps(i, i + asserted.len(), &edits))
        });

        if let Some(start) = start {
            edits.push((start, start + asserted.len(), prose));
        }
    }

    edits.sort_by(|a, b| b.0.cmp(&a.0));
    let mut output = document.to_string();
    for (start, end, prose) in edits {
        output.replace_range(start..end, &prose);
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ValidationIssue;

    fn validation(status: ValidationStatus, resolved: &[&str]) -> ValidationResult {
        ValidationResult {
            citation_id: "c1".to_string(),
            asserted_authors: vec!["Smith J".to_string()],
            resolved_authors: resolved.iter().map(ToString::to_string).collect(),
            status,
            confidence_score: 1.0,
            issues: Vec::new(),
        }
    }

    fn meta(year: i32) -> BibliographicMetadata {
        BibliographicMetadata { year: Some(year), ..BibliographicMetadata::default() }
    }

    #[test]
    fn test_validated_with_elided_coauthors() {
        let citation = RawCitation::new("https://doi.org/10.1234/abc", "Smith (2023)");
        let mut result = validation(ValidationStatus::Validated, &["Smith, John", "Doe, Jane"]);
        result.issues.push(ValidationIssue::new(IssueKind::AdditionalResolvedAuthors, "x"));
        let formatted = format_citation(&citation, &result, Some(&meta(2023)), &[Tag::Doi]);
        assert_eq!(formatted.prose, "Smith et al. (2023)");
        assert_eq!(formatted.review, "Smith et al. (2023) [VALIDATED] DOI");
        assert_eq!(formatted.tags[0], Tag::Status(ValidationStatus::Validated));
    }

    #[test]
    fn test_failed_uses_resolved_authors() {
        let citation = RawCitation::new("https://example.org/p", "Kumar (2021)").with_year(2021);
        let result = validation(ValidationStatus::Failed, &["Lee, David"]);
        let formatted = format_citation(&citation, &result, None, &[]);
        assert_eq!(formatted.prose, "Lee (2021)");
        assert_ne!(formatted.prose, citation.asserted_text);
        assert!(formatted.review.contains("[FAILED]"));
        assert!(formatted.review.contains("Kumar (2021)"));
    }

    #[test]
    fn test_unvalidated_keeps_asserted_text() {
        let citation = RawCitation::new("https://example.org/p", "Roe (2019)");
        let result = validation(ValidationStatus::Unvalidated, &[]);
        let formatted = format_citation(&citation, &result, None, &[Tag::FetchError]);
        assert_eq!(formatted.prose, "Roe (2019)");
        assert_eq!(
            formatted.review,
            "Roe (2019) [UNVALIDATED] FETCH_ERROR #GUESSED (needs manual verification)"
        );
    }

    #[test]
    fn test_strip_diagnostic_tags() {
        assert_eq!(
            strip_diagnostic_tags("Smith et al. (2023) [VALIDATED] CACHE #GUESSED BLOCKED_MDPI"),
            "Smith et al. (2023)"
        );
        assert_eq!(
            strip_diagnostic_tags("Roe (2019) [UNVALIDATED] (needs manual verification)"),
            "Roe (2019)"
        );
        assert_eq!(strip_diagnostic_tags("A PDF about DOIs"), "A PDF about DOIs");
    }
}
