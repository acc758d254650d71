//! JSON output formatting.
//!
//! Compact shapes for machine consumers: optional fields are omitted rather
//! than emitted as null, and tags are rendered as their review strings.

use serde_json::{Value, json};

use crate::models::{BatchReport, BibliographicMetadata, CitationReport, ResolutionRecord, Tag};

fn tag_strings(tags: &[Tag]) -> Vec<String> {
    tags.iter().map(ToString::to_string).collect()
}

/// Compact metadata representation.
#[must_use]
pub fn compact_metadata(meta: &BibliographicMetadata) -> Value {
    let mut obj = json!({
        "title": meta.title_or_default(),
        "authors": meta.authors,
        "provider": meta.source_provider,
    });

    if let Some(year) = meta.year {
        obj["year"] = json!(year);
    }
    if let Some(venue) = &meta.venue {
        obj["venue"] = json!(venue);
    }
    if let Some(doi) = &meta.doi {
        obj["doi"] = json!(doi);
    }

    obj
}

/// Compact representation of one citation report.
#[must_use]
pub fn compact_report(report: &CitationReport) -> Value {
    let validation = &report.validation;
    let mut obj = json!({
        "id": report.citation_id(),
        "url": report.citation.source_url,
        "asserted": report.citation.asserted_text,
        "prose": report.formatted.prose,
        "review": report.formatted.review,
        "status": validation.status.marker(),
        "confidence": validation.confidence_score,
        "tags": tag_strings(&report.formatted.tags),
    });

    if !validation.resolved_authors.is_empty() {
        obj["resolvedAuthors"] = json!(validation.resolved_authors);
    }
    if !validation.issues.is_empty() {
        obj["issues"] =
            json!(validation.issues.iter().map(|i| i.message.as_str()).collect::<Vec<_>>());
    }
    if let Some(meta) = &report.metadata {
        obj["metadata"] = compact_metadata(meta);
    }
    if report.is_candidate_hallucination() {
        obj["candidateHallucination"] = json!(true);
    }
    if report.from_cache {
        obj["cached"] = json!(true);
    }

    obj
}

/// Compact representation of a batch.
#[must_use]
pub fn compact_batch(batch: &BatchReport) -> Value {
    use crate::models::ValidationStatus::{Failed, Partial, Unvalidated, Validated};

    json!({
        "summary": {
            "total": batch.reports.len(),
            "validated": batch.count(Validated),
            "partial": batch.count(Partial),
            "failed": batch.count(Failed),
            "unvalidated": batch.count(Unvalidated),
            "skipped": batch.skipped,
            "cancelled": batch.cancelled,
        },
        "candidateHallucinations": batch
            .candidate_hallucinations()
            .map(CitationReport::citation_id)
            .collect::<Vec<_>>(),
        "citations": batch.reports.iter().map(compact_report).collect::<Vec<_>>(),
    })
}

/// Compact representation of a cache record.
#[must_use]
pub fn compact_record(record: &ResolutionRecord) -> Value {
    let mut obj = json!({
        "url": record.normalized_url,
        "status": record.status.as_str(),
        "fetchedAt": record.fetched_at.to_rfc3339(),
    });

    if !record.identifier.is_none() {
        obj["identifier"] = json!({
            "kind": record.identifier.kind.as_str(),
            "value": record.identifier.value,
        });
    }
    if let Some(meta) = &record.metadata {
        obj["metadata"] = compact_metadata(meta);
    }
    if let Some(message) = &record.error_message {
        obj["error"] = json!(message);
    }
    if !record.tags.is_empty() {
        obj["tags"] = json!(tag_strings(&record.tags));
    }
    if record.manual {
        obj["manual"] = json!(true);
    }

    obj
}
