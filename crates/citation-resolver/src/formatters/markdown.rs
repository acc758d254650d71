//! Markdown review output.

use crate::cache::{BackupHandle, CacheStats};
use crate::models::{BatchReport, CitationReport, ResolutionRecord, ValidationStatus};

/// Format a batch as a Markdown review report.
#[must_use]
pub fn format_batch_markdown(batch: &BatchReport) -> String {
    if batch.reports.is_empty() {
        return if batch.cancelled {
            format!("Run cancelled before any citation was checked ({} skipped).", batch.skipped)
        } else {
            "No citations checked.".to_string()
        };
    }

    let mut output = format!("# Citation Review ({} citations)\n\n", batch.reports.len());

    let mut summary = vec![
        format!("**Validated**: {}", batch.count(ValidationStatus::Validated)),
        format!("**Partial**: {}", batch.count(ValidationStatus::Partial)),
        format!("**Failed**: {}", batch.count(ValidationStatus::Failed)),
        format!("**Unvalidated**: {}", batch.count(ValidationStatus::Unvalidated)),
    ];
    if batch.skipped > 0 {
        summary.push(format!("**Skipped**: {}", batch.skipped));
    }
    output.push_str(&format!("{}\n\n", summary.join(" | ")));

    let flagged: Vec<&CitationReport> = batch.candidate_hallucinations().collect();
    if !flagged.is_empty() {
        output.push_str("## Candidate hallucinations\n\n");
        for report in &flagged {
            output.push_str(&format!(
                "- `{}`: \"{}\" -> {}\n",
                report.citation_id(),
                report.citation.asserted_text,
                report.formatted.prose
            ));
        }
        output.push('\n');
    }

    for (i, report) in batch.reports.iter().enumerate() {
        output.push_str(&format_report_markdown(report, i + 1));
        output.push_str("\n---\n\n");
    }

    output
}

/// Format one citation report.
#[must_use]
pub fn format_report_markdown(report: &CitationReport, index: usize) -> String {
    let validation = &report.validation;
    let mut output = format!("## {}. {}\n\n", index, report.formatted.review);

    output.push_str(&format!("**Asserted**: {}\n\n", report.citation.asserted_text));
    if !validation.asserted_authors.is_empty() {
        output.push_str(&format!(
            "**Asserted authors**: {}\n\n",
            validation.asserted_authors.join("; ")
        ));
    }
    if !validation.resolved_authors.is_empty() {
        output.push_str(&format!(
            "**Resolved authors**: {}\n\n",
            validation.resolved_authors.join("; ")
        ));
    }

    output.push_str(&format!(
        "**Confidence**: {:.2} | **Status**: {}\n\n",
        validation.confidence_score,
        validation.status.marker()
    ));

    if let Some(meta) = &report.metadata {
        let mut line = format!("**Title**: {}", meta.title_or_default());
        if let Some(venue) = &meta.venue {
            line.push_str(&format!(" | **Venue**: {venue}"));
        }
        if let Some(doi) = &meta.doi {
            line.push_str(&format!(" | [DOI](https://doi.org/{doi})"));
        }
        output.push_str(&format!("{line}\n\n"));
    }

    output.push_str(&format!("**Source**: {}\n\n", report.citation.source_url));

    if !validation.issues.is_empty() {
        output.push_str("**Issues**:\n");
        for issue in &validation.issues {
            output.push_str(&format!("- {}\n", issue.message));
        }
        output.push('\n');
    }

    output
}

/// Format cache statistics.
#[must_use]
pub fn format_stats_markdown(stats: &CacheStats) -> String {
    format!(
        "# Resolution cache\n\n**Total**: {} | **Valid**: {} | **With identifier**: {} | **Errors**: {}\n",
        stats.total, stats.valid, stats.with_identifier, stats.errors
    )
}

/// Format cached failures.
#[must_use]
pub fn format_failed_markdown(records: &[ResolutionRecord]) -> String {
    if records.is_empty() {
        return "No failed resolutions cached.".to_string();
    }
    let mut output = format!("# Failed resolutions ({})\n\n", records.len());
    for record in records {
        output.push_str(&format!(
            "- {} ({}): {}\n",
            record.normalized_url,
            record.fetched_at.format("%Y-%m-%d"),
            record.error_message.as_deref().unwrap_or("unknown error")
        ));
    }
    output
}

/// Format a list of backups, newest first.
#[must_use]
pub fn format_backups_markdown(backups: &[BackupHandle]) -> String {
    if backups.is_empty() {
        return "No backups.".to_string();
    }
    let mut output = format!("# Backups ({})\n\n", backups.len());
    for backup in backups {
        output.push_str(&format!(
            "- {} `{}`\n",
            backup.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
            backup.path.display()
        ));
    }
    output
}
