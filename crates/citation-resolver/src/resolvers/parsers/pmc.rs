//! NCBI E-utilities `esummary` JSON for PubMed Central records.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use super::{ParseResult, first_year, non_empty};
use crate::models::BibliographicMetadata;

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    result: Option<HashMap<String, Value>>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Summary {
    #[serde(default)]
    title: String,
    #[serde(default)]
    authors: Vec<SummaryAuthor>,
    #[serde(default)]
    pubdate: String,
    #[serde(default)]
    epubdate: String,
    #[serde(default)]
    fulljournalname: String,
    #[serde(default)]
    source: String,
    #[serde(default)]
    volume: String,
    #[serde(default)]
    pages: String,
    #[serde(default)]
    articleids: Vec<ArticleId>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SummaryAuthor {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct ArticleId {
    #[serde(default)]
    idtype: String,
    #[serde(default)]
    value: String,
}

/// Numeric id esummary expects for a `PMCnnnn` identifier.
#[must_use]
pub fn numeric_id(pmcid: &str) -> &str {
    pmcid.trim_start_matches(|c: char| c.is_ascii_alphabetic())
}

/// Parse the summary for one PMC record.
///
/// # Errors
///
/// Returns a message for malformed JSON or a missing / error summary.
pub fn parse(body: &str, pmcid: &str, provider: &str) -> ParseResult<BibliographicMetadata> {
    let envelope: Envelope = serde_json::from_str(body).map_err(|e| format!("invalid esummary JSON: {e}"))?;
    if let Some(error) = envelope.error {
        return Err(format!("esummary error: {error}"));
    }

    let uid = numeric_id(pmcid);
    let value = envelope
        .result
        .and_then(|mut result| result.remove(uid))
        .ok_or_else(|| format!("esummary has no record for {pmcid}"))?;
    let summary: Summary =
        serde_json::from_value(value).map_err(|e| format!("invalid esummary record: {e}"))?;
    if let Some(error) = summary.error {
        return Err(format!("esummary error for {pmcid}: {error}"));
    }

    let doi = summary
        .articleids
        .iter()
        .find(|id| id.idtype.eq_ignore_ascii_case("doi"))
        .and_then(|id| crate::identifiers::clean_doi(&id.value));

    Ok(BibliographicMetadata {
        title: non_empty(summary.title.trim_end_matches('.')),
        authors: summary.authors.iter().filter_map(|a| non_empty(&a.name)).collect(),
        year: first_year(&summary.pubdate).or_else(|| first_year(&summary.epubdate)),
        venue: non_empty(&summary.fulljournalname).or_else(|| non_empty(&summary.source)),
        volume: non_empty(&summary.volume),
        pages: non_empty(&summary.pages),
        doi,
        source_provider: provider.to_string(),
        raw_record: Some(body.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_summary() {
        let body = r#"{"header": {}, "result": {"uids": ["7096724"], "7096724": {
            "uid": "7096724",
            "title": "A pneumonia outbreak associated with a new coronavirus.",
            "authors": [{"name": "Zhou P", "authtype": "Author"}, {"name": "Yang XL"}],
            "pubdate": "2020 Mar",
            "fulljournalname": "Nature",
            "volume": "579",
            "pages": "270-273",
            "articleids": [{"idtype": "doi", "value": "10.1038/s41586-020-2012-7"}]
        }}}"#;
        let meta = parse(body, "PMC7096724", "pmc").unwrap();
        assert_eq!(meta.title.as_deref(), Some("A pneumonia outbreak associated with a new coronavirus"));
        assert_eq!(meta.authors, vec!["Zhou P", "Yang XL"]);
        assert_eq!(meta.year, Some(2020));
        assert_eq!(meta.doi.as_deref(), Some("10.1038/s41586-020-2012-7"));
    }

    #[test]
    fn test_error_summary() {
        let body = r#"{"result": {"uids": ["1"], "1": {"uid": "1", "error": "cannot get document summary"}}}"#;
        assert!(parse(body, "PMC1", "pmc").is_err());
        assert!(parse(r#"{"error": "API rate limit exceeded"}"#, "PMC1", "pmc").is_err());
        assert!(parse("{}", "PMC1", "pmc").is_err());
    }

    #[test]
    fn test_numeric_id() {
        assert_eq!(numeric_id("PMC7096724"), "7096724");
    }
}
