//! CSL-JSON records (DOI content negotiation) and Crossref `works` items,
//! which share the CSL field layout.

use serde::Deserialize;
use serde_json::Value;

use super::{ParseResult, non_empty};
use crate::models::BibliographicMetadata;

/// A CSL name.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CslName {
    /// Family name.
    #[serde(default)]
    pub family: Option<String>,
    /// Given name(s).
    #[serde(default)]
    pub given: Option<String>,
    /// Institutional or unparsed name.
    #[serde(default)]
    pub literal: Option<String>,
    /// Some providers put the full name here.
    #[serde(default)]
    pub name: Option<String>,
}

impl CslName {
    /// Render as "Family, Given".
    #[must_use]
    pub fn display(&self) -> Option<String> {
        let family = self.family.as_deref().and_then(non_empty);
        let given = self.given.as_deref().and_then(non_empty);
        match (family, given) {
            (Some(family), Some(given)) => Some(format!("{family}, {given}")),
            (Some(family), None) => Some(family),
            (None, Some(given)) => Some(given),
            (None, None) => self.literal.as_deref().or(self.name.as_deref()).and_then(non_empty),
        }
    }
}

/// A CSL date.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CslDate {
    /// `[[year, month, day]]`; elements may be numbers or strings.
    #[serde(rename = "date-parts", default)]
    pub date_parts: Vec<Vec<Value>>,
    /// Unparsed date string.
    #[serde(default)]
    pub raw: Option<String>,
}

impl CslDate {
    /// Year of the first date part.
    #[must_use]
    pub fn year(&self) -> Option<i32> {
        let from_parts = self.date_parts.first().and_then(|parts| parts.first()).and_then(|v| match v {
            Value::Number(n) => n.as_i64().and_then(|y| i32::try_from(y).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        });
        from_parts.or_else(|| self.raw.as_deref().and_then(super::first_year))
    }
}

/// One CSL item.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CslItem {
    /// Title; Crossref sends an array.
    #[serde(default)]
    pub title: Option<Value>,
    /// Authors.
    #[serde(default)]
    pub author: Vec<CslName>,
    /// Editors, used when no author is listed.
    #[serde(default)]
    pub editor: Vec<CslName>,
    /// Issue date.
    #[serde(default)]
    pub issued: Option<CslDate>,
    /// Print publication date.
    #[serde(rename = "published-print", default)]
    pub published_print: Option<CslDate>,
    /// Online publication date.
    #[serde(rename = "published-online", default)]
    pub published_online: Option<CslDate>,
    /// Journal or proceedings.
    #[serde(rename = "container-title", default)]
    pub container_title: Option<Value>,
    /// Publisher, used as venue for reports and preprints.
    #[serde(default)]
    pub publisher: Option<String>,
    /// Volume.
    #[serde(default)]
    pub volume: Option<Value>,
    /// Pages.
    #[serde(default)]
    pub page: Option<Value>,
    /// Article number, used when pages are absent.
    #[serde(rename = "article-number", default)]
    pub article_number: Option<Value>,
    /// DOI.
    #[serde(rename = "DOI", default)]
    pub doi: Option<String>,
}

impl CslItem {
    /// Title as a single string.
    #[must_use]
    pub fn title_text(&self) -> Option<String> {
        self.title.as_ref().and_then(first_text)
    }

    /// Convert to metadata.
    #[must_use]
    pub fn into_metadata(self, provider: &str, raw: Option<String>) -> BibliographicMetadata {
        let names = if self.author.is_empty() { &self.editor } else { &self.author };
        let authors = names.iter().filter_map(CslName::display).collect();
        let year = [&self.issued, &self.published_print, &self.published_online]
            .into_iter()
            .flatten()
            .find_map(CslDate::year);
        let venue = self
            .container_title
            .as_ref()
            .and_then(first_text)
            .or_else(|| self.publisher.as_deref().and_then(non_empty));

        BibliographicMetadata {
            title: self.title_text(),
            authors,
            year,
            venue,
            volume: self.volume.as_ref().and_then(first_text),
            pages: self
                .page
                .as_ref()
                .or(self.article_number.as_ref())
                .and_then(first_text),
            doi: self.doi.as_deref().and_then(crate::identifiers::clean_doi),
            source_provider: provider.to_string(),
            raw_record: raw,
        }
    }
}

/// Parse a CSL-JSON document.
///
/// # Errors
///
/// Returns a message if the body is not a CSL object.
pub fn parse(body: &str, provider: &str) -> ParseResult<BibliographicMetadata> {
    let item: CslItem = serde_json::from_str(body).map_err(|e| format!("invalid CSL-JSON: {e}"))?;
    Ok(item.into_metadata(provider, Some(body.to_string())))
}

/// Crossref `works` search response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CrossrefWorks {
    /// Envelope.
    #[serde(default)]
    pub message: CrossrefMessage,
}

/// Crossref response envelope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CrossrefMessage {
    /// Matching works.
    #[serde(default)]
    pub items: Vec<CslItem>,
}

fn first_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => non_empty(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => items.iter().find_map(first_text),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_negotiated_record() {
        let body = r#"{
            "type": "article-journal",
            "title": "Deep  learning for citations",
            "author": [
                {"family": "Smith", "given": "John"},
                {"family": "Doe", "given": "Jane"},
                {"literal": "The CITE Consortium"}
            ],
            "issued": {"date-parts": [[2023, 4]]},
            "container-title": "Journal of Examples",
            "volume": 12,
            "page": "1-10",
            "DOI": "10.1234/ABC"
        }"#;
        let meta = parse(body, "doi.org").unwrap();
        assert_eq!(meta.title.as_deref(), Some("Deep learning for citations"));
        assert_eq!(meta.authors, vec!["Smith, John", "Doe, Jane", "The CITE Consortium"]);
        assert_eq!(meta.year, Some(2023));
        assert_eq!(meta.venue.as_deref(), Some("Journal of Examples"));
        assert_eq!(meta.volume.as_deref(), Some("12"));
        assert_eq!(meta.doi.as_deref(), Some("10.1234/abc"));
        assert_eq!(meta.source_provider, "doi.org");
        assert!(meta.raw_record.is_some());
    }

    #[test]
    fn test_crossref_item_shape() {
        let body = r#"{"message": {"items": [{
            "title": ["A Survey"],
            "author": [{"family": "Lee", "given": "David"}],
            "published-print": {"date-parts": [["2019"]]},
            "container-title": [],
            "publisher": "Example Press",
            "DOI": "10.5555/s"
        }]}}"#;
        let works: CrossrefWorks = serde_json::from_str(body).unwrap();
        let meta = works.message.items[0].clone().into_metadata("crossref", None);
        assert_eq!(meta.title.as_deref(), Some("A Survey"));
        assert_eq!(meta.year, Some(2019));
        assert_eq!(meta.venue.as_deref(), Some("Example Press"));
    }

    #[test]
    fn test_rejects_non_object() {
        assert!(parse("<html></html>", "doi.org").is_err());
        assert!(parse("[1, 2]", "doi.org").is_err());
    }
}
