//! Bibliographic signals in HTML pages.
//!
//! Covers Highwire Press `citation_*` meta tags (Google Scholar's inclusion
//! format, emitted by most publishers), Dublin Core `DC.*` tags, the page
//! title, and links to downloadable BibTeX / RIS records.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use super::{first_year, non_empty};
use crate::models::BibliographicMetadata;

static META_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<meta\s[^>]*>").expect("valid regex"));

static LINK_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<(?:a|link)\s[^>]*>").expect("valid regex"));

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)([a-z_:\-]+)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#).expect("valid regex")
});

static TITLE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid regex"));

static NUMERIC_ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#(x[0-9a-fA-F]+|\d+);").expect("valid regex"));

/// Downloadable record format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    /// BibTeX.
    Bibtex,
    /// RIS.
    Ris,
}

/// `<meta>` name/content pairs; names lower-cased.
#[must_use]
pub fn meta_tags(html: &str) -> Vec<(String, String)> {
    META_TAG
        .find_iter(html)
        .filter_map(|tag| {
            let attrs = attributes(tag.as_str());
            let name = attrs
                .iter()
                .find(|(k, _)| k == "name" || k == "property" || k == "itemprop")
                .map(|(_, v)| v.to_ascii_lowercase())?;
            let content = attrs.iter().find(|(k, _)| k == "content").map(|(_, v)| v.clone())?;
            Some((name, content))
        })
        .collect()
}

fn attributes(tag: &str) -> Vec<(String, String)> {
    ATTRIBUTE
        .captures_iter(tag)
        .filter_map(|cap| {
            let key = cap.get(1)?.as_str().to_ascii_lowercase();
            let value = cap.get(2).or_else(|| cap.get(3)).or_else(|| cap.get(4))?.as_str();
            Some((key, decode_entities(value)))
        })
        .collect()
}

/// Decode the HTML entities that show up in titles and names.
#[must_use]
pub fn decode_entities(text: &str) -> String {
    let named = text
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-");
    let numeric = NUMERIC_ENTITY.replace_all(&named, |cap: &regex::Captures<'_>| {
        let code = &cap[1];
        let parsed = code
            .strip_prefix('x')
            .map_or_else(|| code.parse::<u32>().ok(), |hex| u32::from_str_radix(hex, 16).ok());
        parsed.and_then(char::from_u32).map_or_else(|| cap[0].to_string(), String::from)
    });
    numeric.replace("&amp;", "&")
}

fn values<'a>(metas: &'a [(String, String)], names: &'a [&str]) -> impl Iterator<Item = &'a str> {
    metas
        .iter()
        .filter(move |(name, _)| names.iter().any(|wanted| *wanted == name.as_str()))
        .map(|(_, content)| content.as_str())
}

fn first_value(metas: &[(String, String)], names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| values(metas, &[*name]).find_map(non_empty))
}

/// Metadata from Highwire `citation_*` or Dublin Core tags, if the page has any.
#[must_use]
pub fn scholarly_meta(html: &str, provider: &str) -> Option<BibliographicMetadata> {
    let metas = meta_tags(html);

    let mut authors: Vec<String> =
        values(&metas, &["citation_author"]).filter_map(non_empty).collect();
    if authors.is_empty() {
        authors = values(&metas, &["citation_authors"])
            .flat_map(|list| list.split(';'))
            .filter_map(non_empty)
            .collect();
    }
    if authors.is_empty() {
        authors = values(&metas, &["dc.creator", "dcterms.creator"]).filter_map(non_empty).collect();
    }

    let title = first_value(&metas, &["citation_title", "dc.title", "dcterms.title"]);
    if title.is_none() && authors.is_empty() {
        return None;
    }

    let year = [
        "citation_publication_date",
        "citation_date",
        "citation_online_date",
        "citation_year",
        "dc.date",
        "dcterms.issued",
        "dcterms.date",
    ]
    .iter()
    .find_map(|name| values(&metas, &[*name]).find_map(first_year));

    let first_page = first_value(&metas, &["citation_firstpage"]);
    let last_page = first_value(&metas, &["citation_lastpage"]);
    let pages = match (first_page, last_page) {
        (Some(first), Some(last)) if first != last => Some(format!("{first}-{last}")),
        (first, last) => first.or(last),
    };

    Some(BibliographicMetadata {
        title,
        authors,
        year,
        venue: first_value(
            &metas,
            &[
                "citation_journal_title",
                "citation_conference_title",
                "citation_inbook_title",
                "citation_publisher",
                "dc.source",
                "dc.publisher",
            ],
        ),
        volume: first_value(&metas, &["citation_volume"]),
        pages,
        doi: doi_meta(html),
        source_provider: provider.to_string(),
        raw_record: None,
    })
}

/// DOI declared in the page's meta tags.
#[must_use]
pub fn doi_meta(html: &str) -> Option<String> {
    let metas = meta_tags(html);
    values(
        &metas,
        &["citation_doi", "prism.doi", "bepress_citation_doi", "dc.identifier", "dcterms.identifier"],
    )
    .find_map(|value| {
        let value = value.trim();
        let value = value
            .strip_prefix("doi:")
            .or_else(|| value.strip_prefix("info:doi/"))
            .unwrap_or(value);
        let value = value
            .find("10.")
            .map_or(value, |start| &value[start..]);
        crate::identifiers::clean_doi(value)
    })
}

/// Page title from `<title>`, `og:title` or `citation_title`.
#[must_use]
pub fn page_title(html: &str) -> Option<String> {
    let metas = meta_tags(html);
    first_value(&metas, &["citation_title", "og:title", "dc.title"]).or_else(|| {
        TITLE_TAG
            .captures(html)
            .and_then(|cap| cap.get(1))
            .and_then(|m| non_empty(&decode_entities(m.as_str())))
    })
}

/// Links to downloadable BibTeX / RIS records, resolved against `base`.
#[must_use]
pub fn record_links(html: &str, base: &str) -> Vec<(String, RecordFormat)> {
    let base = Url::parse(base).ok();
    let mut links = Vec::new();

    for tag in LINK_TAG.find_iter(html) {
        let attrs = attributes(tag.as_str());
        let Some(href) = attrs.iter().find(|(k, _)| k == "href").map(|(_, v)| v.trim()) else {
            continue;
        };
        let Some(format) = record_format(href) else {
            continue;
        };
        let absolute = match &base {
            Some(base) => base.join(href).map(String::from).ok(),
            None => Url::parse(href).ok().map(String::from),
        };
        if let Some(absolute) = absolute {
            if !links.iter().any(|(existing, _)| existing == &absolute) {
                links.push((absolute, format));
            }
        }
    }

    links
}

fn record_format(href: &str) -> Option<RecordFormat> {
    let lower = href.to_ascii_lowercase();
    let path = lower.split(['?', '#']).next().unwrap_or_default();
    if path.ends_with(".bib")
        || path.ends_with("/bibtex")
        || lower.contains("format=bibtex")
        || lower.contains("type=bibtex")
    {
        Some(RecordFormat::Bibtex)
    } else if path.ends_with(".ris")
        || path.ends_with("/ris")
        || lower.contains("format=ris")
        || lower.contains("type=ris")
    {
        Some(RecordFormat::Ris)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head>
<title>Ignored &amp; Page</title>
<meta name="citation_title" content="Graph Methods for Citation Checking">
<meta name="citation_author" content="Smith, John">
<meta name="citation_author" content="Doe, Jane">
<meta name="citation_publication_date" content="2022/05/01">
<meta name="citation_journal_title" content="Journal of Examples">
<meta name="citation_firstpage" content="5"><meta name="citation_lastpage" content="9">
<meta name="citation_doi" content="doi:10.5555/GRAPH.2022">
<meta property="og:title" content='Graph Methods'>
</head><body>
<a class="btn" href="/export/citation.ris?x=1">RIS</a>
<a href="https://other.example/cite/bibtex">BibTeX</a>
<a href="/about">About</a>
</body></html>"#;

    #[test]
    fn test_highwire_meta() {
        let meta = scholarly_meta(PAGE, "example.org").unwrap();
        assert_eq!(meta.title.as_deref(), Some("Graph Methods for Citation Checking"));
        assert_eq!(meta.authors, vec!["Smith, John", "Doe, Jane"]);
        assert_eq!(meta.year, Some(2022));
        assert_eq!(meta.pages.as_deref(), Some("5-9"));
        assert_eq!(meta.doi.as_deref(), Some("10.5555/graph.2022"));
    }

    #[test]
    fn test_dublin_core_meta() {
        let html = r#"<meta name="DC.title" content="Report"><meta name="DC.creator" content="Roe, R."><meta name="DC.date" content="2018-02-03">"#;
        let meta = scholarly_meta(html, "x").unwrap();
        assert_eq!(meta.title.as_deref(), Some("Report"));
        assert_eq!(meta.authors, vec!["Roe, R."]);
        assert_eq!(meta.year, Some(2018));
    }

    #[test]
    fn test_no_meta() {
        assert!(scholarly_meta("<html><title>Blog</title></html>", "x").is_none());
    }

    #[test]
    fn test_page_title_fallbacks() {
        assert_eq!(page_title(PAGE).as_deref(), Some("Graph Methods for Citation Checking"));
        assert_eq!(
            page_title("<title>\n  Fish &amp; Chips &#8211; A Blog </title>").as_deref(),
            Some("Fish & Chips \u{2013} A Blog")
        );
    }

    #[test]
    fn test_record_links() {
        let links = record_links(PAGE, "https://journal.example/article/1");
        assert_eq!(
            links,
            vec![
                ("https://journal.example/export/citation.ris?x=1".to_string(), RecordFormat::Ris),
                ("https://other.example/cite/bibtex".to_string(), RecordFormat::Bibtex),
            ]
        );
    }
}
