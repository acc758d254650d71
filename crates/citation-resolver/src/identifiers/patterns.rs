//! Identifier patterns, checked in precedence order.
//!
//! Publisher-specific DOI shapes come first, then arXiv, then PubMed Central,
//! then the generic `/doi/` path shape, then bare DOI strings.

use std::sync::LazyLock;

use regex::Regex;

use super::CanonicalIdentifier;

static DOI_ORG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:https?://)?(?:www\.)?(?:dx\.)?doi\.org/(?:doi:)?(?P<doi>10\.\d{4,9}(?:/|%2F)[^\s?#]+)")
        .expect("valid regex")
});

static SPRINGER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:https?://)?link\.springer\.com/(?:article|chapter|content/pdf)/(?P<doi>10\.\d{4,9}(?:/|%2F)[^\s?#]+)",
    )
    .expect("valid regex")
});

static NATURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:https?://)?(?:www\.)?nature\.com/articles/(?P<id>[a-z0-9][a-z0-9.\-]*)")
        .expect("valid regex")
});

static DOI_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:https?://)?[^/\s]+/doi/(?:(?:abs|full|pdf|epdf|pdfdirect|fulltext|book|reader)/)?(?P<doi>10\.\d{4,9}(?:/|%2F)[^\s?#]+)",
    )
    .expect("valid regex")
});

static ARXIV_NEW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:https?://)?(?:www\.|export\.)?arxiv\.org/(?:abs|pdf|html)/(?P<id>\d{4}\.\d{4,5})(?:v\d+)?(?:\.pdf)?(?:[/?#].*)?$",
    )
    .expect("valid regex")
});

static ARXIV_LEGACY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:https?://)?(?:www\.|export\.)?arxiv\.org/(?:abs|pdf)/(?P<id>[a-z][a-z\-]*(?:\.[a-z]{2})?/\d{7})(?:v\d+)?(?:\.pdf)?(?:[/?#].*)?$",
    )
    .expect("valid regex")
});

static PMC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:https?://)?(?:www\.)?(?:ncbi\.nlm\.nih\.gov/pmc/articles|pmc\.ncbi\.nlm\.nih\.gov/articles|europepmc\.org/article/pmc|europepmc\.org/articles)/(?P<id>pmc\d+)",
    )
    .expect("valid regex")
});

static BARE_DOI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:doi:\s*)?(?P<doi>10\.\d{4,9}/\S+)$").expect("valid regex")
});

static TEXT_DOI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(?P<doi>10\.\d{4,9}/[^\s"'<>\[\]{}]+)"#).expect("valid regex")
});

static TEXT_ARXIV: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\barxiv[:\s]*(?:abs/)?(?P<id>\d{4}\.\d{4,5}|[a-z][a-z\-]*(?:\.[a-z]{2})?/\d{7})(?:v\d+)?",
    )
    .expect("valid regex")
});

static TEXT_PMC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?P<id>PMC\d{4,})\b").expect("valid regex")
});

/// Match a URL against the identifier patterns.
pub(crate) fn identifier_from_url(url: &str) -> Option<CanonicalIdentifier> {
    for re in [&*DOI_ORG, &*SPRINGER] {
        if let Some(doi) = capture(re, url, "doi").and_then(|d| clean_doi(&d)) {
            return Some(CanonicalIdentifier::doi(doi));
        }
    }

    if let Some(doi) = capture(&NATURE, url, "id").and_then(|id| clean_doi(&format!("10.1038/{id}"))) {
        return Some(CanonicalIdentifier::doi(doi));
    }

    if let Some(id) = capture(&ARXIV_NEW, url, "id").or_else(|| capture(&ARXIV_LEGACY, url, "id")) {
        return Some(CanonicalIdentifier::arxiv(id));
    }

    if let Some(id) = capture(&PMC, url, "id") {
        return Some(CanonicalIdentifier::pmc(id));
    }

    for re in [&*DOI_PATH, &*BARE_DOI] {
        if let Some(doi) = capture(re, url, "doi").and_then(|d| clean_doi(&d)) {
            return Some(CanonicalIdentifier::doi(doi));
        }
    }

    None
}

/// Find the first identifier in free text (page body, PDF text, citation string).
///
/// DOIs win over arXiv IDs, which win over PMC IDs.
#[must_use]
pub fn extract_identifier(text: &str) -> Option<CanonicalIdentifier> {
    if let Some(doi) = TEXT_DOI
        .captures_iter(text)
        .filter_map(|cap| cap.name("doi"))
        .find_map(|m| clean_doi(m.as_str()))
    {
        return Some(CanonicalIdentifier::doi(doi));
    }

    if let Some(id) = capture(&TEXT_ARXIV, text, "id") {
        return Some(CanonicalIdentifier::arxiv(id));
    }

    capture(&TEXT_PMC, text, "id").map(CanonicalIdentifier::pmc)
}

fn capture(re: &Regex, haystack: &str, group: &str) -> Option<String> {
    re.captures(haystack)?.name(group).map(|m| m.as_str().to_string())
}

/// Decode, trim and lower-case a DOI. Returns `None` when nothing DOI-shaped remains.
pub(crate) fn clean_doi(raw: &str) -> Option<String> {
    let mut decoded = raw.to_string();
    while let Ok(next) = urlencoding::decode(&decoded) {
        if next == decoded {
            break;
        }
        decoded = next.into_owned();
    }
    let end = decoded.find(|c: char| c.is_whitespace() || c == '?' || c == '#').unwrap_or(decoded.len());
    let mut doi = decoded[..end].to_string();

    loop {
        let before = doi.len();
        while doi.ends_with(['.', ',', ';', ':', ')', ']', '}', '>', '"', '\'', '/']) {
            doi.pop();
        }
        for suffix in ["/abstract", "/full", "/pdf", "/epdf", "/meta", ".pdf"] {
            if doi.to_ascii_lowercase().ends_with(suffix)
                && has_suffix_part(&doi[..doi.len() - suffix.len()])
            {
                doi.truncate(doi.len() - suffix.len());
            }
        }
        if doi.len() == before {
            break;
        }
    }

    let doi = doi.to_lowercase();
    let (prefix, suffix) = doi.split_once('/')?;
    (prefix.starts_with("10.") && !suffix.is_empty()).then_some(doi)
}

/// True when a DOI candidate still has a registrant suffix after its first `/`.
fn has_suffix_part(doi: &str) -> bool {
    doi.split_once('/').is_some_and(|(_, rest)| !rest.trim_end_matches('/').is_empty())
}
