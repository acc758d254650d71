//! Identifier extraction and URL normalization.
//!
//! `normalize` is pure and deterministic: it never performs I/O and never
//! fails. URLs carrying a DOI, arXiv ID or PMCID are rewritten to the
//! identifier's canonical resource URL, so every alias of a work maps to the
//! same cache key. Other URLs lose tracking parameters and fragments and get
//! canonical scheme/host casing. Input that is not a URL at all comes back
//! trimmed.

mod patterns;

use serde::{Deserialize, Serialize};
use url::Url;

pub use patterns::extract_identifier;
pub(crate) use patterns::clean_doi;

/// Kind of persistent identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
    /// Digital Object Identifier.
    Doi,
    /// arXiv identifier (new `YYMM.NNNNN` or legacy `category/NNNNNNN`).
    Arxiv,
    /// PubMed Central identifier.
    Pmcid,
    /// Nothing derivable.
    #[default]
    None,
}

impl IdentifierKind {
    /// Column value used by the cache.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Doi => "doi",
            Self::Arxiv => "arxiv",
            Self::Pmcid => "pmcid",
            Self::None => "none",
        }
    }

    /// Parse a column value; unknown values map to `None`.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "doi" => Self::Doi,
            "arxiv" => Self::Arxiv,
            "pmcid" => Self::Pmcid,
            _ => Self::None,
        }
    }
}

/// An identifier together with the canonical URL of the work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalIdentifier {
    /// Identifier kind.
    pub kind: IdentifierKind,
    /// Identifier value (DOIs lower-cased, PMCIDs upper-cased).
    pub value: String,
    /// Canonical resource URL; empty for `IdentifierKind::None`.
    pub canonical_url: String,
}

impl CanonicalIdentifier {
    /// A DOI; `value` must already be cleaned.
    #[must_use]
    pub fn doi(value: impl Into<String>) -> Self {
        let value = value.into();
        let canonical_url = format!("https://doi.org/{value}");
        Self { kind: IdentifierKind::Doi, value, canonical_url }
    }

    /// An arXiv ID without version suffix.
    #[must_use]
    pub fn arxiv(value: impl Into<String>) -> Self {
        let value = value.into();
        let canonical_url = format!("https://arxiv.org/abs/{value}");
        Self { kind: IdentifierKind::Arxiv, value, canonical_url }
    }

    /// A PubMed Central ID (`PMC` prefix).
    #[must_use]
    pub fn pmc(value: impl Into<String>) -> Self {
        let value = value.into().to_ascii_uppercase();
        let canonical_url = format!("https://www.ncbi.nlm.nih.gov/pmc/articles/{value}/");
        Self { kind: IdentifierKind::Pmcid, value, canonical_url }
    }

    /// No identifier.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Returns true when nothing was derived.
    #[must_use]
    pub fn is_none(&self) -> bool {
        self.kind == IdentifierKind::None
    }

    /// The DOI value, if this is a DOI.
    #[must_use]
    pub fn as_doi(&self) -> Option<&str> {
        (self.kind == IdentifierKind::Doi).then_some(self.value.as_str())
    }

    /// DOI to use for content negotiation: the DOI itself, or the DataCite
    /// DOI arXiv registers for every preprint.
    #[must_use]
    pub fn negotiable_doi(&self) -> Option<String> {
        match self.kind {
            IdentifierKind::Doi => Some(self.value.clone()),
            IdentifierKind::Arxiv if !self.value.contains('/') => {
                Some(format!("10.48550/arxiv.{}", self.value))
            }
            _ => None,
        }
    }
}

/// Output of `normalize`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Normalized {
    /// Normalized URL (cache key input).
    pub url: String,
    /// Identifier derived from the URL.
    pub identifier: CanonicalIdentifier,
}

/// Tracking parameters removed from generic URLs.
const TRACKING_PARAMS: &[&str] = &[
    "fbclid", "gclid", "dclid", "msclkid", "mc_cid", "mc_eid", "_ga", "_hsenc", "_hsmi", "ref",
    "ref_src", "src", "cmpid", "s_kwcid", "igshid",
];

fn is_tracking_param(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key.as_str())
}

/// Passes allowed for canonicalization to settle.
const MAX_PASSES: usize = 4;

/// Normalize a URL and derive its identifier.
#[must_use]
pub fn normalize(url: &str) -> Normalized {
    // Canonicalization can expose a new shape (resolved dot segments, a
    // trailing quote), so iterate to a fixpoint.
    let mut current = normalize_once(url);
    for _ in 0..MAX_PASSES {
        let next = normalize_once(&current.url);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn normalize_once(url: &str) -> Normalized {
    let trimmed =
        url.trim_matches(|c: char| c.is_whitespace() || matches!(c, '<' | '>' | '"' | '\''));

    if trimmed.is_empty() {
        return Normalized { url: String::new(), identifier: CanonicalIdentifier::none() };
    }

    if let Some(identifier) = patterns::identifier_from_url(trimmed) {
        return Normalized { url: identifier.canonical_url.clone(), identifier };
    }

    let generic = canonicalize_generic(trimmed);
    match patterns::identifier_from_url(&generic) {
        Some(identifier) => Normalized { url: identifier.canonical_url.clone(), identifier },
        None => Normalized { url: generic, identifier: CanonicalIdentifier::none() },
    }
}

fn canonicalize_generic(input: &str) -> String {
    let parsed = match Url::parse(input) {
        Ok(url) => Some(url),
        Err(url::ParseError::RelativeUrlWithoutBase) if looks_like_host(input) => {
            Url::parse(&format!("https://{input}")).ok()
        }
        Err(_) => None,
    };

    let Some(mut url) = parsed else {
        return input.to_string();
    };

    if !matches!(url.scheme(), "http" | "https") {
        return url.to_string();
    }

    url.set_fragment(None);

    let pairs: Vec<(String, String)> =
        url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect();
    let kept: Vec<&(String, String)> = pairs.iter().filter(|(k, _)| !is_tracking_param(k)).collect();

    if kept.is_empty() {
        url.set_query(None);
    } else if kept.len() != pairs.len() {
        url.query_pairs_mut().clear().extend_pairs(kept.iter().map(|(k, v)| (k, v)));
    }

    url.to_string()
}

fn looks_like_host(input: &str) -> bool {
    let host = input.split('/').next().unwrap_or_default();
    host.contains('.') && !host.contains(char::is_whitespace) && !host.starts_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doi_aliases_converge() {
        let expected = "https://doi.org/10.1000/x";
        for url in [
            "doi.org/10.1000/x",
            "https://doi.org/10.1000/x",
            "http://dx.doi.org/10.1000/X",
            "https://onlinelibrary.wiley.com/doi/abs/10.1000/x",
            "https://onlinelibrary.wiley.com/doi/full/10.1000/x?af=R",
        ] {
            let normalized = normalize(url);
            assert_eq!(normalized.url, expected, "{url}");
            assert_eq!(normalized.identifier.value, "10.1000/x");
            assert_eq!(normalized.identifier.kind, IdentifierKind::Doi);
        }
    }

    #[test]
    fn test_arxiv_version_stripped() {
        let a = normalize("https://arxiv.org/abs/2301.01234v3");
        let b = normalize("http://arxiv.org/pdf/2301.01234.pdf");
        assert_eq!(a, b);
        assert_eq!(a.url, "https://arxiv.org/abs/2301.01234");
        assert_eq!(a.identifier.negotiable_doi().as_deref(), Some("10.48550/arxiv.2301.01234"));
    }

    #[test]
    fn test_pmc_forms_converge() {
        let a = normalize("https://www.ncbi.nlm.nih.gov/pmc/articles/PMC7096724/");
        let b = normalize("https://pmc.ncbi.nlm.nih.gov/articles/pmc7096724");
        let c = normalize("https://europepmc.org/article/PMC/PMC7096724");
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(a.identifier.value, "PMC7096724");
    }

    #[test]
    fn test_generic_strips_tracking_and_casing() {
        let n = normalize("HTTPS://Example.ORG/Blog/Post?utm_source=x&id=7&fbclid=abc#section");
        assert_eq!(n.url, "https://example.org/Blog/Post?id=7");
        assert!(n.identifier.is_none());

        let n = normalize("https://example.org/page?utm_medium=email");
        assert_eq!(n.url, "https://example.org/page");
    }

    #[test]
    fn test_malformed_input_degrades() {
        assert_eq!(normalize("   not a url   ").url, "not a url");
        assert_eq!(normalize("").url, "");
        assert_eq!(normalize("<https://example.org/a>").url, "https://example.org/a");
    }

    #[test]
    fn test_idempotent_on_samples() {
        for url in [
            "https://doi.org/10.1000/x",
            "https://arxiv.org/abs/hep-th/9901001",
            "example.org/path?utm_campaign=z&q=1",
            "mailto:someone@example.org",
            "ftp://files.example.org/a b",
        ] {
            let once = normalize(url);
            assert_eq!(normalize(&once.url), once, "{url}");
        }
    }
}
