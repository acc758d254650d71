//! Record parsers.
//!
//! Each parser turns one provider payload into [`BibliographicMetadata`].
//! Malformed input is reported as an error message, never a panic; the
//! resolvers wrap it into a `ResolveError::Parse`.

pub mod arxiv;
pub mod bibtex;
pub mod csl;
pub mod html;
pub mod pmc;
pub mod ris;

use std::sync::LazyLock;

use regex::Regex;

#[cfg(doc)]
use crate::models::BibliographicMetadata;

/// Result of a record parser.
pub type ParseResult<T> = Result<T, String>;

static YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(1[6-9]\d{2}|20\d{2})\b").expect("valid regex"));

/// First plausible publication year in a string.
#[must_use]
pub fn first_year(text: &str) -> Option<i32> {
    YEAR.captures(text)?.get(1)?.as_str().parse().ok()
}

/// Collapse runs of whitespace and trim.
#[must_use]
pub fn squash(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Trimmed, squashed text; `None` when empty.
#[must_use]
pub fn non_empty(text: &str) -> Option<String> {
    let squashed = squash(text);
    (!squashed.is_empty()).then_some(squashed)
}
