//! Diagnostic tags attached to resolutions and formatted citations.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ValidationStatus;

/// A diagnostic marker.
///
/// Tags are stored in the cache and rendered in review output as their
/// string form (`CACHE`, `#GUESSED`, `BLOCKED_MDPI`, ...). They never appear
/// in corrected prose.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Tag {
    /// Served from the resolution cache.
    Cache,
    /// Human-supplied record.
    Manual,
    /// Extracted from a PDF.
    Pdf,
    /// One or more fields were inferred rather than read from a record.
    Guessed,
    /// The site blocks automated fetches; carries the site name.
    Blocked(String),
    /// Layperson source (news, blog).
    Lay,
    /// Press release.
    Press,
    /// Resolved through DOI content negotiation.
    Doi,
    /// Resolved by a site-specific rule or in-page record; carries the provider.
    Provider(String),
    /// A provider request failed.
    FetchError,
    /// A provider payload could not be parsed.
    ParseError,
    /// No identifier and no fallback matched.
    NoIdentifier,
    /// Validation outcome marker.
    Status(ValidationStatus),
}

impl Tag {
    /// Create a blocked-site tag; the site name is upper-cased.
    #[must_use]
    pub fn blocked(site: &str) -> Self {
        Self::Blocked(site_token(site))
    }

    /// Create a provider tag; the provider name is upper-cased.
    #[must_use]
    pub fn provider(name: &str) -> Self {
        Self::Provider(site_token(name))
    }
}

fn site_token(raw: &str) -> String {
    raw.trim()
        .trim_start_matches("www.")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect()
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cache => f.write_str("CACHE"),
            Self::Manual => f.write_str("MANUAL"),
            Self::Pdf => f.write_str("PDF"),
            Self::Guessed => f.write_str("#GUESSED"),
            Self::Blocked(site) => write!(f, "BLOCKED_{site}"),
            Self::Lay => f.write_str("#LAY"),
            Self::Press => f.write_str("#PRESS"),
            Self::Doi => f.write_str("DOI"),
            Self::Provider(name) => f.write_str(name),
            Self::FetchError => f.write_str("FETCH_ERROR"),
            Self::ParseError => f.write_str("PARSE_ERROR"),
            Self::NoIdentifier => f.write_str("NO_IDENTIFIER"),
            Self::Status(status) => f.write_str(status.marker()),
        }
    }
}

impl FromStr for Tag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty tag".to_string());
        }
        let tag = match s {
            "CACHE" => Self::Cache,
            "MANUAL" => Self::Manual,
            "PDF" => Self::Pdf,
            "#GUESSED" => Self::Guessed,
            "#LAY" => Self::Lay,
            "#PRESS" => Self::Press,
            "DOI" => Self::Doi,
            "FETCH_ERROR" => Self::FetchError,
            "PARSE_ERROR" => Self::ParseError,
            "NO_IDENTIFIER" => Self::NoIdentifier,
            other => {
                if let Some(status) = ValidationStatus::from_marker(other) {
                    Self::Status(status)
                } else if let Some(site) = other.strip_prefix("BLOCKED_") {
                    Self::Blocked(site.to_string())
                } else {
                    Self::Provider(other.to_string())
                }
            }
        };
        Ok(tag)
    }
}

impl From<Tag> for String {
    fn from(tag: Tag) -> Self {
        tag.to_string()
    }
}

impl TryFrom<String> for Tag {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
