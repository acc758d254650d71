//! Bibliographic metadata produced by resolvers.

use serde::{Deserialize, Serialize};

/// Provider name recorded on manual overrides.
pub const MANUAL_PROVIDER: &str = "manual";

/// Metadata for a cited work, as reported by one provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BibliographicMetadata {
    /// Work title.
    #[serde(default)]
    pub title: Option<String>,

    /// Author names in provider order, usually "Family, Given".
    #[serde(default)]
    pub authors: Vec<String>,

    /// Publication year.
    #[serde(default)]
    pub year: Option<i32>,

    /// Journal, conference or repository.
    #[serde(default)]
    pub venue: Option<String>,

    /// Volume.
    #[serde(default)]
    pub volume: Option<String>,

    /// Page range or article number.
    #[serde(default)]
    pub pages: Option<String>,

    /// DOI, lower-cased.
    #[serde(default)]
    pub doi: Option<String>,

    /// Provider that produced this record (e.g. "doi.org", "arxiv", "manual").
    #[serde(default)]
    pub source_provider: String,

    /// The provider payload as received (CSL-JSON, BibTeX, RIS, ...).
    /// For manual overrides, the corrected citation text.
    #[serde(default)]
    pub raw_record: Option<String>,
}

impl BibliographicMetadata {
    /// Create an empty record attributed to a provider.
    #[must_use]
    pub fn from_provider(provider: impl Into<String>) -> Self {
        Self { source_provider: provider.into(), ..Self::default() }
    }

    /// Corrected citation text supplied with a manual override.
    #[must_use]
    pub fn manual_citation_text(&self) -> Option<&str> {
        if self.source_provider != MANUAL_PROVIDER {
            return None;
        }
        self.raw_record.as_deref().map(str::trim).filter(|text| !text.is_empty())
    }

    /// Get the title, falling back to "Untitled".
    #[must_use]
    pub fn title_or_default(&self) -> &str {
        self.title.as_deref().unwrap_or("Untitled")
    }

    /// Returns true if a resolver produced something worth keeping.
    #[must_use]
    pub fn is_useful(&self) -> bool {
        self.title.as_deref().is_some_and(|t| !t.trim().is_empty()) || !self.authors.is_empty()
    }

    /// Get the first author's name if available.
    #[must_use]
    pub fn first_author(&self) -> Option<&str> {
        self.authors.first().map(String::as_str)
    }

    /// Get author names as a semicolon-separated string.
    #[must_use]
    pub fn author_names(&self) -> String {
        self.authors.join("; ")
    }
}
