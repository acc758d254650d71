//! Citations handed to the engine by the document parser.

use serde::{Deserialize, Serialize};

/// Where a citation sits in its source document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentLocation {
    /// 1-based line number.
    #[serde(default)]
    pub line: usize,

    /// Byte offset of the citation start.
    #[serde(default)]
    pub start: usize,

    /// Byte offset one past the citation end.
    #[serde(default)]
    pub end: usize,
}

/// A citation as asserted in the document. Read-only to the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCitation {
    /// Caller-assigned identifier; derived from the location when empty.
    #[serde(default)]
    pub id: String,

    /// Literal citation text, e.g. "Smith et al. (2023)".
    pub asserted_text: String,

    /// Author names as written in the document.
    #[serde(default)]
    pub asserted_authors: Vec<String>,

    /// Year as written in the document.
    #[serde(default)]
    pub asserted_year: Option<i32>,

    /// URL the citation links to.
    pub source_url: String,

    /// Position in the source document.
    #[serde(default)]
    pub location: DocumentLocation,
}

impl RawCitation {
    /// Create a citation with no asserted authors.
    #[must_use]
    pub fn new(source_url: impl Into<String>, asserted_text: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            asserted_text: asserted_text.into(),
            ..Self::default()
        }
    }

    /// Set the asserted authors.
    #[must_use]
    pub fn with_authors<I, S>(mut self, authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.asserted_authors = authors.into_iter().map(Into::into).collect();
        self
    }

    /// Set the asserted year.
    #[must_use]
    pub const fn with_year(mut self, year: i32) -> Self {
        self.asserted_year = Some(year);
        self
    }

    /// Set the caller-assigned id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Stable identifier used in results and reports.
    #[must_use]
    pub fn citation_id(&self) -> String {
        if self.id.is_empty() {
            format!("L{}:{}-{}", self.location.line, self.location.start, self.location.end)
        } else {
            self.id.clone()
        }
    }
}

/// A human-supplied correction for one URL.
///
/// Written to the cache as a manual record: TTL-exempt, and automated
/// re-resolution never replaces it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualOverride {
    /// URL being corrected.
    pub url: String,

    /// Corrected citation text, kept as the raw record.
    #[serde(default)]
    pub citation_text: Option<String>,

    /// Corrected author list.
    #[serde(default)]
    pub authors: Vec<String>,

    /// Corrected year.
    #[serde(default)]
    pub year: Option<i32>,

    /// Corrected DOI.
    #[serde(default)]
    pub doi: Option<String>,

    /// Corrected title.
    #[serde(default)]
    pub title: Option<String>,
}
