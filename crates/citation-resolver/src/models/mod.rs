//! Data model shared by the normalizer, cache, resolvers, scorer and formatter.
//!
//! All models derive `Serialize`/`Deserialize` with `#[serde(default)]` on optional
//! fields so cache rows written by older versions keep loading.

mod citation;
mod metadata;
mod record;
mod report;
mod tag;
mod validation;

pub use citation::{DocumentLocation, ManualOverride, RawCitation};
pub use metadata::{BibliographicMetadata, MANUAL_PROVIDER};
pub use record::{ResolutionRecord, ResolutionStatus};
pub use report::{BatchReport, CitationReport, FormattedCitation};
pub use tag::Tag;
pub use validation::{IssueKind, ValidationIssue, ValidationResult, ValidationStatus};
