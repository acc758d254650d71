//! Citation Resolver
//!
//! Resolves citations found in documents against authoritative metadata
//! providers, scores the asserted authors against the resolved ones, and
//! renders corrected, confidence-tagged citation text.
//!
//! # Features
//!
//! - **URL normalization**: DOI, arXiv and PMC aliases converge on one identifier
//! - **Durable cache**: SQLite store with TTL, manual overrides and rolling backups
//! - **Resolver chain**: PDF, blocked publishers, DOI negotiation, in-page records,
//!   site rules and a title fallback, first useful result wins
//! - **Hallucination detection**: author-overlap confidence with Validated / Partial /
//!   Failed / Unvalidated classification
//!
//! # Example
//!
//! ```no_run
//! use citation_resolver::{CitationEngine, Config, RawCitation};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let engine = CitationEngine::new(Config::from_env()?)?;
//!
//!     let citation = RawCitation::new("https://doi.org/10.1234/abc", "Smith (2023)")
//!         .with_authors(["Smith J"]);
//!     let report = engine.resolve_citation(&citation).await?;
//!     println!("{}", report.formatted.review);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod formatters;
pub mod identifiers;
pub mod models;
pub mod resolvers;
pub mod scoring;

pub use cache::ResolutionCache;
pub use config::Config;
pub use engine::CitationEngine;
pub use error::{CacheError, CitationError, ClientError, ResolveError};
pub use models::{
    BibliographicMetadata, CitationReport, ManualOverride, RawCitation, ValidationResult,
    ValidationStatus,
};
