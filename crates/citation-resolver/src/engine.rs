//! Citation engine: cache lookup, resolver chain, scoring and formatting.
//!
//! Each engine owns its own HTTP session, limiter and cache handle, so
//! several engines with different configurations can run side by side.

use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::cache::{Outcome, ResolutionCache};
use crate::client::HttpClient;
use crate::config::Config;
use crate::error::CitationResult;
use crate::formatters::format_citation;
use crate::identifiers;
use crate::models::{
    BatchReport, BibliographicMetadata, CitationReport, MANUAL_PROVIDER, ManualOverride,
    RawCitation, ResolutionRecord, Tag,
};
use crate::resolvers::{ResolveRequest, ResolverChain, ResolverContext};
use crate::scoring::score_citation;

/// Resolves and validates citations.
#[derive(Debug)]
pub struct CitationEngine {
    ctx: ResolverContext,
    cache: Arc<ResolutionCache>,
    chain: Arc<ResolverChain>,
}

impl CitationEngine {
    /// Build an engine with the standard resolver chain.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP session cannot be built or the cache
    /// cannot be opened.
    pub fn new(config: Config) -> CitationResult<Self> {
        let client = HttpClient::new(&config)?;
        let cache = ResolutionCache::open(&config)?;
        Ok(Self {
            ctx: ResolverContext::new(Arc::new(client), Arc::new(config)),
            cache: Arc::new(cache),
            chain: Arc::new(ResolverChain::standard()),
        })
    }

    /// Replace the resolver chain.
    #[must_use]
    pub fn with_chain(mut self, chain: ResolverChain) -> Self {
        self.chain = Arc::new(chain);
        self
    }

    /// The resolution cache.
    #[must_use]
    pub fn cache(&self) -> &ResolutionCache {
        &self.cache
    }

    /// The engine configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.ctx.config
    }

    /// Resolve, score and format one citation.
    ///
    /// Provider failures are part of the report, not errors.
    ///
    /// # Errors
    ///
    /// Returns an error only if the cache cannot be read or written.
    pub async fn resolve_citation(&self, citation: &RawCitation) -> CitationResult<CitationReport> {
        let url = citation.source_url.as_str();

        if let Some(record) = self.cached_record(url)? {
            tracing::debug!(url, manual = record.manual, "Cache hit");
            return Ok(self.build_report(citation, &record, true, None));
        }

        let request = ResolveRequest::for_citation(citation);
        let outcome = self.chain.resolve(&self.ctx, &self.cache, &request).await?;
        Ok(self.build_report(citation, &outcome.record, false, outcome.resolver))
    }

    /// Cached record to serve instead of resolving, if any.
    ///
    /// With `force_refresh`, only manual records are honored.
    fn cached_record(&self, url: &str) -> CitationResult<Option<ResolutionRecord>> {
        if self.ctx.config.force_refresh {
            return Ok(self.cache.get(url)?.filter(|record| record.manual));
        }
        Ok(self.cache.get(url)?)
    }

    fn build_report(
        &self,
        citation: &RawCitation,
        record: &ResolutionRecord,
        from_cache: bool,
        resolver: Option<&'static str>,
    ) -> CitationReport {
        let mut tags = Vec::with_capacity(record.tags.len() + 2);
        if from_cache {
            tags.push(Tag::Cache);
        }
        if record.manual {
            tags.push(Tag::Manual);
        }
        tags.extend(record.tags.iter().filter(|t| !matches!(t, Tag::Cache | Tag::Manual)).cloned());

        let metadata = record.metadata.clone().filter(|_| record.is_success());
        let validation =
            score_citation(citation, metadata.as_ref(), &self.ctx.config.thresholds);
        let formatted = format_citation(citation, &validation, metadata.as_ref(), &tags);

        CitationReport {
            citation: citation.clone(),
            validation,
            metadata,
            formatted,
            tags,
            from_cache,
            resolver: resolver.map(str::to_string),
        }
    }

    /// Report for a citation whose lookup failed outright.
    fn unresolved_report(&self, citation: &RawCitation) -> CitationReport {
        let validation = score_citation(citation, None, &self.ctx.config.thresholds);
        let formatted = format_citation(citation, &validation, None, &[]);
        CitationReport {
            citation: citation.clone(),
            validation,
            metadata: None,
            formatted,
            tags: Vec::new(),
            from_cache: false,
            resolver: None,
        }
    }

    /// Resolve a batch on a bounded pool.
    ///
    /// Reports arrive in completion order. Once `cancel` fires, citations not
    /// yet started are counted as skipped; those already attempted are cached,
    /// so a later run picks them up without fetching.
    pub async fn resolve_batch(
        &self,
        citations: Vec<RawCitation>,
        cancel: CancellationToken,
    ) -> BatchReport {
        let started = Instant::now();
        let total = citations.len();
        let workers = self.ctx.config.workers.max(1);

        let results: Vec<Option<CitationReport>> = stream::iter(citations)
            .map(|citation| {
                let cancel = cancel.clone();
                async move {
                    if cancel.is_cancelled() {
                        return None;
                    }
                    match self.resolve_citation(&citation).await {
                        Ok(report) => Some(report),
                        Err(e) => {
                            tracing::warn!(
                                citation_id = %citation.citation_id(),
                                url = %citation.source_url,
                                error = %e,
                                "Citation lookup failed"
                            );
                            Some(self.unresolved_report(&citation))
                        }
                    }
                }
            })
            .buffer_unordered(workers)
            .collect()
            .await;

        let reports: Vec<CitationReport> = results.into_iter().flatten().collect();
        let skipped = total - reports.len();
        let batch = BatchReport { reports, skipped, cancelled: cancel.is_cancelled() && skipped > 0 };

        tracing::info!(
            total,
            skipped,
            flagged = batch.candidate_hallucinations().count(),
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Batch resolved"
        );

        if let Err(e) = self.cache.maybe_scheduled_backup() {
            tracing::warn!(error = %e, "Scheduled backup failed");
        }

        batch
    }

    /// Store a human-supplied correction as a manual record.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot be written.
    pub fn manual_override(&self, correction: ManualOverride) -> CitationResult<ResolutionRecord> {
        let doi = correction.doi.as_deref().and_then(identifiers::clean_doi);
        let metadata = BibliographicMetadata {
            title: correction.title,
            authors: correction.authors,
            year: correction.year,
            doi,
            raw_record: correction.citation_text,
            ..BibliographicMetadata::from_provider(MANUAL_PROVIDER)
        };

        let record = self.cache.put(&correction.url, Outcome::Resolved(metadata), true)?;
        tracing::info!(url = %record.normalized_url, "Manual override stored");
        Ok(record)
    }
}
