//! Source resolver chain.
//!
//! A cache miss walks an ordered list of [`Resolver`]s. Each one either
//! declines (no metadata), fails (a [`ResolveError`] that becomes a tag), or
//! produces metadata; the first useful metadata wins and later resolvers are
//! never invoked. Whatever happens, the attempt is persisted to the cache
//! before the chain returns.
//!
//! Shared state (HTTP session, politeness limiter, configuration) travels in
//! an explicitly constructed [`ResolverContext`].

mod blocked;
mod classify;
mod doi;
mod fallback;
mod page_record;
pub mod parsers;
mod pdf;
mod site;

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;

pub use blocked::BlockedSiteResolver;
pub use classify::SourceClassifier;
pub use doi::DoiResolver;
pub use fallback::TitleFallbackResolver;
pub use page_record::PageRecordResolver;
pub use pdf::{PdfResolver, embedded_metadata};
pub use site::SiteResolver;

use crate::cache::{ResolutionCache, effective_identifier};
use crate::client::{ACCEPT_HTML, FetchedPage, HttpClient, host_of};
use crate::config::Config;
use crate::error::{CacheResult, ResolveError, ResolveResult};
use crate::identifiers::{self, Normalized};
use crate::models::{
    BibliographicMetadata, RawCitation, ResolutionRecord, ResolutionStatus, Tag,
};

/// Sites that refuse automated fetches. Pages on these hosts are never
/// requested directly.
const BLOCKED_SITES: &[(&str, &str)] = &[
    ("mdpi.com", "MDPI"),
    ("researchgate.net", "RESEARCHGATE"),
    ("academia.edu", "ACADEMIA"),
];

/// Site label for a host that blocks automated fetches.
#[must_use]
pub fn blocked_site(host: &str) -> Option<&'static str> {
    BLOCKED_SITES
        .iter()
        .find(|(domain, _)| host == *domain || host.ends_with(&format!(".{domain}")))
        .map(|(_, site)| *site)
}

/// Shared state handed to every resolver.
#[derive(Debug, Clone)]
pub struct ResolverContext {
    /// HTTP session with politeness limiter and page memo.
    pub client: Arc<HttpClient>,

    /// Engine configuration (provider endpoints, toggles).
    pub config: Arc<Config>,
}

impl ResolverContext {
    /// Create a new context.
    #[must_use]
    pub const fn new(client: Arc<HttpClient>, config: Arc<Config>) -> Self {
        Self { client, config }
    }
}

/// One URL being resolved.
#[derive(Debug)]
pub struct ResolveRequest {
    /// URL as given by the caller.
    pub original_url: String,

    /// Normalizer output.
    pub normalized: Normalized,

    /// Citation that referenced the URL, when known.
    pub citation: Option<RawCitation>,

    /// Target page: unset until first requested, then the fetched page or
    /// `None` when unavailable.
    page: Mutex<Option<Option<Arc<FetchedPage>>>>,
}

impl ResolveRequest {
    /// Create a request for a URL.
    #[must_use]
    pub fn new(url: &str) -> Self {
        Self {
            original_url: url.trim().to_string(),
            normalized: identifiers::normalize(url),
            citation: None,
            page: Mutex::new(None),
        }
    }

    /// Create a request for a citation's source URL.
    #[must_use]
    pub fn for_citation(citation: &RawCitation) -> Self {
        let mut request = Self::new(&citation.source_url);
        request.citation = Some(citation.clone());
        request
    }

    /// URL of the page behind the request, if it is fetchable.
    #[must_use]
    pub fn target_url(&self) -> Option<&str> {
        let url = self.normalized.url.as_str();
        (url.starts_with("http://") || url.starts_with("https://")).then_some(url)
    }

    /// Host of the target URL.
    #[must_use]
    pub fn host(&self) -> Option<String> {
        self.target_url().and_then(host_of)
    }

    /// Returns true when the URL carries no DOI/arXiv/PMC identifier.
    #[must_use]
    pub fn lacks_identifier(&self) -> bool {
        self.normalized.identifier.is_none()
    }

    /// Fetch the target page once per request.
    ///
    /// The first failure is returned to the caller that triggered the fetch;
    /// later callers see `Ok(None)`. Hosts that block automated fetches are
    /// never requested.
    pub async fn target_page(
        &self,
        ctx: &ResolverContext,
    ) -> ResolveResult<Option<Arc<FetchedPage>>> {
        let mut slot = self.page.lock().await;
        if let Some(page) = slot.as_ref() {
            return Ok(page.clone());
        }

        let Some(url) = self.target_url() else {
            *slot = Some(None);
            return Ok(None);
        };
        let host = host_of(url).unwrap_or_default();
        if blocked_site(&host).is_some() {
            *slot = Some(None);
            return Ok(None);
        }

        match ctx.client.fetch(url, ACCEPT_HTML).await {
            Ok(page) => {
                *slot = Some(Some(Arc::clone(&page)));
                Ok(Some(page))
            }
            Err(e) => {
                *slot = Some(None);
                Err(ResolveError::fetch(host, e))
            }
        }
    }

    /// Seed the target page (used when the caller already holds the body).
    pub async fn set_target_page(&self, page: Option<Arc<FetchedPage>>) {
        *self.page.lock().await = Some(page);
    }
}

/// What one resolver produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    /// Metadata, or `None` when the resolver does not apply.
    pub metadata: Option<BibliographicMetadata>,

    /// Diagnostic tags, kept even when no metadata was produced.
    pub tags: Vec<Tag>,

    /// How much the resolver trusts its own output, in [0, 1].
    pub confidence_hint: f64,
}

impl Resolution {
    /// The resolver does not apply to this URL.
    #[must_use]
    pub fn skip() -> Self {
        Self::default()
    }

    /// Tags only, no metadata.
    #[must_use]
    pub fn tagged(tags: Vec<Tag>) -> Self {
        Self { tags, ..Self::default() }
    }

    /// Metadata with a confidence hint.
    #[must_use]
    pub fn resolved(metadata: BibliographicMetadata, confidence_hint: f64) -> Self {
        Self { metadata: Some(metadata), tags: Vec::new(), confidence_hint }
    }

    /// Add a tag.
    #[must_use]
    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tags.push(tag);
        self
    }

    /// Returns true when the metadata is worth keeping.
    #[must_use]
    pub fn is_useful(&self) -> bool {
        self.metadata.as_ref().is_some_and(BibliographicMetadata::is_useful)
    }
}

/// A resolution strategy.
#[async_trait::async_trait]
pub trait Resolver: Send + Sync {
    /// Resolver name, used in logs and reports.
    fn name(&self) -> &'static str;

    /// Try to resolve the request.
    async fn resolve(
        &self,
        ctx: &ResolverContext,
        request: &ResolveRequest,
    ) -> ResolveResult<Resolution>;
}

/// Result of one walk of the chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainOutcome {
    /// The record as stored (or the manual record that shielded the key).
    pub record: ResolutionRecord,

    /// Resolver that produced the metadata, if any.
    pub resolver: Option<&'static str>,

    /// Confidence hint of the winning resolver, 0 on failure.
    pub confidence_hint: f64,
}

/// Ordered list of resolvers; first useful result wins.
pub struct ResolverChain {
    resolvers: Vec<Box<dyn Resolver>>,
}

impl std::fmt::Debug for ResolverChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolverChain").field("resolvers", &self.names()).finish()
    }
}

impl Default for ResolverChain {
    fn default() -> Self {
        Self::standard()
    }
}

impl ResolverChain {
    /// Create a chain from resolvers in priority order.
    #[must_use]
    pub fn new(resolvers: Vec<Box<dyn Resolver>>) -> Self {
        Self { resolvers }
    }

    /// The seven production resolvers in priority order.
    #[must_use]
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(PdfResolver),
            Box::new(BlockedSiteResolver),
            Box::new(SourceClassifier),
            Box::new(DoiResolver),
            Box::new(PageRecordResolver),
            Box::new(SiteResolver),
            Box::new(TitleFallbackResolver),
        ])
    }

    /// Resolver names in priority order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.resolvers.iter().map(|r| r.name()).collect()
    }

    /// Walk the chain and build a record. Nothing is persisted.
    pub async fn run(&self, ctx: &ResolverContext, request: &ResolveRequest) -> ChainOutcome {
        let mut tags: Vec<Tag> = Vec::new();
        let mut errors: Vec<String> = Vec::new();
        let mut winner: Option<(&'static str, BibliographicMetadata, f64)> = None;

        for resolver in &self.resolvers {
            let started = std::time::Instant::now();
            match resolver.resolve(ctx, request).await {
                Ok(resolution) => {
                    let useful = resolution.is_useful();
                    tags.extend(resolution.tags);
                    if useful {
                        if let Some(metadata) = resolution.metadata {
                            tracing::debug!(
                                url = %request.normalized.url,
                                resolver = resolver.name(),
                                confidence = resolution.confidence_hint,
                                elapsed_ms = started.elapsed().as_millis() as u64,
                                "Resolved"
                            );
                            winner = Some((resolver.name(), metadata, resolution.confidence_hint));
                            break;
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        url = %request.normalized.url,
                        resolver = resolver.name(),
                        error = %e,
                        "Resolver failed"
                    );
                    tags.push(e.tag());
                    if e.is_blocked() {
                        if let Some(host) = request.host() {
                            tags.push(Tag::blocked(&host));
                        }
                    }
                    errors.push(e.to_string());
                }
            }
        }

        let (status, metadata, error_message, resolver, confidence_hint) = match winner {
            Some((name, metadata, hint)) => {
                (ResolutionStatus::Success, Some(metadata), None, Some(name), hint.clamp(0.0, 1.0))
            }
            None => {
                let message = if errors.is_empty() {
                    tags.push(Tag::NoIdentifier);
                    ResolveError::no_identifier(&request.normalized.url).to_string()
                } else {
                    errors.join("; ")
                };
                (ResolutionStatus::Error, None, Some(message), None, 0.0)
            }
        };

        let mut deduped: Vec<Tag> = Vec::with_capacity(tags.len());
        for tag in tags {
            if !deduped.contains(&tag) {
                deduped.push(tag);
            }
        }

        let identifier =
            effective_identifier(request.normalized.identifier.clone(), metadata.as_ref());
        let record = ResolutionRecord {
            original_url: request.original_url.clone(),
            normalized_url: request.normalized.url.clone(),
            identifier,
            status,
            metadata,
            error_message,
            tags: deduped,
            fetched_at: Utc::now(),
            manual: false,
        };

        ChainOutcome { record, resolver, confidence_hint }
    }

    /// Walk the chain and persist the attempt, success or failure.
    ///
    /// When a manual record occupies the key, it is returned instead of the
    /// automated result.
    pub async fn resolve(
        &self,
        ctx: &ResolverContext,
        cache: &ResolutionCache,
        request: &ResolveRequest,
    ) -> CacheResult<ChainOutcome> {
        let mut outcome = self.run(ctx, request).await;
        if !cache.put_record(&outcome.record)? {
            if let Some(manual) = cache.get_any(&request.normalized.url)? {
                outcome = ChainOutcome { record: manual, resolver: None, confidence_hint: 1.0 };
            }
        }
        tracing::debug!(
            url = %request.normalized.url,
            status = outcome.record.status.as_str(),
            resolver = outcome.resolver.unwrap_or("none"),
            "Resolution persisted"
        );
        Ok(outcome)
    }
}
