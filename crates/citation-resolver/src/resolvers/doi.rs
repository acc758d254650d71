//! DOI content negotiation.
//!
//! `GET https://doi.org/<doi>` with `Accept: application/vnd.citationstyles.csl+json`
//! is answered by the registration agency (Crossref, DataCite, mEDRA) with the
//! canonical record. This is the most trusted source in the chain.

use super::parsers::{csl, html};
use super::{Resolution, ResolveRequest, Resolver, ResolverContext};
use crate::client::ACCEPT_CSL_JSON;
use crate::error::{ResolveError, ResolveResult};
use crate::models::{BibliographicMetadata, Tag};

/// Provider name recorded on negotiated metadata.
pub(crate) const PROVIDER: &str = "doi.org";

/// Resolver for known DOIs.
#[derive(Debug, Clone, Copy, Default)]
pub struct DoiResolver;

#[async_trait::async_trait]
impl Resolver for DoiResolver {
    fn name(&self) -> &'static str {
        "doi"
    }

    async fn resolve(
        &self,
        ctx: &ResolverContext,
        request: &ResolveRequest,
    ) -> ResolveResult<Resolution> {
        let doi = match request.normalized.identifier.negotiable_doi() {
            Some(doi) => Some(doi),
            // Identifier-less pages often declare their DOI in meta tags.
            None if request.lacks_identifier() => request
                .target_page(ctx)
                .await
                .ok()
                .flatten()
                .filter(|page| page.is_html())
                .and_then(|page| html::doi_meta(&page.text())),
            None => None,
        };
        let Some(doi) = doi else {
            return Ok(Resolution::skip());
        };

        let metadata = negotiate(ctx, &doi).await?;
        Ok(Resolution::resolved(metadata, 1.0).with_tag(Tag::Doi))
    }
}

/// Fetch the CSL-JSON record for a DOI.
pub(crate) async fn negotiate(
    ctx: &ResolverContext,
    doi: &str,
) -> ResolveResult<BibliographicMetadata> {
    let url = format!("{}/{}", ctx.config.doi_resolver_url.trim_end_matches('/'), doi);
    let page = ctx
        .client
        .fetch(&url, ACCEPT_CSL_JSON)
        .await
        .map_err(|e| ResolveError::fetch(PROVIDER, e))?;

    let mut metadata =
        csl::parse(&page.text(), PROVIDER).map_err(|e| ResolveError::parse(PROVIDER, e))?;
    if metadata.doi.is_none() {
        metadata.doi = Some(doi.to_string());
    }
    tracing::debug!(doi, authors = metadata.authors.len(), "DOI negotiated");
    Ok(metadata)
}
