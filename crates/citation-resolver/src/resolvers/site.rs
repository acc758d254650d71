//! Per-source rules for targets without DOI negotiation.
//!
//! - arXiv: export API Atom feed
//! - PubMed Central: NCBI E-utilities `esummary`
//! - anything else: Highwire `citation_*` / Dublin Core meta tags

use url::Url;

use super::parsers::{arxiv, html, pmc};
use super::{Resolution, ResolveRequest, Resolver, ResolverContext};
use crate::client::ACCEPT_JSON;
use crate::error::{ClientError, ResolveError, ResolveResult};
use crate::identifiers::IdentifierKind;
use crate::models::{BibliographicMetadata, Tag};

const ACCEPT_ATOM: &str = "application/atom+xml";

const API_CONFIDENCE: f64 = 0.9;
const META_TAG_CONFIDENCE: f64 = 0.7;

/// Resolver applying site-specific rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct SiteResolver;

#[async_trait::async_trait]
impl Resolver for SiteResolver {
    fn name(&self) -> &'static str {
        "site"
    }

    async fn resolve(
        &self,
        ctx: &ResolverContext,
        request: &ResolveRequest,
    ) -> ResolveResult<Resolution> {
        let identifier = &request.normalized.identifier;
        match identifier.kind {
            IdentifierKind::Arxiv => {
                let meta = arxiv_record(ctx, &identifier.value).await?;
                Ok(Resolution::resolved(meta, API_CONFIDENCE).with_tag(Tag::provider("arxiv")))
            }
            IdentifierKind::Pmcid => {
                let meta = pmc_record(ctx, &identifier.value).await?;
                Ok(Resolution::resolved(meta, API_CONFIDENCE).with_tag(Tag::provider("pmc")))
            }
            IdentifierKind::Doi => Ok(Resolution::skip()),
            IdentifierKind::None => {
                let Some(page) = request.target_page(ctx).await? else {
                    return Ok(Resolution::skip());
                };
                if !page.is_html() {
                    return Ok(Resolution::skip());
                }
                let provider = page.host().unwrap_or_else(|| "page".to_string());
                Ok(html::scholarly_meta(&page.text(), &provider).map_or_else(
                    Resolution::skip,
                    |meta| {
                        Resolution::resolved(meta, META_TAG_CONFIDENCE)
                            .with_tag(Tag::provider(&provider))
                    },
                ))
            }
        }
    }
}

fn api_url(base: &str, path: &str, params: &[(&str, &str)]) -> Result<String, ClientError> {
    let url = format!("{}/{path}", base.trim_end_matches('/'));
    Url::parse_with_params(&url, params)
        .map(String::from)
        .map_err(|e| ClientError::bad_request(format!("invalid URL {url}: {e}")))
}

async fn arxiv_record(ctx: &ResolverContext, id: &str) -> ResolveResult<BibliographicMetadata> {
    const PROVIDER: &str = "arxiv";
    let url = api_url(&ctx.config.arxiv_api_url, "query", &[("id_list", id)])
        .map_err(|e| ResolveError::fetch(PROVIDER, e))?;
    let page = ctx
        .client
        .fetch(&url, ACCEPT_ATOM)
        .await
        .map_err(|e| ResolveError::fetch(PROVIDER, e))?;
    arxiv::parse(&page.text(), PROVIDER).map_err(|e| ResolveError::parse(PROVIDER, e))
}

async fn pmc_record(ctx: &ResolverContext, pmcid: &str) -> ResolveResult<BibliographicMetadata> {
    const PROVIDER: &str = "pmc";
    let url = api_url(
        &ctx.config.ncbi_eutils_url,
        "esummary.fcgi",
        &[("db", "pmc"), ("id", pmc::numeric_id(pmcid)), ("retmode", "json")],
    )
    .map_err(|e| ResolveError::fetch(PROVIDER, e))?;
    let page = ctx
        .client
        .fetch(&url, ACCEPT_JSON)
        .await
        .map_err(|e| ResolveError::fetch(PROVIDER, e))?;
    pmc::parse(&page.text(), pmcid, PROVIDER).map_err(|e| ResolveError::parse(PROVIDER, e))
}
