//! Last resort: a stub record carrying only the page title.

use super::parsers::html;
use super::{Resolution, ResolveRequest, Resolver, ResolverContext};
use crate::error::{ResolveError, ResolveResult};
use crate::models::{BibliographicMetadata, Tag};

/// Confidence floor of the chain.
const CONFIDENCE: f64 = 0.3;

/// Title-only fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct TitleFallbackResolver;

#[async_trait::async_trait]
impl Resolver for TitleFallbackResolver {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn resolve(
        &self,
        ctx: &ResolverContext,
        request: &ResolveRequest,
    ) -> ResolveResult<Resolution> {
        if !request.lacks_identifier() {
            return Ok(Resolution::skip());
        }

        let title = match request.target_page(ctx).await? {
            Some(page) if page.is_html() => html::page_title(&page.text()),
            _ => None,
        };
        let Some(title) = title else {
            return Err(ResolveError::no_identifier(&request.normalized.url));
        };

        let provider = request.host().unwrap_or_else(|| "page".to_string());
        let meta = BibliographicMetadata {
            title: Some(title),
            ..BibliographicMetadata::from_provider(provider)
        };
        Ok(Resolution::resolved(meta, CONFIDENCE).with_tag(Tag::Guessed))
    }
}
