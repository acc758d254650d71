//! Downloadable records linked from, or embedded in, the target page.

use super::parsers::html::{self, RecordFormat};
use super::parsers::{bibtex, ris};
use super::{Resolution, ResolveRequest, Resolver, ResolverContext};
use crate::client::host_of;
use crate::error::{ResolveError, ResolveResult};
use crate::models::{BibliographicMetadata, Tag};

/// Accept header for record exports.
const ACCEPT_RECORD: &str =
    "application/x-bibtex, application/x-research-info-systems, text/plain;q=0.9, */*;q=0.8";

/// Record links tried per page.
const MAX_LINKS: usize = 3;

const CONFIDENCE: f64 = 0.8;

/// Resolver for explicit BibTeX / RIS records.
#[derive(Debug, Clone, Copy, Default)]
pub struct PageRecordResolver;

#[async_trait::async_trait]
impl Resolver for PageRecordResolver {
    fn name(&self) -> &'static str {
        "page_record"
    }

    async fn resolve(
        &self,
        ctx: &ResolverContext,
        request: &ResolveRequest,
    ) -> ResolveResult<Resolution> {
        if !request.lacks_identifier() {
            return Ok(Resolution::skip());
        }
        let Some(page) = request.target_page(ctx).await? else {
            return Ok(Resolution::skip());
        };
        if !page.is_html() {
            return Ok(Resolution::skip());
        }

        let provider = page.host().unwrap_or_else(|| "page".to_string());
        let body = page.text();
        let mut last_error: Option<ResolveError> = None;

        for (link, format) in html::record_links(&body, &page.final_url).into_iter().take(MAX_LINKS) {
            let link_provider = host_of(&link).unwrap_or_else(|| provider.clone());
            let fetched = match ctx.client.fetch(&link, ACCEPT_RECORD).await {
                Ok(fetched) => fetched,
                Err(e) => {
                    last_error = Some(ResolveError::fetch(&link_provider, e));
                    continue;
                }
            };
            match parse_record(&fetched.text(), format, &link_provider) {
                Ok(meta) if meta.is_useful() => {
                    tracing::debug!(url = %link, "Parsed linked record");
                    return Ok(resolved(meta, &provider));
                }
                Ok(_) => {}
                Err(message) => last_error = Some(ResolveError::parse(&link_provider, message)),
            }
        }

        if let Some(entry) = bibtex::find_entry(&body) {
            match bibtex::parse(entry, &provider) {
                Ok(meta) if meta.is_useful() => return Ok(resolved(meta, &provider)),
                Ok(_) => {}
                Err(message) => last_error = Some(ResolveError::parse(&provider, message)),
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => Ok(Resolution::skip()),
        }
    }
}

fn resolved(meta: BibliographicMetadata, provider: &str) -> Resolution {
    Resolution::resolved(meta, CONFIDENCE).with_tag(Tag::provider(provider))
}

/// Parse a record in the declared format, sniffing when the export lies.
fn parse_record(
    text: &str,
    format: RecordFormat,
    provider: &str,
) -> Result<BibliographicMetadata, String> {
    let looks_bibtex = text.trim_start().starts_with('@');
    match format {
        RecordFormat::Bibtex if looks_bibtex || !text.contains("TY  -") => bibtex::parse(text, provider),
        RecordFormat::Ris if looks_bibtex => bibtex::parse(text, provider),
        _ => ris::parse(text, provider),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_record_sniffs_format() {
        let bib = "@article{k, title={Sniffed}, author={Roe, Rita}, year={2020}}";
        let meta = parse_record(bib, RecordFormat::Ris, "x").unwrap();
        assert_eq!(meta.title.as_deref(), Some("Sniffed"));

        let ris_text = "TY  - JOUR\nTI  - From RIS\nAU  - Roe, Rita\nER  - \n";
        let meta = parse_record(ris_text, RecordFormat::Bibtex, "x").unwrap();
        assert_eq!(meta.title.as_deref(), Some("From RIS"));
    }
}
