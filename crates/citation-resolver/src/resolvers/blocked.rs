//! Publishers and aggregators that refuse automated fetches.
//!
//! MDPI article URLs encode everything needed to rebuild the DOI. ResearchGate
//! and Academia.edu URLs carry a title slug, which is looked up in the
//! Crossref index and accepted only on a close title match.

use std::sync::LazyLock;

use regex::Regex;

use super::parsers::csl::CrossrefWorks;
use super::parsers::squash;
use super::{Resolution, ResolveRequest, Resolver, ResolverContext, blocked_site, doi};
use crate::error::{ResolveError, ResolveResult};
use crate::models::{BibliographicMetadata, Tag};

/// Minimum normalized Levenshtein similarity between slug and found title.
const TITLE_SIMILARITY: f64 = 0.85;

/// Candidates requested from the index.
const SEARCH_ROWS: &str = "5";

const MDPI_CONFIDENCE: f64 = 0.9;
const SEARCH_CONFIDENCE: f64 = 0.6;

/// MDPI journal ISSN to DOI abbreviation.
const MDPI_JOURNALS: &[(&str, &str)] = &[
    ("1422-0067", "ijms"),
    ("2072-4292", "rs"),
    ("1424-8220", "s"),
    ("2071-1050", "su"),
    ("1660-4601", "ijerph"),
    ("2076-3417", "app"),
    ("1996-1073", "en"),
    ("1420-3049", "molecules"),
    ("2072-6643", "nu"),
    ("2073-4409", "cells"),
    ("2072-6694", "cancers"),
    ("1999-4915", "v"),
    ("2079-9292", "electronics"),
    ("1996-1944", "ma"),
    ("2073-4360", "polym"),
    ("2077-0383", "jcm"),
    ("2076-2607", "microorganisms"),
    ("2079-4991", "nano"),
    ("2073-4441", "w"),
    ("2227-9059", "biomedicines"),
    ("1999-4923", "pharmaceutics"),
    ("2076-3921", "antiox"),
    ("2227-7390", "math"),
    ("1099-4300", "e"),
    ("2304-8158", "foods"),
    ("2075-4418", "diagnostics"),
    ("2076-2615", "ani"),
    ("2223-7747", "plants"),
];

static MDPI_ARTICLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)mdpi\.com/(?P<issn>\d{4}-\d{3}[\dx])/(?P<vol>\d+)/(?P<issue>\d+)/(?P<article>\d+)")
        .expect("valid regex")
});

static RESEARCHGATE_SLUG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)researchgate\.net/publication/\d+_(?P<slug>[^/?#]+)").expect("valid regex")
});

static ACADEMIA_SLUG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)academia\.edu/\d+/(?P<slug>[^/?#]+)").expect("valid regex")
});

/// Resolver for sites that block automated access.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockedSiteResolver;

#[async_trait::async_trait]
impl Resolver for BlockedSiteResolver {
    fn name(&self) -> &'static str {
        "blocked_site"
    }

    async fn resolve(
        &self,
        ctx: &ResolverContext,
        request: &ResolveRequest,
    ) -> ResolveResult<Resolution> {
        if !request.lacks_identifier() {
            return Ok(Resolution::skip());
        }
        let Some(url) = request.target_url() else {
            return Ok(Resolution::skip());
        };
        let Some(site) = request.host().as_deref().and_then(blocked_site) else {
            return Ok(Resolution::skip());
        };
        let tags = vec![Tag::blocked(site), Tag::Guessed];

        if let Some(doi) = mdpi_doi(url) {
            tracing::debug!(url, doi = %doi, "Constructed MDPI DOI");
            let metadata = doi::negotiate(ctx, &doi).await?;
            return Ok(Resolution { metadata: Some(metadata), tags, confidence_hint: MDPI_CONFIDENCE });
        }

        let Some(title) = slug_title(url) else {
            return Ok(Resolution::tagged(tags));
        };
        let metadata = search_by_title(ctx, &title).await?;
        Ok(Resolution { metadata, tags, confidence_hint: SEARCH_CONFIDENCE })
    }
}

/// DOI of an MDPI article URL: `10.3390/<abbr><vol><issue:02><article:04>`.
#[must_use]
pub fn mdpi_doi(url: &str) -> Option<String> {
    let cap = MDPI_ARTICLE.captures(url)?;
    let issn = cap["issn"].to_ascii_uppercase();
    let abbr = MDPI_JOURNALS.iter().find(|(known, _)| *known == issn).map(|(_, abbr)| *abbr)?;
    let volume: u32 = cap["vol"].parse().ok()?;
    let issue: u32 = cap["issue"].parse().ok()?;
    let article: u32 = cap["article"].parse().ok()?;
    Some(format!("10.3390/{abbr}{volume}{issue:02}{article:04}"))
}

/// Title words from a ResearchGate or Academia.edu URL slug.
#[must_use]
pub fn slug_title(url: &str) -> Option<String> {
    let slug = RESEARCHGATE_SLUG
        .captures(url)
        .or_else(|| ACADEMIA_SLUG.captures(url))?
        .name("slug")?
        .as_str()
        .to_string();
    let decoded = urlencoding::decode(&slug).map_or(slug.clone(), |s| s.into_owned());
    let title = squash(&decoded.replace(['_', '-'], " "));
    (title.split_whitespace().count() >= 2).then_some(title)
}

/// Search Crossref for a title and keep the best close match.
async fn search_by_title(
    ctx: &ResolverContext,
    title: &str,
) -> ResolveResult<Option<BibliographicMetadata>> {
    const PROVIDER: &str = "crossref";
    let url = format!("{}/works", ctx.config.crossref_api_url.trim_end_matches('/'));
    let works: CrossrefWorks = ctx
        .client
        .get_json(&url, &[("query.bibliographic", title), ("rows", SEARCH_ROWS)])
        .await
        .map_err(|e| ResolveError::fetch(PROVIDER, e))?;

    let wanted = title.to_lowercase();
    let best = works
        .message
        .items
        .into_iter()
        .filter_map(|item| {
            let found = squash(&item.title_text()?.to_lowercase());
            let score = strsim::normalized_levenshtein(&wanted, &found);
            (score >= TITLE_SIMILARITY).then_some((score, item))
        })
        .max_by(|a, b| a.0.total_cmp(&b.0));

    Ok(best.map(|(score, item)| {
        tracing::debug!(title, score, "Title search matched");
        item.into_metadata(PROVIDER, None)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mdpi_doi() {
        assert_eq!(
            mdpi_doi("https://www.mdpi.com/1422-0067/21/5/1234").as_deref(),
            Some("10.3390/ijms21051234")
        );
        assert_eq!(
            mdpi_doi("https://www.mdpi.com/2072-4292/12/11/45/htm").as_deref(),
            Some("10.3390/rs12110045")
        );
        assert_eq!(mdpi_doi("https://www.mdpi.com/9999-9999/1/1/1"), None);
        assert_eq!(mdpi_doi("https://www.mdpi.com/journal/ijms"), None);
    }

    #[test]
    fn test_slug_title() {
        assert_eq!(
            slug_title("https://www.researchgate.net/publication/338077542_Deep_Learning_for_Citation_Checking").as_deref(),
            Some("Deep Learning for Citation Checking")
        );
        assert_eq!(
            slug_title("https://www.academia.edu/12345678/On_the_Nature_of_Things?auto=download").as_deref(),
            Some("On the Nature of Things")
        );
        assert_eq!(slug_title("https://www.researchgate.net/profile/Jane_Doe"), None);
    }
}
