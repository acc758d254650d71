//! Academic vs. layperson source gate.
//!
//! Non-academic targets are tagged `#LAY` or `#PRESS` and then processed
//! like any other page. The gate never produces metadata.

use super::parsers::html;
use super::{Resolution, ResolveRequest, Resolver, ResolverContext};
use crate::error::ResolveResult;
use crate::models::Tag;

/// Kind of source behind a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Scholarly publisher, repository or index.
    Academic,
    /// News outlet, magazine, blog or encyclopedia.
    Lay,
    /// Press release or institutional news.
    Press,
}

const LAY_HOSTS: &[&str] = &[
    "nytimes.com", "theguardian.com", "bbc.co.uk", "bbc.com", "cnn.com", "washingtonpost.com",
    "reuters.com", "apnews.com", "npr.org", "forbes.com", "bloomberg.com", "wsj.com",
    "theatlantic.com", "newyorker.com", "economist.com", "wired.com", "theverge.com", "vox.com",
    "techcrunch.com", "arstechnica.com", "scientificamerican.com", "newscientist.com",
    "medium.com", "substack.com", "wordpress.com", "blogspot.com", "wikipedia.org",
    "psychologytoday.com", "healthline.com", "webmd.com",
];

const PRESS_HOSTS: &[&str] = &[
    "eurekalert.org", "sciencedaily.com", "phys.org", "medicalxpress.com", "techxplore.com",
    "prnewswire.com", "businesswire.com", "globenewswire.com", "newswise.com",
];

const PRESS_PATHS: &[&str] = &[
    "/press-release", "/press-releases", "/pressreleases", "/newsroom", "/press/", "/media-release",
];

const LAY_PATHS: &[&str] = &["/blog/", "/blogs/", "/news/", "/opinion/", "/magazine/"];

fn host_matches(host: &str, domains: &[&str]) -> bool {
    domains.iter().any(|d| host == *d || host.ends_with(&format!(".{d}")))
}

/// Classify from the URL alone. `None` when the URL says nothing.
#[must_use]
pub fn classify_url(host: &str, path: &str) -> Option<SourceKind> {
    let path = path.to_ascii_lowercase();
    if host_matches(host, PRESS_HOSTS) || PRESS_PATHS.iter().any(|p| path.contains(p)) {
        return Some(SourceKind::Press);
    }
    if host_matches(host, LAY_HOSTS) || host.starts_with("blog.") || host.starts_with("news.") {
        return Some(SourceKind::Lay);
    }
    if host.ends_with(".edu") || host.ends_with(".ac.uk") {
        // University news sections are press output.
        if LAY_PATHS.iter().any(|p| path.contains(p)) {
            return Some(SourceKind::Press);
        }
        return Some(SourceKind::Academic);
    }
    LAY_PATHS.iter().any(|p| path.contains(p)).then_some(SourceKind::Lay)
}

/// Classify from page markup.
#[must_use]
pub fn classify_page(html_text: &str) -> SourceKind {
    let metas = html::meta_tags(html_text);
    let has = |name: &str| metas.iter().any(|(n, _)| n == name);
    if has("citation_title") || has("citation_doi") || has("dc.identifier") {
        return SourceKind::Academic;
    }
    let og_type = metas.iter().find(|(n, _)| n == "og:type").map(|(_, v)| v.to_ascii_lowercase());
    if og_type.as_deref() == Some("article") || has("article:published_time") {
        return SourceKind::Lay;
    }
    SourceKind::Academic
}

/// The classification gate.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceClassifier;

#[async_trait::async_trait]
impl Resolver for SourceClassifier {
    fn name(&self) -> &'static str {
        "classify"
    }

    async fn resolve(
        &self,
        ctx: &ResolverContext,
        request: &ResolveRequest,
    ) -> ResolveResult<Resolution> {
        if !request.lacks_identifier() {
            return Ok(Resolution::skip());
        }
        let Some(url) = request.target_url().and_then(|u| url::Url::parse(u).ok()) else {
            return Ok(Resolution::skip());
        };
        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();

        let kind = match classify_url(&host, url.path()) {
            Some(kind) => kind,
            None => match request.target_page(ctx).await? {
                Some(page) if page.is_html() => classify_page(&page.text()),
                _ => SourceKind::Academic,
            },
        };

        let tag = match kind {
            SourceKind::Academic => return Ok(Resolution::skip()),
            SourceKind::Lay => Tag::Lay,
            SourceKind::Press => Tag::Press,
        };
        tracing::debug!(url = %url, tag = %tag, "Non-academic source");
        Ok(Resolution::tagged(vec![tag]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_url() {
        assert_eq!(classify_url("www.nytimes.com", "/2023/01/01/science/x.html"), Some(SourceKind::Lay));
        assert_eq!(classify_url("www.eurekalert.org", "/news-releases/1"), Some(SourceKind::Press));
        assert_eq!(classify_url("example.com", "/press-releases/2023/a"), Some(SourceKind::Press));
        assert_eq!(classify_url("news.mit.edu", "/2023/x"), Some(SourceKind::Lay));
        assert_eq!(classify_url("www.cs.example.edu", "/news/award"), Some(SourceKind::Press));
        assert_eq!(classify_url("www.cs.example.edu", "/papers/x.pdf"), Some(SourceKind::Academic));
        assert_eq!(classify_url("journal.example.org", "/article/1"), None);
    }

    #[test]
    fn test_classify_page() {
        let scholarly = r#"<meta name="citation_title" content="X"><meta property="og:type" content="article">"#;
        assert_eq!(classify_page(scholarly), SourceKind::Academic);
        let news = r#"<meta property="og:type" content="article"><meta property="article:published_time" content="2023-01-01">"#;
        assert_eq!(classify_page(news), SourceKind::Lay);
        assert_eq!(classify_page("<html></html>"), SourceKind::Academic);
    }
}
