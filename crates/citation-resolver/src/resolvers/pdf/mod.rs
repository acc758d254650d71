//! PDF targets without an identifier.
//!
//! Embedded document metadata comes first. When it lacks a title or authors
//! and `pdftotext` is installed, page one is extracted and run through the
//! layout heuristics; fields filled that way are tagged `#GUESSED`.

mod embedded;
mod heuristics;

use std::io::Write;

use chrono::{Datelike, Utc};
use tokio::process::Command;

pub use embedded::extract as embedded_metadata;
use heuristics::{FirstPage, first_page};

use super::{Resolution, ResolveRequest, Resolver, ResolverContext};
use crate::error::ResolveResult;
use crate::models::{BibliographicMetadata, Tag};

/// Confidence for metadata the document declares about itself.
const EMBEDDED_CONFIDENCE: f64 = 0.4;

/// Confidence once any field was guessed from layout.
const GUESSED_CONFIDENCE: f64 = 0.3;

/// Resolver for PDF documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfResolver;

#[async_trait::async_trait]
impl Resolver for PdfResolver {
    fn name(&self) -> &'static str {
        "pdf"
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
        if !page.is_pdf() {
            return Ok(Resolution::skip());
        }

        let mut meta = embedded::extract(&page.body);
        let mut guessed = false;

        if (meta.title.is_none() || meta.authors.is_empty()) && ctx.config.use_pdftotext {
            if let Some(text) = first_page_text(&page.body).await {
                let guesses = first_page(&text, Utc::now().year());
                if !guesses.is_empty() {
                    guessed = fill_from_first_page(&mut meta, &guesses);
                }
            }
        }

        let mut resolution = Resolution::tagged(vec![Tag::Pdf]);
        if meta.is_useful() {
            resolution.metadata = Some(meta);
            resolution.confidence_hint =
                if guessed { GUESSED_CONFIDENCE } else { EMBEDDED_CONFIDENCE };
            if guessed {
                resolution.tags.push(Tag::Guessed);
            }
        }
        Ok(resolution)
    }
}

/// Fill missing fields from first-page heuristics. Returns true if any were filled.
fn fill_from_first_page(meta: &mut BibliographicMetadata, page: &FirstPage) -> bool {
    let mut filled = false;
    if meta.title.is_none() && page.title.is_some() {
        meta.title.clone_from(&page.title);
        filled = true;
    }
    if meta.authors.is_empty() && !page.authors.is_empty() {
        meta.authors.clone_from(&page.authors);
        filled = true;
    }
    if meta.year.is_none() && page.year.is_some() {
        meta.year = page.year;
        filled = true;
    }
    if meta.doi.is_none() {
        meta.doi.clone_from(&page.doi);
    }
    filled
}

/// Text of page one via `pdftotext`, when the binary is available.
async fn first_page_text(body: &[u8]) -> Option<String> {
    if !has_command("pdftotext").await {
        tracing::debug!("pdftotext not found, skipping first-page heuristics");
        return None;
    }

    let mut file = tempfile::Builder::new().suffix(".pdf").tempfile().ok()?;
    file.write_all(body).ok()?;
    file.flush().ok()?;

    let output = Command::new("pdftotext")
        .arg("-f")
        .arg("1")
        .arg("-l")
        .arg("1")
        .arg("-layout")
        .arg("-nopgbrk")
        .arg(file.path())
        .arg("-")
        .output()
        .await;

    match output {
        Ok(out) if out.status.success() => {
            let text = String::from_utf8_lossy(&out.stdout).into_owned();
            (!text.trim().is_empty()).then_some(text)
        }
        Ok(out) => {
            tracing::debug!(status = ?out.status, "pdftotext failed");
            None
        }
        Err(e) => {
            tracing::debug!(error = %e, "Failed to run pdftotext");
            None
        }
    }
}

async fn has_command(binary: &str) -> bool {
    Command::new("which")
        .arg(binary)
        .output()
        .await
        .map(|out| out.status.success() && !out.stdout.is_empty())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_only_missing_fields() {
        let mut meta = BibliographicMetadata {
            title: Some("Declared Title".to_string()),
            ..BibliographicMetadata::from_provider("pdf")
        };
        let page = FirstPage {
            title: Some("Layout Title".to_string()),
            authors: vec!["Lee, Bob".to_string()],
            year: Some(2020),
            doi: None,
        };
        assert!(fill_from_first_page(&mut meta, &page));
        assert_eq!(meta.title.as_deref(), Some("Declared Title"));
        assert_eq!(meta.authors, vec!["Lee, Bob"]);
        assert_eq!(meta.year, Some(2020));
    }

    #[test]
    fn test_nothing_to_fill() {
        let mut meta = BibliographicMetadata::from_provider("pdf");
        assert!(!fill_from_first_page(&mut meta, &FirstPage::default()));
    }
}
