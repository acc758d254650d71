//! End-to-end tests: resolve, score, format, cache.

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use citation_resolver::formatters::{json, markdown, substitute};
use citation_resolver::models::{IssueKind, Tag};
use citation_resolver::{
    CitationEngine, Config, ManualOverride, RawCitation, ValidationStatus,
};

const SMITH_URL: &str = "https://doi.org/10.1234/abc";
const KUMAR_URL: &str = "https://doi.org/10.5555/lee2021";

fn setup_test_engine(mock_server: &MockServer, dir: &TempDir) -> CitationEngine {
    CitationEngine::new(Config::for_testing(&mock_server.uri(), dir.path())).unwrap()
}

async fn mount_smith(mock_server: &MockServer, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path("/10.1234/abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "title": "Deep Citations",
            "author": [
                {"family": "Smith", "given": "John"},
                {"family": "Doe", "given": "Jane"}
            ],
            "issued": {"date-parts": [[2023]]}
        })))
        .expect(expected_calls)
        .mount(mock_server)
        .await;
}

async fn mount_lee(mock_server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/10.5555/lee2021"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "title": "Something Else Entirely",
            "author": [{"family": "Lee", "given": "David"}],
            "issued": {"date-parts": [[2021]]}
        })))
        .mount(mock_server)
        .await;
}

fn smith_citation() -> RawCitation {
    RawCitation::new(SMITH_URL, "Smith (2023)").with_authors(["Smith J"]).with_id("smith")
}

fn kumar_citation() -> RawCitation {
    RawCitation::new(KUMAR_URL, "Kumar (2021)").with_authors(["Kumar R"]).with_id("kumar")
}

// =============================================================================
// Single citations
// =============================================================================

#[tokio::test]
async fn test_elided_coauthor_is_validated() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_smith(&mock_server, 1).await;
    let engine = setup_test_engine(&mock_server, &dir);

    let report = engine.resolve_citation(&smith_citation()).await.unwrap();

    assert!((report.validation.confidence_score - 1.0).abs() < f64::EPSILON);
    assert_eq!(report.validation.status, ValidationStatus::Validated);
    assert_eq!(report.validation.issues.len(), 1);
    assert!(report.validation.has_issue(IssueKind::AdditionalResolvedAuthors));
    assert_eq!(report.formatted.prose, "Smith et al. (2023)");
    assert_eq!(report.formatted.review, "Smith et al. (2023) [VALIDATED] DOI");
    assert_eq!(report.resolver.as_deref(), Some("doi"));
    assert!(!report.from_cache);
}

#[tokio::test]
async fn test_contradicted_author_is_flagged() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_lee(&mock_server).await;
    let engine = setup_test_engine(&mock_server, &dir);

    let report = engine.resolve_citation(&kumar_citation()).await.unwrap();

    assert_eq!(report.validation.confidence_score, 0.0);
    assert_eq!(report.validation.status, ValidationStatus::Failed);
    assert!(report.is_candidate_hallucination());
    assert_eq!(report.formatted.prose, "Lee (2021)");
    assert!(report.formatted.review.contains("[FAILED]"));
    assert!(report.formatted.review.contains("Kumar (2021)"));
}

#[tokio::test]
async fn test_unreachable_source_is_unvalidated() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let engine = setup_test_engine(&mock_server, &dir);

    let citation = RawCitation::new("https://doi.org/10.5555/missing", "Roe (2019)")
        .with_authors(["Roe R"]);
    let report = engine.resolve_citation(&citation).await.unwrap();

    assert_eq!(report.validation.status, ValidationStatus::Unvalidated);
    assert!(!report.is_candidate_hallucination());
    assert_eq!(report.formatted.prose, "Roe (2019)");
    assert!(report.formatted.review.contains("FETCH_ERROR"));
    assert!(report.formatted.review.contains("needs manual verification"));
}

// =============================================================================
// Cache interplay
// =============================================================================

#[tokio::test]
async fn test_second_lookup_is_served_from_cache() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_smith(&mock_server, 1).await;
    let engine = setup_test_engine(&mock_server, &dir);

    let first = engine.resolve_citation(&smith_citation()).await.unwrap();
    let aliased = RawCitation::new("http://dx.doi.org/10.1234/ABC", "Smith (2023)")
        .with_authors(["Smith J"]);
    let second = engine.resolve_citation(&aliased).await.unwrap();

    assert!(!first.from_cache);
    assert!(second.from_cache);
    assert_eq!(second.tags.first(), Some(&Tag::Cache));
    assert_eq!(second.formatted.prose, first.formatted.prose);
    assert!(second.formatted.review.contains("CACHE"));
}

#[tokio::test]
async fn test_force_refresh_refetches_automated_records() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_smith(&mock_server, 2).await;

    {
        let engine = setup_test_engine(&mock_server, &dir);
        engine.resolve_citation(&smith_citation()).await.unwrap();
    }

    let mut config = Config::for_testing(&mock_server.uri(), dir.path());
    config.force_refresh = true;
    let engine = CitationEngine::new(config).unwrap();
    let report = engine.resolve_citation(&smith_citation()).await.unwrap();

    assert!(!report.from_cache);
}

#[tokio::test]
async fn test_manual_override_takes_precedence() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_lee(&mock_server).await;

    let mut config = Config::for_testing(&mock_server.uri(), dir.path());
    config.force_refresh = true;
    let engine = CitationEngine::new(config).unwrap();

    let record = engine
        .manual_override(ManualOverride {
            url: KUMAR_URL.to_string(),
            citation_text: Some("Kumar and Lee (2021)".to_string()),
            authors: vec!["Kumar, Ravi".to_string(), "Lee, David".to_string()],
            year: Some(2021),
            doi: Some("10.5555/LEE2021".to_string()),
            title: Some("Something Else Entirely".to_string()),
        })
        .unwrap();
    assert!(record.manual);
    assert_eq!(record.metadata.as_ref().unwrap().doi.as_deref(), Some("10.5555/lee2021"));

    let report = engine.resolve_citation(&kumar_citation()).await.unwrap();

    assert!(report.from_cache);
    assert!(report.tags.contains(&Tag::Manual));
    assert_eq!(report.validation.status, ValidationStatus::Validated);
    assert_eq!(report.formatted.prose, "Kumar and Lee (2021)");
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 0);
}

#[tokio::test]
async fn test_manual_override_with_text_only() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let engine = setup_test_engine(&mock_server, &dir);

    engine
        .manual_override(ManualOverride {
            url: KUMAR_URL.to_string(),
            citation_text: Some("Kumar and Lee (2021)".to_string()),
            authors: Vec::new(),
            year: None,
            doi: None,
            title: None,
        })
        .unwrap();

    let report = engine.resolve_citation(&kumar_citation()).await.unwrap();

    assert!(report.tags.contains(&Tag::Manual));
    assert_eq!(report.validation.status, ValidationStatus::Validated);
    assert!(!report.is_candidate_hallucination());
    assert_eq!(report.formatted.prose, "Kumar and Lee (2021)");
    assert_eq!(report.formatted.review, "Kumar and Lee (2021) [VALIDATED] CACHE MANUAL");
    assert_eq!(
        substitute("As Kumar (2021) showed.", std::slice::from_ref(&report)),
        "As Kumar and Lee (2021) showed."
    );
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 0);
}

// =============================================================================
// Batches
// =============================================================================

#[tokio::test]
async fn test_batch_reports_every_citation() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_smith(&mock_server, 1).await;
    mount_lee(&mock_server).await;
    let engine = setup_test_engine(&mock_server, &dir);

    let batch = engine
        .resolve_batch(vec![smith_citation(), kumar_citation()], CancellationToken::new())
        .await;

    assert_eq!(batch.reports.len(), 2);
    assert_eq!(batch.skipped, 0);
    assert!(!batch.cancelled);
    assert_eq!(batch.count(ValidationStatus::Validated), 1);
    assert_eq!(batch.count(ValidationStatus::Failed), 1);
    let flagged: Vec<_> = batch.candidate_hallucinations().map(|r| r.citation_id()).collect();
    assert_eq!(flagged, vec!["kumar"]);

    let summary = json::compact_batch(&batch);
    assert_eq!(summary["summary"]["total"], 2);
    assert_eq!(summary["candidateHallucinations"][0], "kumar");

    let report = markdown::format_batch_markdown(&batch);
    assert!(report.contains("# Citation Review (2 citations)"));
    assert!(report.contains("## Candidate hallucinations"));
}

#[tokio::test]
async fn test_cancelled_batch_skips_pending_citations() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let engine = setup_test_engine(&mock_server, &dir);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let batch = engine.resolve_batch(vec![smith_citation(), kumar_citation()], cancel).await;

    assert!(batch.reports.is_empty());
    assert_eq!(batch.skipped, 2);
    assert!(batch.cancelled);
    assert!(markdown::format_batch_markdown(&batch).contains("cancel"));
}

#[tokio::test]
async fn test_corrected_document() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_smith(&mock_server, 1).await;
    mount_lee(&mock_server).await;
    let engine = setup_test_engine(&mock_server, &dir);

    let document = "As shown by Smith (2023) and later Kumar (2021), citations drift.";
    let batch = engine
        .resolve_batch(vec![kumar_citation(), smith_citation()], CancellationToken::new())
        .await;

    assert_eq!(
        substitute(document, &batch.reports),
        "As shown by Smith et al. (2023) and later Lee (2021), citations drift."
    );
}
