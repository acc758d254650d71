#![no_main]

use citation_resolver::RawCitation;
use citation_resolver::models::BibliographicMetadata;
use citation_resolver::scoring::{ConfidenceThresholds, score_citation};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Input files are JSON arrays of citations
    let Ok(citations) = serde_json::from_slice::<Vec<RawCitation>>(data) else {
        return;
    };
    let thresholds = ConfidenceThresholds::default();
    for citation in &citations {
        let meta = BibliographicMetadata {
            authors: citation.asserted_authors.iter().rev().cloned().collect(),
            ..BibliographicMetadata::default()
        };
        let result = score_citation(citation, Some(&meta), &thresholds);
        assert!((0.0..=1.0).contains(&result.confidence_score));
    }
});
