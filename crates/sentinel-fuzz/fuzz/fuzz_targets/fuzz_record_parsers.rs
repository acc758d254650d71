#![no_main]

use citation_resolver::resolvers::embedded_metadata;
use citation_resolver::resolvers::parsers::{arxiv, bibtex, csl, html, pmc, ris};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // PDF bodies are arbitrary bytes
    let _ = embedded_metadata(data);

    let text = String::from_utf8_lossy(data);
    let _ = csl::parse(&text, "fuzz");
    let _ = bibtex::parse(&text, "fuzz");
    let _ = ris::parse(&text, "fuzz");
    let _ = arxiv::parse(&text, "fuzz");
    let _ = pmc::parse(&text, "PMC1", "fuzz");
    let _ = html::scholarly_meta(&text, "fuzz");
    let _ = html::page_title(&text);
    let _ = html::record_links(&text, "https://example.org/article");
});
