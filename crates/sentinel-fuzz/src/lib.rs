//! Fuzzing library for citation-resolver.
//!
//! This crate provides fuzzing targets for the URL normalizer, the record
//! parsers and the author scorer. None of them may panic on any input.
//!
//! # Usage
//!
//! ```bash
//! cd crates/sentinel-fuzz
//! cargo +nightly fuzz run fuzz_normalize -- -max_total_time=60
//! ```

pub use citation_resolver::identifiers;
pub use citation_resolver::resolvers::parsers;
pub use citation_resolver::scoring;
