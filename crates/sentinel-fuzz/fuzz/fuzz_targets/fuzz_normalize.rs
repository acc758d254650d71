#![no_main]

use citation_resolver::identifiers::{extract_identifier, normalize};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    // Normalizing twice must not change the result
    let once = normalize(input);
    assert_eq!(normalize(&once.url), once);
    let _ = extract_identifier(input);
});
