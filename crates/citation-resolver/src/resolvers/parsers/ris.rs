//! RIS records (`TY  - JOUR` ... `ER  -`).

use super::{ParseResult, first_year, non_empty};
use crate::models::BibliographicMetadata;

/// Parse the first RIS record of a document.
///
/// # Errors
///
/// Returns a message if the text holds no tagged lines.
pub fn parse(text: &str, provider: &str) -> ParseResult<BibliographicMetadata> {
    let mut meta = BibliographicMetadata::from_provider(provider);
    let mut seen_tags = 0usize;
    let mut start_page: Option<String> = None;
    let mut end_page: Option<String> = None;
    let mut raw = Vec::new();
    let mut in_record = false;

    for line in text.lines() {
        let Some((tag, value)) = parse_line(line) else {
            continue;
        };
        match tag {
            "TY" => {
                if in_record {
                    break;
                }
                in_record = true;
            }
            "ER" => {
                raw.push(line);
                break;
            }
            _ => {}
        }
        raw.push(line);
        seen_tags += 1;

        let Some(value) = non_empty(value) else {
            continue;
        };
        match tag {
            "TI" | "T1" => meta.title = meta.title.or(Some(value)),
            "AU" | "A1" => meta.authors.push(value),
            "PY" | "Y1" | "DA" => meta.year = meta.year.or_else(|| first_year(&value)),
            "JO" | "JF" | "T2" | "JA" | "BT" => meta.venue = meta.venue.or(Some(value)),
            "VL" => meta.volume = Some(value),
            "SP" => start_page = Some(value),
            "EP" => end_page = Some(value),
            "DO" => meta.doi = crate::identifiers::clean_doi(&value),
            _ => {}
        }
    }

    if seen_tags == 0 {
        return Err("no RIS tags found".to_string());
    }

    meta.pages = match (start_page, end_page) {
        (Some(start), Some(end)) if start != end => Some(format!("{start}-{end}")),
        (Some(start), _) => Some(start),
        (None, end) => end,
    };
    meta.raw_record = Some(raw.join("\n"));
    Ok(meta)
}

/// Split `XX  - value`. Some exporters use one space or none before the dash.
fn parse_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim_start_matches('\u{feff}');
    let tag = line.get(0..2)?;
    if !tag.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()) {
        return None;
    }
    let rest = line[2..].trim_start_matches(' ');
    let value = rest.strip_prefix('-')?;
    Some((tag, value.strip_prefix(' ').unwrap_or(value)))
}
