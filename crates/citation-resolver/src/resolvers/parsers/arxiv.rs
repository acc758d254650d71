//! arXiv export API Atom feeds (`/api/query?id_list=...`).

use quick_xml::Reader;
use quick_xml::events::Event;

use super::{ParseResult, first_year, squash};
use crate::models::BibliographicMetadata;

/// Parse the first entry of an Atom feed.
///
/// # Errors
///
/// Returns a message for malformed XML, an empty feed or an API error entry.
pub fn parse(xml: &str, provider: &str) -> ParseResult<BibliographicMetadata> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut meta = BibliographicMetadata::from_provider(provider);
    let mut in_entry = false;
    let mut in_author = false;
    let mut found = false;
    let mut current = String::new();
    let mut entry_id = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                match name.as_str() {
                    "entry" => in_entry = true,
                    "author" if in_entry => in_author = true,
                    _ => {}
                }
                current = name;
            }
            Ok(Event::End(e)) => {
                match e.name().as_ref() {
                    b"entry" => {
                        found = true;
                        break;
                    }
                    b"author" => in_author = false,
                    _ => {}
                }
                current.clear();
            }
            Ok(Event::Text(e)) if in_entry => {
                let text = e.unescape().map_err(|e| format!("XML parse error: {e}"))?;
                let text = squash(&text);
                match current.as_str() {
                    "id" => entry_id = text,
                    "title" => meta.title = Some(text),
                    "published" => meta.year = first_year(&text),
                    "name" if in_author => meta.authors.push(text),
                    "arxiv:doi" => meta.doi = crate::identifiers::clean_doi(&text),
                    "arxiv:journal_ref" => meta.venue = Some(text),
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("XML parse error: {e}")),
            _ => {}
        }
    }

    if !found {
        return Err("feed has no entry".to_string());
    }
    if entry_id.contains("api/errors") || meta.title.as_deref() == Some("Error") {
        return Err(format!("arXiv API error entry: {}", entry_id));
    }

    meta.venue = meta.venue.or_else(|| Some("arXiv".to_string()));
    meta.raw_record = Some(xml.to_string());
    Ok(meta)
}
