//! Document metadata embedded in PDF bytes: the Info dictionary and the XMP
//! packet. Both are usually stored uncompressed, so a byte scan finds them
//! without a full PDF parser.

use std::sync::LazyLock;

use quick_xml::Reader;
use quick_xml::events::Event;
use regex::bytes::Regex;

use crate::models::BibliographicMetadata;
use crate::resolvers::parsers::{first_year, non_empty, squash};

static INFO_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s-u)/(Title|Author|Subject|CreationDate)\s*(\((?:[^()\\]|\\.|\((?:[^()\\]|\\.)*\))*\)|<[0-9A-Fa-f\s]*>)")
        .expect("valid regex")
});

static XMP_PACKET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<x:xmpmeta.*?</x:xmpmeta>").expect("valid regex")
});

/// Producer-generated titles that say nothing about the work.
const JUNK_TITLE_PREFIXES: &[&str] = &["microsoft word -", "untitled", "slide 1", "powerpoint presentation"];
const JUNK_TITLE_SUFFIXES: &[&str] = &[".doc", ".docx", ".pdf", ".tex", ".dvi", ".indd", ".qxd"];

/// Metadata from the Info dictionary, overlaid with the XMP packet.
#[must_use]
pub fn extract(body: &[u8]) -> BibliographicMetadata {
    let mut meta = BibliographicMetadata::from_provider("pdf");
    let info = info_dictionary(body);
    let xmp = XMP_PACKET
        .find(body)
        .map(|m| xmp_fields(&String::from_utf8_lossy(m.as_bytes())))
        .unwrap_or_default();

    meta.title = xmp.title.or(info.title).filter(|t| !is_junk_title(t));
    meta.authors = if xmp.authors.is_empty() { info.authors } else { xmp.authors };
    meta.year = xmp.year.or(info.year);
    meta.doi = xmp.doi.or(info.doi);
    meta
}

#[derive(Debug, Default)]
struct Fields {
    title: Option<String>,
    authors: Vec<String>,
    year: Option<i32>,
    doi: Option<String>,
}

fn info_dictionary(body: &[u8]) -> Fields {
    let mut fields = Fields::default();
    for cap in INFO_ENTRY.captures_iter(body) {
        let key = String::from_utf8_lossy(&cap[1]).into_owned();
        let value = decode_pdf_string(&cap[2]);
        match key.as_str() {
            "Title" if fields.title.is_none() => fields.title = non_empty(&squash(&value)),
            "Author" if fields.authors.is_empty() => fields.authors = split_author_field(&value),
            "CreationDate" if fields.year.is_none() => {
                fields.year = first_year(value.trim_start_matches("D:").get(..4).unwrap_or_default());
            }
            "Subject" if fields.doi.is_none() => {
                fields.doi = crate::identifiers::extract_identifier(&value)
                    .and_then(|id| id.as_doi().map(ToString::to_string));
            }
            _ => {}
        }
    }
    fields
}

/// Decode a PDF literal `( ... )` or hex `< ... >` string.
fn decode_pdf_string(raw: &[u8]) -> String {
    let bytes = match raw.first() {
        Some(b'<') => decode_hex(&raw[1..raw.len().saturating_sub(1)]),
        Some(b'(') => unescape_literal(&raw[1..raw.len().saturating_sub(1)]),
        _ => raw.to_vec(),
    };

    if bytes.starts_with(&[0xFE, 0xFF]) {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else if let Ok(text) = std::str::from_utf8(&bytes) {
        text.to_string()
    } else {
        // PDFDocEncoding agrees with Latin-1 for printable text.
        bytes.iter().map(|&b| char::from(b)).collect()
    }
}

fn decode_hex(raw: &[u8]) -> Vec<u8> {
    let digits: Vec<u8> = raw
        .iter()
        .filter_map(|&b| char::from(b).to_digit(16))
        .map(|d| d as u8)
        .collect();
    digits
        .chunks(2)
        .map(|pair| (pair[0] << 4) | pair.get(1).copied().unwrap_or(0))
        .collect()
}

fn unescape_literal(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        let b = raw[i];
        if b != b'\\' || i + 1 >= raw.len() {
            out.push(b);
            i += 1;
            continue;
        }
        let next = raw[i + 1];
        i += 2;
        match next {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0C),
            b'0'..=b'7' => {
                let mut value = u32::from(next - b'0');
                let mut taken = 0;
                while taken < 2 && i < raw.len() && (b'0'..=b'7').contains(&raw[i]) {
                    value = value * 8 + u32::from(raw[i] - b'0');
                    i += 1;
                    taken += 1;
                }
                out.push((value & 0xFF) as u8);
            }
            b'\r' | b'\n' => {
                if next == b'\r' && raw.get(i) == Some(&b'\n') {
                    i += 1;
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Split an Info `/Author` value into names.
fn split_author_field(value: &str) -> Vec<String> {
    let value = squash(value);
    if value.contains(';') {
        return value.split(';').filter_map(non_empty).collect();
    }
    let parts: Vec<&str> = value.split(" and ").flat_map(|part| part.split(',')).collect();
    // "Smith, John" is one name; "John Smith, Jane Doe" is two.
    if parts.len() > 1 && parts.iter().all(|p| p.split_whitespace().count() >= 2) {
        parts.into_iter().filter_map(non_empty).collect()
    } else if value.contains(" and ") {
        value.split(" and ").filter_map(non_empty).collect()
    } else {
        non_empty(&value).into_iter().collect()
    }
}

fn is_junk_title(title: &str) -> bool {
    let lower = title.to_lowercase();
    JUNK_TITLE_PREFIXES.iter().any(|p| lower.starts_with(p))
        || JUNK_TITLE_SUFFIXES.iter().any(|s| lower.ends_with(s))
}

/// Fields from an XMP packet: `dc:title`, `dc:creator`, `prism:doi`,
/// `xmp:CreateDate` (element or attribute form).
fn xmp_fields(xml: &str) -> Fields {
    let mut fields = Fields::default();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut stack: Vec<String> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                read_attributes(&e, &mut fields);
                stack.push(String::from_utf8_lossy(e.name().as_ref()).into_owned());
            }
            Ok(Event::Empty(e)) => read_attributes(&e, &mut fields),
            Ok(Event::End(_)) => {
                stack.pop();
            }
            Ok(Event::Text(e)) => {
                let Ok(text) = e.unescape() else { continue };
                let text = squash(&text);
                let current = stack.last().map(String::as_str).unwrap_or_default();
                let within = |name: &str| stack.iter().any(|s| s == name);
                match current {
                    "rdf:li" if within("dc:title") && fields.title.is_none() => {
                        fields.title = non_empty(&text);
                    }
                    "rdf:li" if within("dc:creator") => fields.authors.extend(non_empty(&text)),
                    "prism:doi" | "pdfx:doi" => {
                        fields.doi = fields.doi.take().or_else(|| crate::identifiers::clean_doi(&text));
                    }
                    "xmp:CreateDate" | "prism:publicationDate" => {
                        fields.year = fields.year.or_else(|| first_year(&text));
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
    }
    fields
}

fn read_attributes(e: &quick_xml::events::BytesStart<'_>, fields: &mut Fields) {
    for attr in e.attributes().flatten() {
        let Ok(value) = attr.unescape_value() else { continue };
        match attr.key.as_ref() {
            b"prism:doi" | b"pdfx:doi" if fields.doi.is_none() => {
                fields.doi = crate::identifiers::clean_doi(&value);
            }
            b"xmp:CreateDate" if fields.year.is_none() => fields.year = first_year(&value),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_dictionary_literal() {
        let body = b"%PDF-1.4\n1 0 obj\n<< /Title (Deep Nets \\(Revisited\\)) /Author (John Smith, Jane Doe) /CreationDate (D:20190304120000Z) >>\nendobj";
        let meta = extract(body);
        assert_eq!(meta.title.as_deref(), Some("Deep Nets (Revisited)"));
        assert_eq!(meta.authors, vec!["John Smith", "Jane Doe"]);
        assert_eq!(meta.year, Some(2019));
    }

    #[test]
    fn test_info_dictionary_utf16_hex() {
        // "Hi" in UTF-16BE with BOM.
        let body = b"%PDF-1.7 << /Title <FEFF00480069> /Author (Smith, John) >>";
        let meta = extract(body);
        assert_eq!(meta.title.as_deref(), Some("Hi"));
        assert_eq!(meta.authors, vec!["Smith, John"]);
    }

    #[test]
    fn test_xmp_overrides_info() {
        let body = br#"%PDF-1.5 << /Title (Microsoft Word - draft.docx) >>
<x:xmpmeta xmlns:x="adobe:ns:meta/"><rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
<rdf:Description xmp:CreateDate="2021-06-01T10:00:00Z" prism:doi="10.1234/ABC.5">
<dc:title><rdf:Alt><rdf:li xml:lang="x-default">Robust Citation Checking</rdf:li></rdf:Alt></dc:title>
<dc:creator><rdf:Seq><rdf:li>Ada Lovelace</rdf:li><rdf:li>Alan Turing</rdf:li></rdf:Seq></dc:creator>
</rdf:Description></rdf:RDF></x:xmpmeta>"#;
        let meta = extract(body);
        assert_eq!(meta.title.as_deref(), Some("Robust Citation Checking"));
        assert_eq!(meta.authors, vec!["Ada Lovelace", "Alan Turing"]);
        assert_eq!(meta.year, Some(2021));
        assert_eq!(meta.doi.as_deref(), Some("10.1234/abc.5"));
    }

    #[test]
    fn test_junk_title_dropped() {
        let meta = extract(b"%PDF-1.4 << /Title (paper_final_v3.pdf) >>");
        assert_eq!(meta.title, None);
        assert!(!meta.is_useful());
    }

    #[test]
    fn test_octal_escape() {
        assert_eq!(unescape_literal(b"caf\\351"), vec![b'c', b'a', b'f', 0xE9]);
        assert_eq!(decode_pdf_string(b"(caf\\351)"), "caf\u{e9}");
    }
}
