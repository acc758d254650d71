//! BibTeX records, as served by "Cite / Export" links or embedded in pages.
//!
//! Only the first regular entry is read. `@string` macros are expanded,
//! `@comment` and `@preamble` are skipped.

use std::collections::HashMap;
use std::sync::LazyLock;

use nom::IResult;
use nom::branch::alt;
use nom::bytes::complete::take_while1;
use nom::character::complete::{char, multispace0};
use nom::combinator::map;
use regex::Regex;

use super::{ParseResult, first_year, non_empty};
use crate::models::BibliographicMetadata;

static ENTRY_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)@(?:article|inproceedings|incollection|conference|book|inbook|misc|techreport|phdthesis|mastersthesis|unpublished|online|report)\s*\{",
    )
    .expect("valid regex")
});

/// A parsed entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BibEntry {
    /// Entry type, lower-cased.
    pub entry_type: String,
    /// Cite key.
    pub key: String,
    /// Fields with lower-cased names.
    pub fields: HashMap<String, String>,
}

impl BibEntry {
    fn field(&self, name: &str) -> Option<String> {
        self.fields.get(name).map(|v| decode_latex(v)).and_then(|v| non_empty(&v))
    }

    /// Convert to metadata.
    #[must_use]
    pub fn into_metadata(self, provider: &str, raw: Option<String>) -> BibliographicMetadata {
        let authors = self
            .fields
            .get("author")
            .or_else(|| self.fields.get("editor"))
            .map(|list| split_authors(list))
            .unwrap_or_default();
        let venue = ["journal", "journaltitle", "booktitle", "publisher", "institution", "school"]
            .iter()
            .find_map(|name| self.field(name));

        BibliographicMetadata {
            title: self.field("title"),
            authors,
            year: self
                .field("year")
                .or_else(|| self.field("date"))
                .and_then(|y| first_year(&y)),
            venue,
            volume: self.field("volume"),
            pages: self.field("pages").map(|p| p.replace("--", "-")),
            doi: self.field("doi").and_then(|d| crate::identifiers::clean_doi(&d)),
            source_provider: provider.to_string(),
            raw_record: raw,
        }
    }
}

/// Locate an inline entry in a larger document (HTML page, `<pre>` block).
#[must_use]
pub fn find_entry(text: &str) -> Option<&str> {
    let start = ENTRY_START.find(text)?.start();
    Some(&text[start..])
}

/// Parse the first regular entry of a BibTeX document.
///
/// # Errors
///
/// Returns a message if no entry can be parsed.
pub fn parse(text: &str, provider: &str) -> ParseResult<BibliographicMetadata> {
    let entry = parse_first_entry(text)?;
    let raw = text.trim().to_string();
    Ok(entry.into_metadata(provider, Some(raw)))
}

/// Parse the first regular entry.
///
/// # Errors
///
/// Returns a message if no entry can be parsed.
pub fn parse_first_entry(text: &str) -> ParseResult<BibEntry> {
    let mut strings = HashMap::new();
    let mut remaining = text;

    while let Some(at) = remaining.find('@') {
        remaining = &remaining[at..];
        match parse_at(remaining, &strings) {
            Ok((_, At::Entry(entry))) => return Ok(entry),
            Ok((rest, At::String(key, value))) => {
                strings.insert(key.to_ascii_lowercase(), value);
                remaining = rest;
            }
            Ok((rest, At::Skip)) => remaining = rest,
            Err(_) => remaining = &remaining[1..],
        }
    }

    Err("no BibTeX entry found".to_string())
}

enum At {
    Entry(BibEntry),
    String(String, String),
    Skip,
}

fn parse_at<'a>(input: &'a str, strings: &HashMap<String, String>) -> IResult<&'a str, At> {
    let (rest, _) = char('@')(input)?;
    let (rest, _) = multispace0(rest)?;
    let (rest, kind) = take_while1(|c: char| c.is_ascii_alphanumeric())(rest)?;

    match kind.to_ascii_lowercase().as_str() {
        "string" => {
            let (rest, _) = open(rest)?;
            let (rest, (key, value)) = parse_field(rest, strings)?;
            let (rest, _) = close(rest)?;
            Ok((rest, At::String(key, value)))
        }
        "comment" | "preamble" => {
            let (rest, _) = multispace0(rest)?;
            let (rest, _) = braced(rest)?;
            Ok((rest, At::Skip))
        }
        entry_type => {
            let (rest, _) = open(rest)?;
            let (rest, key) =
                take_while1(|c: char| c.is_ascii_alphanumeric() || "_-:./+".contains(c))(rest)?;
            let (rest, _) = multispace0(rest)?;
            let (rest, _) = char(',')(rest)?;
            let (rest, fields) = parse_fields(rest, strings)?;
            let (rest, _) = close(rest)?;
            Ok((
                rest,
                At::Entry(BibEntry {
                    entry_type: entry_type.to_string(),
                    key: key.to_string(),
                    fields: fields.into_iter().collect(),
                }),
            ))
        }
    }
}

fn open(input: &str) -> IResult<&str, ()> {
    let (rest, _) = multispace0(input)?;
    let (rest, _) = alt((char('{'), char('(')))(rest)?;
    let (rest, _) = multispace0(rest)?;
    Ok((rest, ()))
}

fn close(input: &str) -> IResult<&str, ()> {
    let (rest, _) = multispace0(input)?;
    let (rest, _) = alt((char('}'), char(')')))(rest)?;
    Ok((rest, ()))
}

fn parse_fields<'a>(
    input: &'a str,
    strings: &HashMap<String, String>,
) -> IResult<&'a str, Vec<(String, String)>> {
    let mut fields = Vec::new();
    let mut remaining = input;

    loop {
        let (rest, _) = multispace0(remaining)?;
        if rest.starts_with('}') || rest.starts_with(')') {
            return Ok((rest, fields));
        }

        match parse_field(rest, strings) {
            Ok((rest, field)) => {
                fields.push(field);
                let (rest, _) = multispace0(rest)?;
                remaining = rest.strip_prefix(',').unwrap_or(rest);
            }
            Err(_) => return Ok((rest, fields)),
        }
    }
}

fn parse_field<'a>(
    input: &'a str,
    strings: &HashMap<String, String>,
) -> IResult<&'a str, (String, String)> {
    let (rest, _) = multispace0(input)?;
    let (rest, key) = take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-')(rest)?;
    let (rest, _) = multispace0(rest)?;
    let (rest, _) = char('=')(rest)?;
    let (rest, value) = parse_value(rest, strings)?;
    Ok((rest, (key.to_ascii_lowercase(), value)))
}

/// Braced, quoted, numeric or macro value, with `#` concatenation.
fn parse_value<'a>(input: &'a str, strings: &HashMap<String, String>) -> IResult<&'a str, String> {
    let mut value = String::new();
    let mut remaining = input;

    loop {
        let (rest, _) = multispace0(remaining)?;
        let (rest, part) = alt((
            map(braced, |s: &str| s[1..s.len() - 1].to_string()),
            quoted,
            map(take_while1(|c: char| c.is_ascii_digit()), str::to_string),
            map(take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-'), |s: &str| {
                strings.get(&s.to_ascii_lowercase()).cloned().unwrap_or_else(|| s.to_string())
            }),
        ))(rest)?;
        value.push_str(&part);

        let (rest, _) = multispace0(rest)?;
        match rest.strip_prefix('#') {
            Some(next) => remaining = next,
            None => return Ok((rest, value)),
        }
    }
}

/// `{...}` with nesting; returns the slice including the outer braces.
fn braced(input: &str) -> IResult<&str, &str> {
    if !input.starts_with('{') {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Char)));
    }

    let bytes = input.as_bytes();
    let mut depth = 0usize;
    let mut pos = 0;
    while pos < bytes.len() {
        match bytes[pos] {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok((&input[pos + 1..], &input[..=pos]));
                }
            }
            b'\\' => pos += 1,
            _ => {}
        }
        pos += 1;
    }

    Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Char)))
}

/// `"..."`, where quotes inside braces do not terminate.
fn quoted(input: &str) -> IResult<&str, String> {
    if !input.starts_with('"') {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Char)));
    }

    let bytes = input.as_bytes();
    let mut depth = 0usize;
    let mut pos = 1;
    while pos < bytes.len() {
        match bytes[pos] {
            b'{' => depth += 1,
            b'}' => depth = depth.saturating_sub(1),
            b'\\' => pos += 1,
            b'"' if depth == 0 => return Ok((&input[pos + 1..], input[1..pos].to_string())),
            _ => {}
        }
        pos += 1;
    }

    Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Char)))
}

/// Split an author field on top-level " and ".
fn split_authors(list: &str) -> Vec<String> {
    let mut authors = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();

    for word in list.split_whitespace() {
        let at_top = depth == 0;
        depth = word.chars().fold(depth, |d, c| match c {
            '{' => d + 1,
            '}' => d.saturating_sub(1),
            _ => d,
        });
        if at_top && word.eq_ignore_ascii_case("and") {
            authors.push(std::mem::take(&mut current));
            continue;
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    authors.push(current);

    authors
        .iter()
        .map(|a| decode_latex(a))
        .filter_map(|a| non_empty(&a))
        .filter(|a| !a.eq_ignore_ascii_case("others"))
        .collect()
}

/// Strip braces and the common LaTeX escapes.
fn decode_latex(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' | '}' => {}
            '~' => out.push(' '),
            '\\' => match chars.peek().copied() {
                Some(next @ ('&' | '%' | '$' | '#' | '_' | '{' | '}')) => {
                    out.push(next);
                    chars.next();
                }
                // Accent commands: drop the command, keep the letter.
                Some('\'' | '`' | '^' | '"' | '~' | '=' | '.') => {
                    chars.next();
                }
                Some(c) if c.is_ascii_alphabetic() => {
                    while chars.peek().is_some_and(char::is_ascii_alphabetic) {
                        chars.next();
                    }
                    if chars.peek() == Some(&' ') {
                        chars.next();
                    }
                }
                _ => {}
            },
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
@string{jex = "Journal of Examples"}
@article{smith2023deep,
  title   = {Deep {L}earning for Citations},
  author  = {Smith, John and Doe, Jane and {The CITE Consortium}},
  journal = jex,
  year    = 2023,
  volume  = "12",
  pages   = {1--10},
  doi     = {10.1234/ABC},
}
"#;

    #[test]
    fn test_parse_article() {
        let meta = parse(SAMPLE, "bibtex").unwrap();
        assert_eq!(meta.title.as_deref(), Some("Deep Learning for Citations"));
        assert_eq!(meta.authors, vec!["Smith, John", "Doe, Jane", "The CITE Consortium"]);
        assert_eq!(meta.venue.as_deref(), Some("Journal of Examples"));
        assert_eq!(meta.year, Some(2023));
        assert_eq!(meta.pages.as_deref(), Some("1-10"));
        assert_eq!(meta.doi.as_deref(), Some("10.1234/abc"));
    }

    #[test]
    fn test_find_inline_entry() {
        let html = "<pre>Cite as:\n@InProceedings{k1, title={T}, author={A. Person}, year={2020}}</pre>";
        let entry = find_entry(html).unwrap();
        let parsed = parse_first_entry(entry).unwrap();
        assert_eq!(parsed.entry_type, "inproceedings");
        assert_eq!(parsed.key, "k1");
    }

    #[test]
    fn test_latex_accents_and_others() {
        let text = r#"@misc{x, author = {G{\"o}del, Kurt and others}, title = {On \& Off}}"#;
        let meta = parse(text, "bibtex").unwrap();
        assert_eq!(meta.authors, vec!["Godel, Kurt"]);
        assert_eq!(meta.title.as_deref(), Some("On & Off"));
    }

    #[test]
    fn test_garbage_is_an_error() {
        assert!(parse("no entries here @ all", "bibtex").is_err());
        assert!(parse("@article{broken", "bibtex").is_err());
    }
}
