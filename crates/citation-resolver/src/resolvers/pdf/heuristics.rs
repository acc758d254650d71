//! First-page layout heuristics for PDFs without usable embedded metadata.
//!
//! The title is the first block of substantial lines before the author
//! line; authors come from lines that look like name lists.

use std::sync::LazyLock;

use regex::Regex;

use crate::identifiers::{IdentifierKind, extract_identifier};
use crate::resolvers::parsers::squash;

static YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(19\d{2}|20\d{2})\b").expect("valid regex"));

/// Lines containing these never belong to the title block.
const HEADER_MARKERS: &[&str] = &[
    "preprint", "proceedings", "conference", "submitted", "accepted", "published", "received", "journal", "volume", "issue",
    "pages", "vol.", "no.", "doi:", "arxiv:", "http", "www", "\u{a9}", "copyright",
    "all rights reserved", "abstract", "introduction", "keywords:",
];

/// Affiliation and boilerplate markers; never part of a name.
const NON_NAME_MARKERS: &[&str] = &[
    "university", "institute", "department", "laboratory", "school", "college", "et al",
    "submitted", "accepted", "@",
];

/// Footnote and affiliation markers attached to names.
const NAME_MARKERS: &[char] = &[
    '*', '\u{2020}', '\u{2021}', '\u{a7}', '\u{b9}', '\u{b2}', '\u{b3}', '\u{2074}', '\u{2075}',
    '\u{2076}', '\u{2077}', '\u{2078}', '\u{2079}', '\u{2070}',
];

/// Fields guessed from first-page text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FirstPage {
    /// Title block.
    pub title: Option<String>,
    /// Names as "Family, Given".
    pub authors: Vec<String>,
    /// Most recent plausible year.
    pub year: Option<i32>,
    /// DOI printed on the page.
    pub doi: Option<String>,
}

impl FirstPage {
    /// Returns true when nothing was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.authors.is_empty() && self.year.is_none() && self.doi.is_none()
    }
}

/// Guess title, authors, year and DOI from the text of page one.
#[must_use]
pub fn first_page(text: &str, current_year: i32) -> FirstPage {
    let text = normalize_text(text);
    let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

    FirstPage {
        title: title_block(&lines),
        authors: authors(&lines),
        year: latest_year(&text, current_year),
        doi: extract_identifier(&text)
            .filter(|id| id.kind == IdentifierKind::Doi)
            .map(|id| id.value),
    }
}

fn normalize_text(input: &str) -> String {
    input
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace('\u{00A0}', " ")
        .replace('\u{fb01}', "fi")
        .replace('\u{fb02}', "fl")
        .replace('\u{000C}', "\n")
}

fn title_block(lines: &[&str]) -> Option<String> {
    let mut block: Vec<&str> = Vec::new();

    for line in lines.iter().take(25) {
        let lower = line.to_lowercase();
        if HEADER_MARKERS.iter().any(|m| lower.contains(m)) || line.chars().count() < 10 {
            if block.is_empty() {
                continue;
            }
            break;
        }
        if NON_NAME_MARKERS[..5].iter().any(|m| lower.contains(m)) || lower.contains('@') {
            continue;
        }
        if looks_like_author_line(line) {
            if block.is_empty() {
                continue;
            }
            break;
        }
        block.push(line);
        if block.len() >= 3 {
            break;
        }
    }

    let joined = squash(&block.join(" "));
    let joined = if joined.chars().count() > 300 {
        block.first().map(|l| squash(l)).unwrap_or_default()
    } else {
        joined
    };
    let title = joined.trim_end_matches(['.', ',', ';']).to_string();
    (!title.is_empty()).then_some(title)
}

/// A line of names: "A and B", several comma-separated capitalized names,
/// or names carrying footnote markers.
fn looks_like_author_line(line: &str) -> bool {
    let words: Vec<&str> = line.split_whitespace().collect();
    for (i, word) in words.iter().enumerate() {
        if word.eq_ignore_ascii_case("and")
            && capitalized_count(&words[..i]) >= 2
            && capitalized_count(&words[i + 1..]) >= 2
        {
            return true;
        }
    }

    let name_like = line
        .split(',')
        .map(str::trim)
        .filter(|part| part.len() > 2 && capitalized_count(&part.split_whitespace().collect::<Vec<_>>()) >= 1)
        .count();
    if name_like >= 2 && line.split(',').all(|part| part.split_whitespace().count() <= 4) {
        return true;
    }

    line.contains(NAME_MARKERS) && capitalized_count(&words) >= 2
}

fn capitalized_count(words: &[&str]) -> usize {
    words
        .iter()
        .filter(|w| w.chars().count() > 1 && w.chars().next().is_some_and(char::is_uppercase))
        .count()
}

fn authors(lines: &[&str]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for line in lines.iter().take(30).filter(|l| looks_like_author_line(l)) {
        for name in names_in_line(line) {
            if !names.iter().any(|n| n.eq_ignore_ascii_case(&name)) {
                names.push(name);
            }
        }
    }
    names
}

fn names_in_line(line: &str) -> Vec<String> {
    let cleaned: String = line
        .chars()
        .filter(|c| !NAME_MARKERS.contains(c) && !c.is_ascii_digit())
        .collect();
    cleaned
        .split(" and ")
        .flat_map(|part| part.split(','))
        .map(str::trim)
        .filter(|candidate| is_plausible_name(candidate))
        .map(family_first)
        .collect()
}

fn is_plausible_name(candidate: &str) -> bool {
    let words: Vec<&str> = candidate.split_whitespace().collect();
    if !(3..=100).contains(&candidate.len()) || !(2..=4).contains(&words.len()) {
        return false;
    }
    if !words[0].chars().next().is_some_and(char::is_uppercase) {
        return false;
    }
    let lower = candidate.to_lowercase();
    !NON_NAME_MARKERS.iter().any(|m| lower.contains(m))
}

/// "Given Family" becomes "Family, Given".
fn family_first(name: &str) -> String {
    let words: Vec<&str> = name.split_whitespace().collect();
    match words.split_last() {
        Some((family, given)) if !given.is_empty() => format!("{family}, {}", given.join(" ")),
        _ => name.to_string(),
    }
}

fn latest_year(text: &str, current_year: i32) -> Option<i32> {
    YEAR.captures_iter(text)
        .filter_map(|cap| cap[1].parse::<i32>().ok())
        .filter(|year| (1900..=current_year + 1).contains(year))
        .max()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "\
Proceedings of the Example Conference 2022

Scalable Verification of Machine-Written
Bibliographies

Alice Johnson*, Bob Lee\u{2020} and Carol Diaz
Department of Computer Science, Example University
alice@example.edu

Abstract
We study citations. doi:10.5555/scale.2022.7
";

    #[test]
    fn test_first_page_fields() {
        let page = first_page(PAGE, 2026);
        assert_eq!(
            page.title.as_deref(),
            Some("Scalable Verification of Machine-Written Bibliographies")
        );
        assert_eq!(page.authors, vec!["Johnson, Alice", "Lee, Bob", "Diaz, Carol"]);
        assert_eq!(page.year, Some(2022));
        assert_eq!(page.doi.as_deref(), Some("10.5555/scale.2022.7"));
    }

    #[test]
    fn test_future_years_ignored() {
        assert_eq!(latest_year("Copyright 2031, first printed 2019", 2026), Some(2019));
    }

    #[test]
    fn test_empty_text() {
        assert!(first_page("", 2026).is_empty());
    }

    #[test]
    fn test_family_first() {
        assert_eq!(family_first("Ada King Lovelace"), "Lovelace, Ada King");
        assert_eq!(family_first("Plato"), "Plato");
    }
}
