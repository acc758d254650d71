//! Author-year labels.

/// Surname of an author name.
///
/// Handles "Family, Given", "Given Family" and the PubMed form "Family GI".
#[must_use]
pub fn surname(name: &str) -> String {
    let name = name.trim().trim_end_matches(['.', ',', ';']).trim();
    if let Some((family, _)) = name.split_once(',') {
        return family.trim().to_string();
    }

    let tokens: Vec<&str> = name.split_whitespace().collect();
    match tokens.as_slice() {
        [] => String::new(),
        [only] => (*only).to_string(),
        [first, .., last] if is_initials(last) => (*first).to_string(),
        [.., last] => (*last).to_string(),
    }
}

/// "J", "JA", "J.A." or "J.-P."
fn is_initials(token: &str) -> bool {
    let letters: Vec<char> = token.chars().filter(|c| c.is_alphabetic()).collect();
    !letters.is_empty() && letters.len() <= 3 && letters.iter().all(|c| c.is_uppercase())
}

/// Label for an author list: one surname, "A and B", or "A et al.", plus
/// "(year)" when known.
#[must_use]
pub fn format_label(authors: &[String], year: Option<i32>) -> String {
    let names = match authors {
        [] => String::new(),
        [one] => surname(one),
        [a, b] => format!("{} and {}", surname(a), surname(b)),
        [lead, ..] => format!("{} et al.", surname(lead)),
    };
    with_year(names, year)
}

/// Lead author with "et al.", for citations that elided co-authors.
#[must_use]
pub fn format_lead_label(authors: &[String], year: Option<i32>) -> String {
    match authors.first() {
        Some(lead) if authors.len() > 1 => with_year(format!("{} et al.", surname(lead)), year),
        _ => format_label(authors, year),
    }
}

fn with_year(names: String, year: Option<i32>) -> String {
    match (names.is_empty(), year) {
        (true, Some(year)) => format!("({year})"),
        (true, None) => String::new(),
        (false, Some(year)) => format!("{names} ({year})"),
        (false, None) => names,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_surname_forms() {
        assert_eq!(surname("Smith, John"), "Smith");
        assert_eq!(surname("John Smith"), "Smith");
        assert_eq!(surname("Kumar R"), "Kumar");
        assert_eq!(surname("Zhou P."), "Zhou");
        assert_eq!(surname("Ludwig van Beethoven"), "Beethoven");
        assert_eq!(surname("Plato"), "Plato");
    }

    #[test]
    fn test_label_rule() {
        assert_eq!(format_label(&names(&["Smith, John"]), Some(2023)), "Smith (2023)");
        assert_eq!(
            format_label(&names(&["Smith, John", "Doe, Jane"]), Some(2023)),
            "Smith and Doe (2023)"
        );
        assert_eq!(
            format_label(&names(&["Smith, John", "Doe, Jane", "Roe, Rita"]), None),
            "Smith et al."
        );
        assert_eq!(format_label(&[], Some(1999)), "(1999)");
    }

    #[test]
    fn test_lead_label() {
        assert_eq!(
            format_lead_label(&names(&["Smith, John", "Doe, Jane"]), Some(2023)),
            "Smith et al. (2023)"
        );
        assert_eq!(format_lead_label(&names(&["Smith, John"]), Some(2023)), "Smith (2023)");
    }
}
