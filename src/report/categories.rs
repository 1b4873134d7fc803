use crate::report::duration::parse_duration;
use crate::report::error::ReportError;
use crate::report::grammar::{ReportGrammar, TRUNCATION_MARKER, strip_truncation_marker};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryEntry {
    pub name: String,
    pub duration: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Matched(Vec<CategoryEntry>),
    NotFound,
}

impl ParseOutcome {
    fn from_entries(entries: Vec<CategoryEntry>) -> Self {
        if entries.is_empty() {
            Self::NotFound
        } else {
            Self::Matched(entries)
        }
    }
}

pub fn extract_categories(
    grammar: &ReportGrammar,
    body: &str,
) -> Result<Vec<CategoryEntry>, ReportError> {
    if let ParseOutcome::Matched(entries) = extract_primary(grammar, body)? {
        return Ok(entries);
    }

    debug!("primary categories grammar found nothing, trying line scan");

    match extract_fallback(grammar, body)? {
        ParseOutcome::Matched(entries) => Ok(entries),
        ParseOutcome::NotFound => Ok(Vec::new()),
    }
}

pub fn extract_primary(grammar: &ReportGrammar, body: &str) -> Result<ParseOutcome, ReportError> {
    let Some(block) = grammar
        .category_block
        .captures(body)
        .and_then(|captures| captures.get(1))
    else {
        return Ok(ParseOutcome::NotFound);
    };

    let entries = grammar
        .category_entry
        .captures_iter(block.as_str())
        .map(|captures| build_entry(grammar, &captures[1], &captures[2]))
        .filter_map(Result::transpose)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ParseOutcome::from_entries(entries))
}

pub fn extract_fallback(grammar: &ReportGrammar, body: &str) -> Result<ParseOutcome, ReportError> {
    let Some(start) = body.rfind(grammar.categories_header.as_str()) else {
        return Ok(ParseOutcome::NotFound);
    };

    let section = grammar
        .strip_noise(&body[start + grammar.categories_header.len()..])
        .replace(TRUNCATION_MARKER, "");

    let lines = section
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .skip_while(|line| grammar.dashed_rule.is_match(line))
        .take_while(|line| !grammar.is_section_boundary(line))
        .collect::<Vec<_>>();

    let entries = lines
        .windows(3)
        .filter(|window| {
            grammar.name_line.is_match(window[0])
                && grammar.percent_line.is_match(window[1])
                && grammar.duration_line.is_match(window[2])
        })
        .map(|window| build_entry(grammar, window[0], window[2]))
        .filter_map(Result::transpose)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ParseOutcome::from_entries(entries))
}

fn build_entry(
    grammar: &ReportGrammar,
    raw_name: &str,
    raw_duration: &str,
) -> Result<Option<CategoryEntry>, ReportError> {
    let name = grammar.strip_noise(raw_name).trim().to_string();
    if name.is_empty() {
        return Ok(None);
    }

    let duration = parse_duration(strip_truncation_marker(raw_duration))?;
    Ok(Some(CategoryEntry { name, duration }))
}

#[cfg(test)]
mod tests {
    use super::{CategoryEntry, ParseOutcome, extract_categories, extract_fallback, extract_primary};
    use crate::report::error::ReportError;
    use crate::report::grammar::ReportGrammar;

    const PRIMARY: &str = "Focus\r\n50%\r\n4 hr\r\n\r\n\
Categories\r\n--------------------\r\n\r\n\
Software Development\r\n45%\r\n2 hr 15 min\r\n\r\n\
Communication\r\n30%\r\n1 hr 30 min\r\n\r\n\
Entertainment\r\n1%\r\n< 1 min\r\n\r\n\
--------------------\r\n\r\nSessions\r\n";

    const LOOSE: &str = "Categories\r\n--------------------\r\n\
Software Development\r\n45%\r\n2 hr 15 min\r\n\
Communication\r\n30%\r\n1 hr 30 min\r\n\
Entertainment\r\n1%\r\n< 1 min\r\n\
Sessions\r\nDeep work\r\n90%\r\n3 hr\r\n";

    fn expected() -> Vec<CategoryEntry> {
        vec![
            CategoryEntry {
                name: "Software Development".to_string(),
                duration: 2.25,
            },
            CategoryEntry {
                name: "Communication".to_string(),
                duration: 1.5,
            },
            CategoryEntry {
                name: "Entertainment".to_string(),
                duration: 0.0167,
            },
        ]
    }

    #[test]
    fn primary_grammar_keeps_source_order() {
        let grammar = ReportGrammar::new().expect("grammar");
        let outcome = extract_primary(&grammar, PRIMARY).expect("primary");

        assert_eq!(outcome, ParseOutcome::Matched(expected()));
    }

    #[test]
    fn loose_layout_needs_fallback() {
        let grammar = ReportGrammar::new().expect("grammar");

        assert_eq!(
            extract_primary(&grammar, LOOSE).expect("primary"),
            ParseOutcome::NotFound
        );
        assert_eq!(
            extract_fallback(&grammar, LOOSE).expect("fallback"),
            ParseOutcome::Matched(expected())
        );
        assert_eq!(extract_categories(&grammar, LOOSE).expect("categories"), expected());
    }

    #[test]
    fn fallback_stops_at_closing_rule() {
        let grammar = ReportGrammar::new().expect("grammar");
        let body = "Categories\r\n----\r\nDesign\r\n10%\r\n20 min\r\n----\r\nLater\r\n5%\r\n5 min\r\n";

        assert_eq!(
            extract_categories(&grammar, body).expect("categories"),
            vec![CategoryEntry {
                name: "Design".to_string(),
                duration: 0.3333,
            }]
        );
    }

    #[test]
    fn duplicate_names_are_preserved() {
        let grammar = ReportGrammar::new().expect("grammar");
        let body = "Categories\r\n----\r\n\r\nDesign\r\n10%\r\n20 min\r\n\r\nDesign\r\n5%\r\n10 min\r\n\r\n----\r\n";
        let entries = extract_categories(&grammar, body).expect("categories");

        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|entry| entry.name == "Design"));
    }

    #[test]
    fn missing_section_yields_no_entries() {
        let grammar = ReportGrammar::new().expect("grammar");
        let entries = extract_categories(&grammar, "Focus\r\n100%\r\n1 hr\r\n").expect("categories");

        assert!(entries.is_empty());
    }

    #[test]
    fn unparseable_primary_duration_is_an_error_not_a_fallback() {
        let grammar = ReportGrammar::new().expect("grammar");
        let body = "Categories\r\n----\r\n\r\nDesign\r\n5%\r\nmin\r\n\r\n----\r\n";

        assert_eq!(
            extract_fallback(&grammar, body).expect("fallback"),
            ParseOutcome::NotFound
        );
        assert_eq!(
            extract_categories(&grammar, body),
            Err(ReportError::MalformedDuration {
                input: "min".to_string()
            })
        );
    }

    #[test]
    fn primary_match_wins_over_a_loose_tail() {
        let grammar = ReportGrammar::new().expect("grammar");
        let body = "Categories\r\n--------\r\n\r\n\
Coding\r\n50%\r\n2 hr\r\n\r\n\
--------\r\n\r\n\
Weekly Categories\r\nReading\r\n20%\r\n1 hr\r\n";

        assert_eq!(
            extract_fallback(&grammar, body).expect("fallback"),
            ParseOutcome::Matched(vec![CategoryEntry {
                name: "Reading".to_string(),
                duration: 1.0,
            }])
        );
        assert_eq!(
            extract_categories(&grammar, body).expect("categories"),
            vec![CategoryEntry {
                name: "Coding".to_string(),
                duration: 2.0,
            }]
        );
    }
}
