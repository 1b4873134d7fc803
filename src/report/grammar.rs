use crate::report::metrics::MetricField;
use regex::{Regex, escape};

const SUBJECT_PREFIX: &str = "Your Daily Report for";
const CATEGORIES_HEADER: &str = "Categories";
const FOOTER_MARKER: &str = "Did you know";
const SECTION_MARKERS: [&str; 1] = ["Sessions"];
pub const TRUNCATION_MARKER: char = '<';
pub const UNKNOWN_DAY: &str = "Unknown";

#[derive(Debug, Clone)]
pub struct ReportGrammar {
    pub categories_header: String,
    pub footer_marker: String,
    pub section_markers: Vec<String>,
    pub(crate) metric_patterns: Vec<(MetricField, Regex)>,
    pub(crate) work_hours: Regex,
    pub(crate) subject: Regex,
    pub(crate) category_block: Regex,
    pub(crate) category_entry: Regex,
    pub(crate) noise: Regex,
    pub(crate) dashed_rule: Regex,
    pub(crate) name_line: Regex,
    pub(crate) percent_line: Regex,
    pub(crate) duration_line: Regex,
}

impl ReportGrammar {
    pub fn new() -> Result<Self, regex::Error> {
        let metric_patterns = MetricField::ALL
            .into_iter()
            .map(|field| {
                let pattern = format!(r"{}\r\n(\d+)%\r\n([\d hr min]+)", escape(field.label()));
                Regex::new(&pattern).map(|regex| (field, regex))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            categories_header: CATEGORIES_HEADER.to_string(),
            footer_marker: FOOTER_MARKER.to_string(),
            section_markers: SECTION_MARKERS.iter().map(ToString::to_string).collect(),
            metric_patterns,
            work_hours: Regex::new(r"Work Hours[\s-]+\r\n([\d hr min]+)")?,
            subject: Regex::new(&format!(
                r"^{} (\w+), (\w+) (\d+)",
                escape(SUBJECT_PREFIX)
            ))?,
            category_block: Regex::new(&format!(
                r"{}\s*-+\s*\r\n\r\n((?:[\w\s]+\s*(?:\r\n|\n)+\d+%\s*\r\n(?:<\s*)?[\d hr min]+\s*(?:\r\n|\n)+)+)-+",
                escape(CATEGORIES_HEADER)
            ))?,
            category_entry: Regex::new(
                r"([\w\s]+)\s*(?:\r\n|\n)+\d+%[\s-]*\r\n((?:<\s*)?[\d hr min]+)",
            )?,
            noise: Regex::new(r"\b(?:Percent|Total Time|\d+%)\b")?,
            dashed_rule: Regex::new(r"^-{2,}$")?,
            name_line: Regex::new(r"^[\w\s]+$")?,
            percent_line: Regex::new(r"^\d+%[\s-]*$")?,
            duration_line: Regex::new(r"^(?:<\s*)?(\d[\d hr min]*)$")?,
        })
    }

    pub fn strip_noise(&self, text: &str) -> String {
        self.noise.replace_all(text, "").into_owned()
    }

    pub fn is_section_boundary(&self, line: &str) -> bool {
        self.dashed_rule.is_match(line)
            || self
                .section_markers
                .iter()
                .any(|marker| line.starts_with(marker.as_str()))
    }
}

pub fn strip_truncation_marker(text: &str) -> &str {
    text.trim().trim_start_matches(TRUNCATION_MARKER).trim_start()
}
