use crate::embedding::Embedder;
use crate::report::categories::{CategoryEntry, extract_categories};
use crate::report::date::resolve_date_or_fallback;
use crate::report::duration::format_duration;
use crate::report::error::ParseFailure;
use crate::report::grammar::ReportGrammar;
use crate::report::metrics::{FieldMetrics, MetricField, extract_metrics};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawReport {
    pub subject: String,
    pub sender_date: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    pub date: String,
    pub day: String,
    #[serde(flatten)]
    pub metrics: FieldMetrics,
    pub categories: Vec<CategoryEntry>,
    pub summary: String,
    pub raw_text: String,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizeStage {
    Metrics,
    Categories,
    Embedding,
}

impl fmt::Display for NormalizeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Metrics => write!(f, "metric extraction"),
            Self::Categories => write!(f, "category extraction"),
            Self::Embedding => write!(f, "embedding"),
        }
    }
}

pub struct Normalizer<'a> {
    grammar: &'a ReportGrammar,
}

impl<'a> Normalizer<'a> {
    pub fn new(grammar: &'a ReportGrammar) -> Self {
        Self { grammar }
    }

    pub fn normalize(
        &self,
        report: &RawReport,
        embedder: &dyn Embedder,
    ) -> Result<MetricsRecord, ParseFailure> {
        self.normalize_at(report, embedder, Local::now().date_naive())
    }

    /// `today` is only consulted when the report date cannot be resolved.
    pub fn normalize_at(
        &self,
        report: &RawReport,
        embedder: &dyn Embedder,
        today: NaiveDate,
    ) -> Result<MetricsRecord, ParseFailure> {
        let mut record = self.extract(report, today)?;
        record.embedding = embedder
            .embed(&record.summary)
            .map_err(|error| ParseFailure::new(&report.subject, NormalizeStage::Embedding, error))?;

        Ok(record)
    }

    pub fn extract(
        &self,
        report: &RawReport,
        today: NaiveDate,
    ) -> Result<MetricsRecord, ParseFailure> {
        let body = to_crlf(&report.body);

        let metrics = extract_metrics(self.grammar, &body)
            .map_err(|error| ParseFailure::new(&report.subject, NormalizeStage::Metrics, error))?;

        let resolved = resolve_date_or_fallback(
            self.grammar,
            &report.subject,
            &report.sender_date,
            today,
        );
        let date = resolved.date.format("%Y-%m-%d").to_string();

        let categories = extract_categories(self.grammar, &body).map_err(|error| {
            ParseFailure::new(&report.subject, NormalizeStage::Categories, error)
        })?;

        let summary = build_summary(&metrics, &date, &resolved.day, &categories);
        let raw_text = truncate_at_marker(&body, &self.grammar.footer_marker).to_string();

        Ok(MetricsRecord {
            date,
            day: resolved.day,
            metrics,
            categories,
            summary,
            raw_text,
            embedding: Vec::new(),
        })
    }
}

pub fn build_summary(
    metrics: &FieldMetrics,
    date: &str,
    day: &str,
    categories: &[CategoryEntry],
) -> String {
    let category_list = categories
        .iter()
        .map(|entry| format!("{}: {}", entry.name, format_duration(entry.duration)))
        .collect::<Vec<_>>()
        .join(", ");

    MetricField::ALL
        .into_iter()
        .map(|field| (field.key(), format_duration(metrics.get(field))))
        .chain([
            ("work_hours", format_duration(metrics.work_hours)),
            ("date", date.to_string()),
            ("day", day.to_string()),
            ("categories", format!("[{category_list}]")),
        ])
        .map(|(key, value)| format!("{}: {value}", summary_label(key)))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn truncate_at_marker<'b>(body: &'b str, marker: &str) -> &'b str {
    body.find(marker).map_or(body, |index| &body[..index])
}

pub fn to_crlf(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n").replace('\n', "\r\n")
}

fn summary_label(key: &str) -> String {
    let spaced = key.replace('_', " ");
    let mut chars = spaced.chars();

    chars
        .next()
        .map(|first| first.to_uppercase().chain(chars).collect())
        .unwrap_or_default()
}
