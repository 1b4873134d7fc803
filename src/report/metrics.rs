use crate::report::duration::parse_duration;
use crate::report::error::ReportError;
use crate::report::grammar::ReportGrammar;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricField {
    Focus,
    Meetings,
    Breaks,
    Other,
    WorkCategories,
    NonworkCategories,
}

impl MetricField {
    pub const ALL: [MetricField; 6] = [
        MetricField::Focus,
        MetricField::Meetings,
        MetricField::Breaks,
        MetricField::Other,
        MetricField::WorkCategories,
        MetricField::NonworkCategories,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Focus => "Focus",
            Self::Meetings => "Meetings",
            Self::Breaks => "Breaks",
            Self::Other => "Other",
            Self::WorkCategories => "Work categories",
            Self::NonworkCategories => "Non-work categories",
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Self::Focus => "focus",
            Self::Meetings => "meetings",
            Self::Breaks => "breaks",
            Self::Other => "other",
            Self::WorkCategories => "work_categories",
            Self::NonworkCategories => "nonwork_categories",
        }
    }
}

/// Durations in hours; a field the report does not mention stays at zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldMetrics {
    pub focus: f64,
    pub meetings: f64,
    pub breaks: f64,
    pub other: f64,
    pub work_categories: f64,
    pub nonwork_categories: f64,
    pub work_hours: f64,
}

impl FieldMetrics {
    pub fn get(&self, field: MetricField) -> f64 {
        match field {
            MetricField::Focus => self.focus,
            MetricField::Meetings => self.meetings,
            MetricField::Breaks => self.breaks,
            MetricField::Other => self.other,
            MetricField::WorkCategories => self.work_categories,
            MetricField::NonworkCategories => self.nonwork_categories,
        }
    }

    fn set(&mut self, field: MetricField, hours: f64) {
        let slot = match field {
            MetricField::Focus => &mut self.focus,
            MetricField::Meetings => &mut self.meetings,
            MetricField::Breaks => &mut self.breaks,
            MetricField::Other => &mut self.other,
            MetricField::WorkCategories => &mut self.work_categories,
            MetricField::NonworkCategories => &mut self.nonwork_categories,
        };
        *slot = hours;
    }
}

pub fn extract_metrics(grammar: &ReportGrammar, body: &str) -> Result<FieldMetrics, ReportError> {
    let mut metrics = grammar.metric_patterns.iter().try_fold(
        FieldMetrics::default(),
        |mut acc, (field, pattern)| {
            if let Some(captures) = pattern.captures(body) {
                acc.set(*field, parse_duration(&captures[2])?);
            }
            Ok::<_, ReportError>(acc)
        },
    )?;

    metrics.work_hours = grammar
        .work_hours
        .captures(body)
        .map(|captures| parse_duration(&captures[1]))
        .transpose()?
        .unwrap_or_default();

    Ok(metrics)
}
