use crate::report::normalize::NormalizeStage;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportError {
    #[error("malformed duration: {input:?}")]
    MalformedDuration { input: String },

    #[error("date resolution failed: {reason}")]
    DateResolution { reason: String },
}

#[derive(Debug, Error)]
#[error("report {subject:?} failed during {stage}: {source}")]
pub struct ParseFailure {
    pub subject: String,
    pub stage: NormalizeStage,
    #[source]
    pub source: FailureCause,
}

#[derive(Debug, Error)]
pub enum FailureCause {
    #[error(transparent)]
    Report(#[from] ReportError),

    #[error(transparent)]
    Embedding(#[from] anyhow::Error),
}

impl ParseFailure {
    pub fn new(subject: &str, stage: NormalizeStage, source: impl Into<FailureCause>) -> Self {
        Self {
            subject: subject.to_string(),
            stage,
            source: source.into(),
        }
    }
}
