use crate::report::MetricsRecord;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("record for {date} already exists")]
    Duplicate { date: String },

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub trait RecordSink {
    fn insert(&mut self, record: &MetricsRecord) -> Result<(), SinkError>;
}
