use crate::embedding::Embedder;
use crate::mail::MailSource;
use crate::report::{Normalizer, RawReport, ReportGrammar};
use crate::sink::{RecordSink, SinkError};
use anyhow::Result;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Inserted { date: String },
    Skipped { date: String },
    Failed { subject: String, reason: String },
}

impl IngestOutcome {
    pub fn status_line(&self) -> String {
        match self {
            Self::Inserted { date } => format!("[OK] {date} stored"),
            Self::Skipped { date } => format!("[SKIP] {date} already recorded"),
            Self::Failed { subject, reason } => format!("[FAIL] {subject}: {reason}"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub inserted: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl IngestSummary {
    fn record(mut self, outcome: &IngestOutcome) -> Self {
        match outcome {
            IngestOutcome::Inserted { .. } => self.inserted += 1,
            IngestOutcome::Skipped { .. } => self.skipped += 1,
            IngestOutcome::Failed { .. } => self.failed += 1,
        }
        self
    }
}

pub fn run_ingest(
    grammar: &ReportGrammar,
    source: &dyn MailSource,
    embedder: &dyn Embedder,
    sink: &mut dyn RecordSink,
    limit: usize,
) -> Result<IngestSummary> {
    let reports = source.fetch(limit)?;
    info!(count = reports.len(), "daily reports fetched");

    let normalizer = Normalizer::new(grammar);
    let summary = reports
        .iter()
        .map(|report| ingest_one(&normalizer, report, embedder, &mut *sink))
        .inspect(|outcome| println!("{}", outcome.status_line()))
        .fold(IngestSummary::default(), |summary, outcome| {
            summary.record(&outcome)
        });

    info!(
        inserted = summary.inserted,
        skipped = summary.skipped,
        failed = summary.failed,
        "ingest finished"
    );

    Ok(summary)
}

fn ingest_one(
    normalizer: &Normalizer<'_>,
    report: &RawReport,
    embedder: &dyn Embedder,
    sink: &mut dyn RecordSink,
) -> IngestOutcome {
    let record = match normalizer.normalize(report, embedder) {
        Ok(record) => record,
        Err(failure) => {
            error!(error = %failure, "report normalization failed");
            return IngestOutcome::Failed {
                subject: report.subject.clone(),
                reason: failure.to_string(),
            };
        }
    };

    match sink.insert(&record) {
        Ok(()) => IngestOutcome::Inserted { date: record.date },
        Err(SinkError::Duplicate { date }) => {
            warn!(date = %date, "record already exists, skipping");
            IngestOutcome::Skipped { date }
        }
        Err(SinkError::Storage(error)) => {
            error!(error = %error, date = %record.date, "failed to store record");
            IngestOutcome::Failed {
                subject: report.subject.clone(),
                reason: format!("{error:#}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{IngestOutcome, IngestSummary, run_ingest};
    use crate::embedding::{DisabledEmbedder, Embedder, MissingKeyEmbedder};
    use crate::mail::MailSource;
    use crate::report::{MetricsRecord, RawReport, ReportGrammar};
    use crate::sink::{RecordSink, SinkError};
    use anyhow::{Result, anyhow};
    use std::collections::HashSet;

    struct FixedSource(Vec<RawReport>);

    impl MailSource for FixedSource {
        fn fetch(&self, limit: usize) -> Result<Vec<RawReport>> {
            Ok(self.0.iter().take(limit).cloned().collect())
        }
    }

    #[derive(Default)]
    struct MemorySink {
        dates: HashSet<String>,
        stored: Vec<MetricsRecord>,
        broken: bool,
    }

    impl RecordSink for MemorySink {
        fn insert(&mut self, record: &MetricsRecord) -> Result<(), SinkError> {
            if self.broken {
                return Err(SinkError::Storage(anyhow!("disk full")));
            }
            if !self.dates.insert(record.date.clone()) {
                return Err(SinkError::Duplicate {
                    date: record.date.clone(),
                });
            }
            self.stored.push(record.clone());
            Ok(())
        }
    }

    struct FailOnBreaks;

    impl Embedder for FailOnBreaks {
        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if text.contains("Breaks: 30 min") {
                return Err(anyhow!("rate limited"));
            }
            Ok(vec![1.0])
        }
    }

    fn report(day: u32, body: &str) -> RawReport {
        RawReport {
            subject: format!("Your Daily Report for Tuesday, January {day}"),
            sender_date: format!("Tue, {day:02} Jan 2024 23:00:00 +0000"),
            body: body.to_string(),
        }
    }

    #[test]
    fn duplicates_are_skipped_and_batch_continues() {
        let grammar = ReportGrammar::new().expect("grammar");
        let source = FixedSource(vec![
            report(9, "Focus\r\n50%\r\n1 hr\r\n"),
            report(9, "Focus\r\n50%\r\n1 hr\r\n"),
            report(16, "Focus\r\n50%\r\n2 hr\r\n"),
        ]);
        let mut sink = MemorySink::default();

        let summary =
            run_ingest(&grammar, &source, &DisabledEmbedder, &mut sink, 10).expect("ingest");

        assert_eq!(
            summary,
            IngestSummary {
                inserted: 2,
                skipped: 1,
                failed: 0
            }
        );
        assert_eq!(sink.stored.len(), 2);
    }

    #[test]
    fn one_failing_report_does_not_halt_the_batch() {
        let grammar = ReportGrammar::new().expect("grammar");
        let source = FixedSource(vec![
            report(9, "Breaks\r\n5%\r\n30 min\r\n"),
            report(16, "Focus\r\n50%\r\n2 hr\r\n"),
        ]);
        let mut sink = MemorySink::default();

        let summary = run_ingest(&grammar, &source, &FailOnBreaks, &mut sink, 10).expect("ingest");

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.inserted, 1);
        assert_eq!(sink.stored[0].date, "2024-01-16");
        assert_eq!(sink.stored[0].embedding, vec![1.0]);
    }

    #[test]
    fn missing_api_key_leaves_the_day_for_a_later_run() {
        let grammar = ReportGrammar::new().expect("grammar");
        let source = FixedSource(vec![report(9, "Focus\r\n50%\r\n1 hr\r\n")]);
        let mut sink = MemorySink::default();

        let first = run_ingest(&grammar, &source, &MissingKeyEmbedder, &mut sink, 10)
            .expect("first ingest");
        assert_eq!(first.failed, 1);
        assert!(sink.stored.is_empty());

        let second =
            run_ingest(&grammar, &source, &FailOnBreaks, &mut sink, 10).expect("second ingest");
        assert_eq!(second.inserted, 1);
        assert_eq!(second.skipped, 0);
        assert_eq!(sink.stored[0].date, "2024-01-09");
        assert_eq!(sink.stored[0].embedding, vec![1.0]);
    }

    #[test]
    fn storage_errors_are_failures_not_skips() {
        let grammar = ReportGrammar::new().expect("grammar");
        let source = FixedSource(vec![report(9, "Focus\r\n50%\r\n1 hr\r\n")]);
        let mut sink = MemorySink {
            broken: true,
            ..MemorySink::default()
        };

        let summary =
            run_ingest(&grammar, &source, &DisabledEmbedder, &mut sink, 10).expect("ingest");

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 0);
    }

    #[test]
    fn status_lines_name_the_outcome() {
        assert_eq!(
            IngestOutcome::Skipped {
                date: "2024-01-09".to_string()
            }
            .status_line(),
            "[SKIP] 2024-01-09 already recorded"
        );
    }
}
