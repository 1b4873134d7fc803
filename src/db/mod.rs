pub mod queries;

use crate::report::metrics::FieldMetrics;
use crate::report::{CategoryEntry, MetricsRecord};
use crate::sink::{RecordSink, SinkError};
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params};
use std::fs;
use std::path::Path;

pub struct Database {
    conn: Connection,
}

struct StoredRow {
    date: String,
    day: String,
    metrics: FieldMetrics,
    categories: String,
    summary: String,
    raw_text: String,
    embedding: String,
}

impl StoredRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            date: row.get(0)?,
            day: row.get(1)?,
            metrics: FieldMetrics {
                focus: row.get(2)?,
                meetings: row.get(3)?,
                breaks: row.get(4)?,
                other: row.get(5)?,
                work_categories: row.get(6)?,
                nonwork_categories: row.get(7)?,
                work_hours: row.get(8)?,
            },
            categories: row.get(9)?,
            summary: row.get(10)?,
            raw_text: row.get(11)?,
            embedding: row.get(12)?,
        })
    }

    fn into_record(self) -> Result<MetricsRecord> {
        let categories: Vec<CategoryEntry> = serde_json::from_str(&self.categories)
            .with_context(|| format!("Failed to decode categories for {}", self.date))?;
        let embedding: Vec<f32> = serde_json::from_str(&self.embedding)
            .with_context(|| format!("Failed to decode embedding for {}", self.date))?;

        Ok(MetricsRecord {
            date: self.date,
            day: self.day,
            metrics: self.metrics,
            categories,
            summary: self.summary,
            raw_text: self.raw_text,
            embedding,
        })
    }
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create DB directory: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite DB: {}", path.display()))?;

        let database = Self { conn };
        database.init_schema()?;

        Ok(database)
    }

    pub fn init_schema(&self) -> Result<()> {
        queries::schema_statements()
            .iter()
            .try_for_each(|statement| {
                self.conn
                    .execute(statement, [])
                    .context("Failed to initialize schema")
                    .map(|_| ())
            })
    }

    pub fn insert_record(&self, record: &MetricsRecord) -> Result<(), SinkError> {
        let categories =
            serde_json::to_string(&record.categories).context("Failed to encode categories")?;
        let embedding =
            serde_json::to_string(&record.embedding).context("Failed to encode embedding")?;
        let metrics = &record.metrics;

        let inserted = self.conn.execute(
            queries::INSERT_RECORD,
            params![
                record.date,
                record.day,
                metrics.focus,
                metrics.meetings,
                metrics.breaks,
                metrics.other,
                metrics.work_categories,
                metrics.nonwork_categories,
                metrics.work_hours,
                categories,
                record.summary,
                record.raw_text,
                embedding,
                Utc::now().timestamp(),
            ],
        );

        match inserted {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(error, _))
                if error.code == ErrorCode::ConstraintViolation
                    && error.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                Err(SinkError::Duplicate {
                    date: record.date.clone(),
                })
            }
            Err(error) => Err(SinkError::Storage(
                anyhow::Error::new(error).context("Failed to insert timelog record"),
            )),
        }
    }

    pub fn record_for_date(&self, date: &str) -> Result<Option<MetricsRecord>> {
        let statement = format!("{} WHERE date = ?1", queries::SELECT_RECORD_COLUMNS);
        self.conn
            .query_row(&statement, params![date], StoredRow::from_row)
            .optional()
            .context("Failed to query timelog record")?
            .map(StoredRow::into_record)
            .transpose()
    }

    pub fn latest_record(&self) -> Result<Option<MetricsRecord>> {
        Ok(self.list_records(1)?.into_iter().next())
    }

    pub fn list_records(&self, limit: usize) -> Result<Vec<MetricsRecord>> {
        let statement = format!(
            "{} ORDER BY date DESC LIMIT ?1",
            queries::SELECT_RECORD_COLUMNS
        );
        let mut statement = self.conn.prepare(&statement)?;

        statement
            .query_map(params![limit as i64], StoredRow::from_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list timelog records")?
            .into_iter()
            .map(StoredRow::into_record)
            .collect()
    }

    pub fn records_with_embeddings(&self) -> Result<Vec<MetricsRecord>> {
        let statement = format!(
            "{} WHERE embedding != '[]' ORDER BY date DESC",
            queries::SELECT_RECORD_COLUMNS
        );
        let mut statement = self.conn.prepare(&statement)?;

        statement
            .query_map([], StoredRow::from_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to load embedded records")?
            .into_iter()
            .map(StoredRow::into_record)
            .collect()
    }

    pub fn record_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM timelog", [], |row| row.get(0))
            .context("Failed to count timelog records")?;

        Ok(count.max(0) as usize)
    }
}

impl RecordSink for Database {
    fn insert(&mut self, record: &MetricsRecord) -> Result<(), SinkError> {
        self.insert_record(record)
    }
}
