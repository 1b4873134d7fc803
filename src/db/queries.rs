pub const CREATE_TIMELOG: &str = r#"
CREATE TABLE IF NOT EXISTS timelog (
  id                 INTEGER PRIMARY KEY AUTOINCREMENT,
  date               TEXT NOT NULL UNIQUE,
  day                TEXT NOT NULL,
  focus              REAL NOT NULL DEFAULT 0,
  meetings           REAL NOT NULL DEFAULT 0,
  breaks             REAL NOT NULL DEFAULT 0,
  other              REAL NOT NULL DEFAULT 0,
  work_categories    REAL NOT NULL DEFAULT 0,
  nonwork_categories REAL NOT NULL DEFAULT 0,
  work_hours         REAL NOT NULL DEFAULT 0,
  categories         TEXT NOT NULL DEFAULT '[]',
  summary            TEXT NOT NULL,
  raw_text           TEXT NOT NULL,
  embedding          TEXT NOT NULL DEFAULT '[]',
  ingested_at        INTEGER NOT NULL
);
"#;

pub const INDEX_TIMELOG_DATE: &str =
    "CREATE INDEX IF NOT EXISTS idx_timelog_date ON timelog(date);";

pub const INSERT_RECORD: &str = "INSERT INTO timelog (
  date, day, focus, meetings, breaks, other, work_categories, nonwork_categories,
  work_hours, categories, summary, raw_text, embedding, ingested_at
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)";

pub const SELECT_RECORD_COLUMNS: &str = "SELECT date, day, focus, meetings, breaks, other,
  work_categories, nonwork_categories, work_hours, categories, summary, raw_text, embedding
  FROM timelog";

pub fn schema_statements() -> Vec<&'static str> {
    vec![CREATE_TIMELOG, INDEX_TIMELOG_DATE]
}
