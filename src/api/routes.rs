use crate::config::Config;
use crate::db::Database;
use crate::embedding;
use crate::report::metrics::FieldMetrics;
use crate::report::{CategoryEntry, MetricsRecord};
use crate::scheduler;
use crate::search::{self, SearchError, SearchHit};
use anyhow::Context;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;

#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<Config>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/status", get(status))
        .route("/api/v1/records", get(record_list))
        .route("/api/v1/records/latest", get(record_latest))
        .route("/api/v1/records/:date", get(record_by_date))
        .route("/api/v1/search", get(search_records))
        .route(
            "/api/v1/settings/ingest-schedule",
            get(ingest_schedule_get).put(ingest_schedule_put),
        )
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct RecordsQuery {
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    q: Option<String>,
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct StatusPayload {
    record_count: usize,
    latest_record_date: Option<String>,
    ingest_time: String,
    embedding_enabled: bool,
    api_port: u16,
}

#[derive(Debug, Serialize)]
struct RecordsPayload {
    records: Vec<RecordView>,
}

#[derive(Debug, Serialize)]
struct SearchPayload {
    query: String,
    hits: Vec<SearchHit>,
}

#[derive(Debug, Serialize)]
struct IngestSchedulePayload {
    ingest_time: String,
    next_run_at: String,
}

impl IngestSchedulePayload {
    fn for_config(config: &Config) -> ApiResult<Self> {
        let at = config
            .parse_ingest_time()
            .map_err(|error| ApiError::BadRequest(error.to_string()))?;
        let next_run_at = scheduler::next_run_after(&Local::now(), at)
            .context("No local time matches ingest_time")?;

        Ok(Self {
            ingest_time: config.ingest_time.clone(),
            next_run_at: next_run_at.to_rfc3339(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct IngestScheduleUpdatePayload {
    ingest_time: String,
}

#[derive(Debug, Serialize)]
struct RecordView {
    date: String,
    day: String,
    #[serde(flatten)]
    metrics: FieldMetrics,
    categories: Vec<CategoryEntry>,
    summary: String,
    embedding_dimensions: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    raw_text: Option<String>,
}

impl RecordView {
    fn listing(record: MetricsRecord) -> Self {
        Self {
            embedding_dimensions: record.embedding.len(),
            date: record.date,
            day: record.day,
            metrics: record.metrics,
            categories: record.categories,
            summary: record.summary,
            raw_text: None,
        }
    }

    fn detail(record: MetricsRecord) -> Self {
        let raw_text = record.raw_text.clone();
        Self {
            raw_text: Some(raw_text),
            ..Self::listing(record)
        }
    }
}

async fn status(State(state): State<ApiState>) -> ApiResult<Json<StatusPayload>> {
    let database = Database::open(&state.config.db_path)?;

    Ok(Json(StatusPayload {
        record_count: database.record_count()?,
        latest_record_date: database.latest_record()?.map(|record| record.date),
        ingest_time: state.config.ingest_time.clone(),
        embedding_enabled: state.config.embedding_enabled,
        api_port: state.config.api_port,
    }))
}

async fn record_list(
    State(state): State<ApiState>,
    Query(query): Query<RecordsQuery>,
) -> ApiResult<Json<RecordsPayload>> {
    let limit = query.limit.unwrap_or(7).clamp(1, 365);
    let database = Database::open(&state.config.db_path)?;
    let records = database
        .list_records(limit)?
        .into_iter()
        .map(RecordView::listing)
        .collect();

    Ok(Json(RecordsPayload { records }))
}

async fn record_latest(State(state): State<ApiState>) -> ApiResult<Json<RecordView>> {
    let database = Database::open(&state.config.db_path)?;

    database
        .latest_record()?
        .map(|record| Json(RecordView::detail(record)))
        .ok_or_else(|| ApiError::NotFound("No records have been ingested yet".to_string()))
}

async fn record_by_date(
    State(state): State<ApiState>,
    Path(date): Path<String>,
) -> ApiResult<Json<RecordView>> {
    let target_date = parse_date(&date)?;
    let key = target_date.format("%Y-%m-%d").to_string();

    let database = Database::open(&state.config.db_path)?;
    database
        .record_for_date(&key)?
        .map(|record| Json(RecordView::detail(record)))
        .ok_or_else(|| ApiError::NotFound(format!("No record found for date: {key}")))
}

async fn search_records(
    State(state): State<ApiState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<SearchPayload>> {
    let text = query
        .q
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Query parameter `q` is required".to_string()))?;
    let limit = query.limit.unwrap_or(5).clamp(1, 50);

    let config = Arc::clone(&state.config);
    let query_text = text.clone();
    let hits = tokio::task::spawn_blocking(move || -> Result<Vec<SearchHit>, SearchError> {
        let database = Database::open(&config.db_path)?;
        let embedder = embedding::from_config(&config);
        search::search(&database, embedder.as_ref(), &query_text, limit)
    })
    .await
    .context("Search task failed")??;

    Ok(Json(SearchPayload { query: text, hits }))
}

async fn ingest_schedule_get(
    State(state): State<ApiState>,
) -> ApiResult<Json<IngestSchedulePayload>> {
    let config = Config::load().unwrap_or_else(|_| state.config.as_ref().clone());
    IngestSchedulePayload::for_config(&config).map(Json)
}

async fn ingest_schedule_put(
    State(state): State<ApiState>,
    Json(payload): Json<IngestScheduleUpdatePayload>,
) -> ApiResult<Json<Value>> {
    let mut config = Config::load().unwrap_or_else(|_| state.config.as_ref().clone());

    config
        .set_value("ingest_time", payload.ingest_time.trim())
        .map_err(|error| ApiError::BadRequest(error.to_string()))?;
    config.save()?;

    let schedule = IngestSchedulePayload::for_config(&config)?;

    Ok(Json(json!({
        "saved": true,
        "ingest_time": schedule.ingest_time,
        "next_run_at": schedule.next_run_at
    })))
}

fn parse_date(input: &str) -> ApiResult<NaiveDate> {
    NaiveDate::parse_from_str(input, "%Y-%m-%d").map_err(|_| {
        ApiError::BadRequest(format!("Invalid date format: {input}. Example: 2024-01-09"))
    })
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value)
    }
}

impl From<SearchError> for ApiError {
    fn from(value: SearchError) -> Self {
        if value.is_client_error() {
            Self::BadRequest(value.to_string())
        } else {
            Self::Internal(value.into())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Internal(error) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": format!("{error:#}") })),
            )
                .into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ApiError, ApiState, IngestSchedulePayload, RecordsQuery, SearchQuery, record_by_date,
        record_latest, record_list, search_records,
    };
    use crate::config::Config;
    use crate::db::Database;
    use crate::report::MetricsRecord;
    use crate::report::metrics::FieldMetrics;
    use axum::extract::{Path, Query, State};
    use chrono::DateTime;
    use std::sync::Arc;

    fn state_with_record(dir: &std::path::Path) -> ApiState {
        let config = Config {
            db_path: dir.join("timelog.db"),
            ..Config::default()
        };
        let database = Database::open(&config.db_path).expect("db");
        database
            .insert_record(&MetricsRecord {
                date: "2024-01-09".to_string(),
                day: "Tuesday".to_string(),
                metrics: FieldMetrics {
                    focus: 2.0,
                    ..FieldMetrics::default()
                },
                categories: Vec::new(),
                summary: "Focus: 2 hr".to_string(),
                raw_text: "Focus\r\n2 hr".to_string(),
                embedding: Vec::new(),
            })
            .expect("insert");

        ApiState {
            config: Arc::new(config),
        }
    }

    #[tokio::test]
    async fn serves_records_by_date_and_latest() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = state_with_record(dir.path());

        let found = record_by_date(State(state.clone()), Path("2024-01-09".to_string()))
            .await
            .expect("record");
        assert_eq!(found.0.day, "Tuesday");
        assert_eq!(found.0.raw_text.as_deref(), Some("Focus\r\n2 hr"));

        let latest = record_latest(State(state.clone())).await.expect("latest");
        assert_eq!(latest.0.date, "2024-01-09");

        let listed = record_list(State(state), Query(RecordsQuery { limit: None }))
            .await
            .expect("list");
        assert_eq!(listed.0.records.len(), 1);
        assert!(listed.0.records[0].raw_text.is_none());
    }

    #[tokio::test]
    async fn missing_and_malformed_dates_are_client_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = state_with_record(dir.path());

        let missing = record_by_date(State(state.clone()), Path("2024-01-10".to_string())).await;
        assert!(matches!(missing, Err(ApiError::NotFound(_))));

        let malformed = record_by_date(State(state), Path("January 9".to_string())).await;
        assert!(matches!(malformed, Err(ApiError::BadRequest(_))));
    }

    #[tokio::test]
    async fn search_requires_a_query() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = state_with_record(dir.path());

        let result = search_records(
            State(state),
            Query(SearchQuery {
                q: Some("  ".to_string()),
                limit: None,
            }),
        )
        .await;
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }

    #[tokio::test]
    async fn search_with_embedding_disabled_is_a_bad_request() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config {
            db_path: dir.path().join("timelog.db"),
            embedding_enabled: false,
            ..Config::default()
        };
        let state = ApiState {
            config: Arc::new(config),
        };

        let result = search_records(
            State(state),
            Query(SearchQuery {
                q: Some("deep work".to_string()),
                limit: None,
            }),
        )
        .await;
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn schedule_payload_reports_next_run() {
        let config = Config {
            ingest_time: "07:45".to_string(),
            ..Config::default()
        };

        let payload = IngestSchedulePayload::for_config(&config).expect("payload");
        let next = DateTime::parse_from_rfc3339(&payload.next_run_at).expect("rfc3339");
        assert_eq!(payload.ingest_time, "07:45");
        assert_eq!(next.format("%H:%M").to_string(), "07:45");

        let invalid = Config {
            ingest_time: "7am".to_string(),
            ..Config::default()
        };
        assert!(matches!(
            IngestSchedulePayload::for_config(&invalid),
            Err(ApiError::BadRequest(_))
        ));
    }
}
