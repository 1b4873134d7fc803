use crate::db::Database;
use crate::embedding::{Embedder, MissingApiKey};
use crate::report::MetricsRecord;
use serde::Serialize;
use std::cmp::Ordering;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Search query must not be empty")]
    EmptyQuery,

    #[error("{reason}")]
    EmbeddingUnavailable { reason: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SearchError {
    /// Caused by the request or the configuration rather than a runtime fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::EmptyQuery | Self::EmbeddingUnavailable { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub date: String,
    pub day: String,
    pub score: f32,
    pub summary: String,
}

pub fn search(
    database: &Database,
    embedder: &dyn Embedder,
    query: &str,
    limit: usize,
) -> Result<Vec<SearchHit>, SearchError> {
    let query_vector = embed_query(embedder, query)?;
    Ok(rank(&query_vector, database.records_with_embeddings()?, limit))
}

fn embed_query(embedder: &dyn Embedder, query: &str) -> Result<Vec<f32>, SearchError> {
    if query.trim().is_empty() {
        return Err(SearchError::EmptyQuery);
    }

    let vector = embedder.embed(query.trim()).map_err(|error| {
        if error.is::<MissingApiKey>() {
            SearchError::EmbeddingUnavailable {
                reason: error.to_string(),
            }
        } else {
            SearchError::Other(error)
        }
    })?;

    if vector.is_empty() {
        return Err(SearchError::EmbeddingUnavailable {
            reason: "Embedding is disabled. Enable it with `timelog config set embedding.enabled true`"
                .to_string(),
        });
    }

    Ok(vector)
}

pub fn rank(query: &[f32], records: Vec<MetricsRecord>, limit: usize) -> Vec<SearchHit> {
    let mut hits = records
        .into_iter()
        .filter_map(|record| {
            cosine_similarity(query, &record.embedding).map(|score| SearchHit {
                date: record.date,
                day: record.day,
                score,
                summary: record.summary,
            })
        })
        .collect::<Vec<_>>();

    hits.sort_by(|left, right| {
        right
            .score
            .partial_cmp(&left.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| right.date.cmp(&left.date))
    });
    hits.into_iter().take(limit).collect()
}

pub fn cosine_similarity(left: &[f32], right: &[f32]) -> Option<f32> {
    if left.is_empty() || left.len() != right.len() {
        return None;
    }

    let dot = left.iter().zip(right).map(|(a, b)| a * b).sum::<f32>();
    let left_norm = left.iter().map(|value| value * value).sum::<f32>().sqrt();
    let right_norm = right.iter().map(|value| value * value).sum::<f32>().sqrt();

    (left_norm > 0.0 && right_norm > 0.0).then(|| dot / (left_norm * right_norm))
}
