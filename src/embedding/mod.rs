use crate::config::{Config, MIN_EMBEDDING_TIMEOUT_SECONDS};
use anyhow::{Context, Result, anyhow, bail};
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

pub trait Embedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    base_url: String,
    model: String,
    api_key: String,
    timeout_seconds: u64,
}

impl OpenAiEmbedder {
    pub fn new(config: &Config, api_key: String) -> Self {
        Self {
            base_url: config.embedding_api_base_url.clone(),
            model: config.embedding_model.clone(),
            api_key,
            timeout_seconds: config
                .embedding_timeout_seconds
                .max(MIN_EMBEDDING_TIMEOUT_SECONDS),
        }
    }
}

impl Embedder for OpenAiEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let client = self.clone();
        let text = text.to_string();

        // reqwest's blocking client must not run on a tokio worker thread.
        std::thread::spawn(move || client.embed_blocking(&text))
            .join()
            .map_err(|_| anyhow!("embedding worker thread panicked"))?
    }
}

impl OpenAiEmbedder {
    fn embed_blocking(&self, text: &str) -> Result<Vec<f32>> {
        if self.api_key.trim().is_empty() {
            bail!("Embedding API key is empty");
        }

        let endpoint = format!("{}/embeddings", self.base_url.trim_end_matches('/'));

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))
                .context("Failed to build Authorization header")?,
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(self.timeout_seconds))
            .default_headers(headers)
            .build()
            .context("Failed to create embedding HTTP client")?;

        let response = client
            .post(endpoint)
            .json(&json!({ "model": self.model, "input": text }))
            .send()
            .context("Embedding API request failed")?;

        let status = response.status();
        let body = response
            .text()
            .context("Failed to read embedding response body")?;

        if !status.is_success() {
            bail!("Embedding API error {}: {}", status, body);
        }

        parse_embedding_response(&body)
    }
}

/// Stands in when embedding is disabled; records are stored without vectors.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledEmbedder;

impl Embedder for DisabledEmbedder {
    fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Clone, Copy, Error)]
#[error(
    "Embedding is enabled but no API key is configured. Set `timelog config set embedding.api_key <KEY>` or `TIMELOG_EMBEDDING_API_KEY`."
)]
pub struct MissingApiKey;

#[derive(Debug, Clone, Copy, Default)]
pub struct MissingKeyEmbedder;

impl Embedder for MissingKeyEmbedder {
    fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(MissingApiKey.into())
    }
}

pub fn from_config(config: &Config) -> Box<dyn Embedder> {
    if !config.embedding_enabled {
        return Box::new(DisabledEmbedder);
    }

    match resolve_api_key(config) {
        Some(api_key) => Box::new(OpenAiEmbedder::new(config, api_key)),
        None => {
            warn!("embedding is enabled but no API key is configured. reports will fail until one is set");
            Box::new(MissingKeyEmbedder)
        }
    }
}

pub fn test_connection(config: &Config) -> Result<usize> {
    let api_key = resolve_api_key(config).ok_or(MissingApiKey)?;

    let vector = OpenAiEmbedder::new(config, api_key).embed("Health check for timelog.")?;
    Ok(vector.len())
}

pub fn has_api_key(config: &Config) -> bool {
    resolve_api_key(config).is_some()
}

fn resolve_api_key(config: &Config) -> Option<String> {
    ["TIMELOG_EMBEDDING_API_KEY", "OPENAI_API_KEY"]
        .into_iter()
        .find_map(|name| {
            std::env::var(name)
                .ok()
                .filter(|value| !value.trim().is_empty())
        })
        .or_else(|| {
            config
                .embedding_api_key
                .clone()
                .filter(|value| !value.trim().is_empty())
        })
}

fn parse_embedding_response(body: &str) -> Result<Vec<f32>> {
    let parsed: EmbeddingResponse = serde_json::from_str(body)
        .with_context(|| format!("Failed to parse embedding response: {body}"))?;

    parsed
        .data
        .into_iter()
        .next()
        .map(|item| item.embedding)
        .filter(|embedding| !embedding.is_empty())
        .ok_or_else(|| anyhow!("Embedding response did not include data[0].embedding"))
}
