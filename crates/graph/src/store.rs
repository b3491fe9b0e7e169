use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::results::SparqlResults;
use crate::retry::RetryPolicy;

pub const LABELS_QUERY: &str = "SELECT DISTINCT ?label WHERE { ?s <http://www.w3.org/2000/01/rdf-schema#label> ?label }";

/// Anything that answers SPARQL SELECT queries
#[async_trait]
pub trait SparqlEndpoint: Send + Sync {
    async fn select(&self, sparql: &str) -> Result<SparqlResults>;

    /// Every distinct `rdfs:label` in the dataset
    async fn labels(&self) -> Result<Vec<String>> {
        let results = self.select(LABELS_QUERY).await?;
        Ok(results.column("label"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub fuseki_url: String,
    pub dataset: String,
    pub request_timeout_secs: u64,
    pub max_retries: usize,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            fuseki_url: "http://localhost:3030".to_string(),
            dataset: "kg".to_string(),
            request_timeout_secs: 30,
            max_retries: 1,
            initial_backoff_ms: 500,
            max_backoff_ms: 5000,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store returned {status}: {body}")]
    Status { status: StatusCode, body: String },
}

impl StoreError {
    /// Timeouts, connection failures and 5xx responses; never 4xx
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Http(e) => e.is_timeout() || e.is_connect(),
            StoreError::Status { status, .. } => status.is_server_error(),
        }
    }
}

/// Result of a bulk upload; failures are reported, not raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub success: bool,
    pub status: u16,
    pub body: String,
}

/// Client for a Fuseki-compatible triple store
#[derive(Clone)]
pub struct FusekiStore {
    query_url: String,
    data_url: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl FusekiStore {
    pub fn new(config: &StoreConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        let base = format!("{}/{}", config.fuseki_url.trim_end_matches('/'), config.dataset);

        Self {
            query_url: format!("{}/sparql", base),
            data_url: format!("{}/data", base),
            client,
            retry: RetryPolicy::new(config.max_retries, config.initial_backoff_ms, config.max_backoff_ms),
        }
    }

    pub fn query_url(&self) -> &str {
        &self.query_url
    }

    pub fn data_url(&self) -> &str {
        &self.data_url
    }

    /// POST a Turtle document to the dataset's default graph. Not retried.
    pub async fn upload(&self, turtle: &str) -> Result<UploadOutcome> {
        let response = self.client
            .post(&self.data_url)
            .header(reqwest::header::CONTENT_TYPE, "text/turtle")
            .body(turtle.to_string())
            .send()
            .await
            .context(format!("Failed to send upload to {}", self.data_url))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        let outcome = UploadOutcome {
            success: status.is_success(),
            status: status.as_u16(),
            body,
        };

        if outcome.success {
            info!(url = %self.data_url, bytes = turtle.len(), "Uploaded graph");
        } else {
            warn!(url = %self.data_url, status = outcome.status, "Graph upload rejected");
        }

        Ok(outcome)
    }

    async fn send_select(&self, sparql: &str) -> Result<SparqlResults, StoreError> {
        let response = self.client
            .post(&self.query_url)
            .header(reqwest::header::ACCEPT, "application/sparql-results+json")
            .form(&[("query", sparql)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status { status, body });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl SparqlEndpoint for FusekiStore {
    /// Run a SELECT query, retrying transient failures
    async fn select(&self, sparql: &str) -> Result<SparqlResults> {
        let results = self.retry
            .retry_if("sparql_select", || self.send_select(sparql), StoreError::is_transient)
            .await
            .context("SPARQL query failed")?;

        debug!(rows = results.rows().len(), "SPARQL query returned");
        Ok(results)
    }
}
