//! HTTP connectors for the supported providers

use super::SourceConnector;
use crate::providers::{provider_name, semantic_scholar, RawResponse};
use async_trait::async_trait;
use backoff::{future::retry_notify, ExponentialBackoff, ExponentialBackoffBuilder};
use citenet_common::config::ProviderConfig;
use citenet_common::errors::{AppError, Result};
use citenet_common::metrics::ProviderMetrics;
use citenet_common::{ArticleId, IdFormat, ProviderKind};
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Batched HTTP access to one provider
pub struct HttpConnector {
    client: reqwest::Client,
    kind: ProviderKind,
    base_url: String,
    api_key: Option<String>,
    mailto: Option<String>,
    max_retries: u32,
    max_batch_size: usize,
}

fn default_base_url(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::OpenAlex => "https://api.openalex.org",
        ProviderKind::SemanticScholar => "https://api.semanticscholar.org/graph/v1",
        ProviderKind::Crossref => "https://api.crossref.org",
        ProviderKind::OpenCitations => "https://opencitations.net/index/coci/api/v1",
    }
}

/// Failure of one attempt, before retry classification
enum Attempt {
    Transient(AppError),
    Permanent(AppError),
}

impl HttpConnector {
    /// Create a new connector
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("citenet/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            kind: config.kind,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| default_base_url(config.kind).to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key: config.api_key.clone(),
            mailto: config.mailto.clone(),
            max_retries: config.max_retries,
            max_batch_size: config.max_batch_size.max(1),
        })
    }

    fn name(&self) -> &'static str {
        provider_name(self.kind)
    }

    fn policy(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(200))
            .with_max_interval(Duration::from_secs(5))
            .with_max_elapsed_time(Some(Duration::from_secs(60)))
            .build()
    }

    /// Human-readable query, used in error messages
    fn describe(ids: &[ArticleId]) -> String {
        let shown: Vec<&str> = ids.iter().take(3).map(ArticleId::as_str).collect();
        if ids.len() > shown.len() {
            format!("{} (+{} more)", shown.join(", "), ids.len() - shown.len())
        } else {
            shown.join(", ")
        }
    }

    fn build_request(&self, ids: &[ArticleId], format: IdFormat) -> Result<reqwest::RequestBuilder> {
        let joined = |sep: &str, f: &dyn Fn(&ArticleId) -> String| {
            ids.iter().map(f).collect::<Vec<_>>().join(sep)
        };

        let request = match self.kind {
            ProviderKind::OpenAlex => {
                let filter = match format {
                    IdFormat::Doi => format!("doi:{}", joined("|", &|id| id.as_str().to_lowercase())),
                    IdFormat::Native => format!("openalex:{}", joined("|", &|id| id.to_string())),
                };
                let mut query = vec![
                    ("filter".to_string(), filter),
                    ("per-page".to_string(), ids.len().max(1).to_string()),
                ];
                if let Some(mailto) = &self.mailto {
                    query.push(("mailto".to_string(), mailto.clone()));
                }
                self.client.get(format!("{}/works", self.base_url)).query(&query)
            }
            ProviderKind::SemanticScholar => {
                let body_ids: Vec<String> = ids
                    .iter()
                    .map(|id| match id.format() {
                        IdFormat::Doi => format!("DOI:{}", id),
                        IdFormat::Native => id.as_str().to_lowercase(),
                    })
                    .collect();
                let mut request = self
                    .client
                    .post(format!("{}/paper/batch", self.base_url))
                    .query(&[("fields", semantic_scholar::FIELDS)])
                    .json(&json!({ "ids": body_ids }));
                if let Some(key) = &self.api_key {
                    request = request.header("x-api-key", key);
                }
                request
            }
            ProviderKind::Crossref => {
                if format != IdFormat::Doi {
                    return Err(AppError::Validation {
                        message: "Crossref can only be queried by DOI".to_string(),
                        field: Some("ids".to_string()),
                    });
                }
                let filter = joined(",", &|id| format!("doi:{}", id.as_str().to_lowercase()));
                let mut query = vec![
                    ("filter".to_string(), filter),
                    ("rows".to_string(), ids.len().max(1).to_string()),
                ];
                if let Some(mailto) = &self.mailto {
                    query.push(("mailto".to_string(), mailto.clone()));
                }
                self.client.get(format!("{}/works", self.base_url)).query(&query)
            }
            ProviderKind::OpenCitations => {
                if format != IdFormat::Doi {
                    return Err(AppError::Validation {
                        message: "OpenCitations can only be queried by DOI".to_string(),
                        field: Some("ids".to_string()),
                    });
                }
                let path = joined("__", &|id| id.as_str().to_lowercase());
                let mut request = self.client.get(format!("{}/metadata/{}", self.base_url, path));
                if let Some(key) = &self.api_key {
                    request = request.header("authorization", key);
                }
                request
            }
        };
        Ok(request)
    }

    async fn attempt(&self, ids: &[ArticleId], format: IdFormat) -> std::result::Result<Value, Attempt> {
        let query = Self::describe(ids);
        let request = self.build_request(ids, format).map_err(Attempt::Permanent)?;

        let response = request.send().await.map_err(|e| {
            let err = AppError::from(e);
            if err.is_retryable() {
                Attempt::Transient(err)
            } else {
                Attempt::Permanent(err)
            }
        })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(Attempt::Transient(AppError::provider(
                self.name(),
                format!("HTTP {} for query '{}'", status.as_u16(), query),
            )));
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(Attempt::Permanent(AppError::provider(
                self.name(),
                format!("authentication failed (HTTP {}) for query '{}'", status.as_u16(), query),
            )));
        }
        if status == StatusCode::NOT_FOUND && self.kind == ProviderKind::OpenCitations {
            // OpenCitations answers unknown DOIs with 404 instead of an empty list
            return Ok(Value::Array(Vec::new()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Attempt::Permanent(AppError::provider(
                self.name(),
                format!("HTTP {} for query '{}': {}", status.as_u16(), query, body.trim()),
            )));
        }

        response.json::<Value>().await.map_err(|e| {
            Attempt::Permanent(AppError::provider(
                self.name(),
                format!("unreadable response for query '{}': {}", query, e),
            ))
        })
    }

    async fn fetch_chunk(&self, ids: &[ArticleId], format: IdFormat) -> Result<RawResponse> {
        let attempts = AtomicU32::new(0);
        let max_retries = self.max_retries;

        let operation = || {
            let attempts = &attempts;
            async move {
                match self.attempt(ids, format).await {
                    Ok(body) => Ok(body),
                    Err(Attempt::Transient(e)) if attempts.fetch_add(1, Ordering::SeqCst) < max_retries => {
                        Err(backoff::Error::transient(e))
                    }
                    Err(Attempt::Transient(e)) | Err(Attempt::Permanent(e)) => {
                        Err(backoff::Error::permanent(e))
                    }
                }
            }
        };

        let metrics = ProviderMetrics::start(self.name());
        let result = retry_notify(self.policy(), operation, |e: AppError, delay: Duration| {
            tracing::warn!(
                provider = self.name(),
                error = %e,
                retry_in_ms = delay.as_millis() as u64,
                "Provider request failed, retrying"
            );
        })
        .await;
        metrics.finish(result.is_ok());

        let body = result.map_err(|e| match e {
            AppError::HttpClient(inner) => AppError::provider(
                self.name(),
                format!("{} for query '{}'", inner, Self::describe(ids)),
            ),
            other => other,
        })?;

        RawResponse::from_json(self.kind, body, ids)
    }
}

#[async_trait]
impl SourceConnector for HttpConnector {
    fn provider(&self) -> ProviderKind {
        self.kind
    }

    async fn fetch_by_ids(&self, ids: &[ArticleId], format: IdFormat) -> Result<RawResponse> {
        tracing::debug!(provider = self.name(), count = ids.len(), ?format, "Fetching batch");

        let mut merged: Option<RawResponse> = None;
        for chunk in ids.chunks(self.max_batch_size) {
            let response = self.fetch_chunk(chunk, format).await?;
            merged = Some(match merged {
                Some(acc) => acc.merge(response)?,
                None => response,
            });
        }

        match merged {
            Some(response) => Ok(response),
            None => RawResponse::from_json(self.kind, empty_body(self.kind), &[]),
        }
    }
}

/// Body equivalent to "no records", per provider
fn empty_body(kind: ProviderKind) -> Value {
    match kind {
        ProviderKind::OpenAlex => json!({ "results": [] }),
        ProviderKind::Crossref => json!({ "status": "ok", "message": { "items": [] } }),
        ProviderKind::SemanticScholar | ProviderKind::OpenCitations => json!([]),
    }
}
