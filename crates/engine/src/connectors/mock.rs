//! In-memory connector for tests and offline demos

use super::SourceConnector;
use crate::providers::{capabilities, provider_name, RawResponse};
use async_trait::async_trait;
use citenet_common::errors::{AppError, Result};
use citenet_common::{Article, ArticleId, IdFormat, ProviderKind};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

/// Mock connector serving provider-shaped records from memory
pub struct MockConnector {
    kind: ProviderKind,
    records: HashMap<ArticleId, Value>,
    failing: HashSet<ArticleId>,
    delay: Option<Duration>,
    calls: Mutex<Vec<Vec<ArticleId>>>,
}

impl MockConnector {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            records: HashMap::new(),
            failing: HashSet::new(),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Serve these articles, encoded the way `kind` would send them
    pub fn with_articles(kind: ProviderKind, articles: &[Article]) -> Self {
        let mut mock = Self::new(kind);
        for article in articles {
            mock = mock.with_article(article);
        }
        mock
    }

    pub fn with_article(mut self, article: &Article) -> Self {
        let record = encode_record(self.kind, article);
        if let Some(doi) = &article.doi {
            self.records.insert(ArticleId::new(doi), record.clone());
        }
        self.records.insert(article.id.clone(), record);
        self
    }

    /// Serve a hand-written raw record under `id`
    pub fn with_raw_record(mut self, id: &str, record: Value) -> Self {
        self.records.insert(ArticleId::new(id), record);
        self
    }

    /// Fail every batch that contains `id`
    pub fn failing_on(mut self, id: &str) -> Self {
        self.failing.insert(ArticleId::new(id));
        self
    }

    /// Delay every response
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Batches requested so far
    pub fn calls(&self) -> Vec<Vec<ArticleId>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SourceConnector for MockConnector {
    fn provider(&self) -> ProviderKind {
        self.kind
    }

    async fn fetch_by_ids(&self, ids: &[ArticleId], format: IdFormat) -> Result<RawResponse> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(ids.to_vec());
        }
        if format == IdFormat::Native && !capabilities(self.kind).native_ids {
            return Err(AppError::Validation {
                message: format!("{} can only be queried by DOI", provider_name(self.kind)),
                field: Some("ids".to_string()),
            });
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(id) = ids.iter().find(|id| self.failing.contains(*id)) {
            return Err(AppError::provider(
                provider_name(self.kind),
                format!("HTTP 429 for query '{}'", id),
            ));
        }

        let found = ids.iter().map(|id| self.records.get(id).cloned());
        let body = match self.kind {
            ProviderKind::OpenAlex => json!({ "results": found.flatten().collect::<Vec<_>>() }),
            ProviderKind::SemanticScholar => {
                Value::Array(found.map(|r| r.unwrap_or(Value::Null)).collect())
            }
            ProviderKind::Crossref => json!({
                "status": "ok",
                "message": { "items": found.flatten().collect::<Vec<_>>() }
            }),
            ProviderKind::OpenCitations => Value::Array(found.flatten().collect()),
        };
        RawResponse::from_json(self.kind, body, ids)
    }
}

/// Encode a canonical article as `kind` would deliver it
pub fn encode_record(kind: ProviderKind, article: &Article) -> Value {
    let year = article.year;
    let doi = article.doi.clone().or_else(|| article.id.is_doi().then(|| article.id.to_string()));

    match kind {
        ProviderKind::OpenAlex => json!({
            "id": format!("https://openalex.org/{}", article.id),
            "doi": doi.map(|d| format!("https://doi.org/{}", d.to_lowercase())),
            "title": article.title,
            "publication_year": year,
            "primary_location": { "source": { "display_name": article.journal } },
            "authorships": article.authors.iter().map(|a| json!({
                "author": { "display_name": a.key() },
                "institutions": a.affiliation.iter().map(|i| json!({ "display_name": i })).collect::<Vec<_>>()
            })).collect::<Vec<_>>(),
            "referenced_works": article
                .resolved_references()
                .map(|r| format!("https://openalex.org/{}", r))
                .collect::<Vec<_>>(),
            "cited_by_count": article.citations_count,
        }),
        ProviderKind::SemanticScholar => {
            let reference = |r: Option<&ArticleId>| match r {
                Some(r) if r.is_doi() => json!({ "paperId": null, "externalIds": { "DOI": r.as_str() } }),
                Some(r) => json!({ "paperId": r.as_str().to_lowercase() }),
                None => json!({ "paperId": null }),
            };
            json!({
                "paperId": if article.id.is_doi() { format!("s2-{}", article.id) } else { article.id.to_string() },
                "externalIds": { "DOI": doi },
                "title": article.title,
                "venue": article.journal,
                "year": year,
                "authors": article.authors.iter().map(|a| json!({ "name": a.key() })).collect::<Vec<_>>(),
                "references": article.references.iter().map(|r| reference(r.as_ref())).collect::<Vec<_>>(),
                "citations": article.citations.as_ref().map(|cs| cs.iter().map(|c| reference(Some(c))).collect::<Vec<_>>()),
                "citationCount": article.citations_count,
            })
        }
        ProviderKind::Crossref => json!({
            "DOI": doi,
            "title": article.title.iter().collect::<Vec<_>>(),
            "container-title": article.journal.iter().collect::<Vec<_>>(),
            "author": article.authors.iter().map(|a| json!({
                "given": a.first_name,
                "family": a.last_name,
            })).collect::<Vec<_>>(),
            "issued": { "date-parts": [[year]] },
            "reference": article.references.iter().enumerate().map(|(i, r)| match r {
                Some(r) => json!({ "key": i.to_string(), "DOI": r.as_str() }),
                None => json!({ "key": i.to_string(), "unstructured": "unresolved entry" }),
            }).collect::<Vec<_>>(),
            "is-referenced-by-count": article.citations_count,
        }),
        ProviderKind::OpenCitations => {
            json!({
                "doi": doi,
                "title": article.title.clone().unwrap_or_default(),
                "author": article.authors.iter().map(|a| match &a.first_name {
                    Some(first) => format!("{}, {}", a.last_name, first),
                    None => a.last_name.clone(),
                }).collect::<Vec<_>>().join("; "),
                "year": year.map(|y| y.to_string()).unwrap_or_default(),
                "source_title": article.journal.clone().unwrap_or_default(),
                "reference": join_dois(article.resolved_references()),
                "citation": join_dois(article.citations.iter().flatten()),
                "citation_count": article.citations_count.map(|c| c.to_string()).unwrap_or_default(),
            })
        }
    }
}

fn join_dois<'a>(ids: impl Iterator<Item = &'a ArticleId>) -> String {
    ids.map(|i| i.as_str().to_lowercase()).collect::<Vec<_>>().join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::Normalize;
    use citenet_common::Author;

    fn article() -> Article {
        let mut a = Article::new(ArticleId::new("10.1/seed"));
        a.doi = Some("10.1/SEED".into());
        a.title = Some("Seed".into());
        a.journal = Some("Journal".into());
        a.year = Some(2020);
        a.authors = vec![Author::new(Some("Ada"), "Lovelace")];
        a.references = vec![Some(ArticleId::new("10.1/a")), None, Some(ArticleId::new("10.1/b"))];
        a.citations = Some(vec![ArticleId::new("10.1/c")]);
        a.citations_count = Some(3);
        a
    }

    #[tokio::test]
    async fn test_encoded_records_normalize_back() {
        for kind in [
            ProviderKind::SemanticScholar,
            ProviderKind::Crossref,
            ProviderKind::OpenCitations,
        ] {
            let mock = MockConnector::with_articles(kind, &[article()]);
            let raw = mock.fetch_by_ids(&[ArticleId::new("10.1/seed")], IdFormat::Doi).await.unwrap();
            let batch = raw.normalize(None).unwrap();
            let back = &batch.articles[0];
            assert_eq!(back.id, ArticleId::new("10.1/seed"), "{kind:?}");
            assert_eq!(back.authors[0].key(), "Ada Lovelace", "{kind:?}");
            assert_eq!(back.year, Some(2020), "{kind:?}");
        }
    }

    #[tokio::test]
    async fn test_failure_injection_and_call_log() {
        let mock = MockConnector::with_articles(ProviderKind::OpenAlex, &[article()]).failing_on("10.1/boom");
        let ids = vec![ArticleId::new("10.1/seed"), ArticleId::new("10.1/boom")];
        assert!(mock.fetch_by_ids(&ids, IdFormat::Doi).await.is_err());
        assert_eq!(mock.calls(), vec![ids]);
    }

    #[tokio::test]
    async fn test_doi_only_kinds_reject_native_ids() {
        for kind in [ProviderKind::Crossref, ProviderKind::OpenCitations] {
            let mock = MockConnector::new(kind);
            let err = mock.fetch_by_ids(&[ArticleId::new("W1")], IdFormat::Native).await.unwrap_err();
            assert!(matches!(err, AppError::Validation { .. }), "{kind:?}");
        }
        let openalex = MockConnector::new(ProviderKind::OpenAlex);
        assert!(openalex.fetch_by_ids(&[ArticleId::new("W1")], IdFormat::Native).await.is_ok());
    }
}
