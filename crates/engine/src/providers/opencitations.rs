//! OpenCitations metadata API
//!
//! Every field arrives as a string: authors as `"Last, First; Last, First"`,
//! references and citations as `"; "`-separated DOI lists. Only DOI-to-DOI
//! links are indexed, so there are no reference holes and no order.

use super::{check_error_envelope, locate, NormalizedBatch, Normalize};
use citenet_common::errors::{AppError, Result};
use citenet_common::models::normalize_doi;
use citenet_common::{Article, ArticleId, Author, ProviderKind};
use serde::Deserialize;
use serde_json::Value;

const PROVIDER: &str = "OpenCitations";

/// Raw metadata records
#[derive(Debug, Clone, Default)]
pub struct OpenCitationsResponse {
    pub records: Vec<Value>,
}

impl OpenCitationsResponse {
    pub fn from_json(body: Value) -> Result<Self> {
        check_error_envelope(ProviderKind::OpenCitations, &body)?;
        match body {
            Value::Array(records) => Ok(Self { records }),
            _ => Err(AppError::provider(PROVIDER, "response is not a JSON array")),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Record {
    doi: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    author: String,
    #[serde(default)]
    year: String,
    #[serde(default)]
    source_title: String,
    #[serde(default)]
    reference: String,
    #[serde(default)]
    citation: String,
    #[serde(default)]
    citation_count: String,
}

fn split_dois(list: &str) -> Vec<ArticleId> {
    list.split(';').filter_map(ArticleId::from_doi).collect()
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn convert(record: Value) -> Result<Article> {
    let record: Record = serde_json::from_value(record)
        .map_err(|e| AppError::malformed(PROVIDER, format!("unreadable record: {}", e)))?;

    let doi = record
        .doi
        .as_deref()
        .and_then(normalize_doi)
        .ok_or_else(|| AppError::malformed(PROVIDER, "record without DOI"))?;

    let mut article = Article::new(ArticleId::new(&doi));
    article.doi = Some(doi);
    article.title = non_empty(&record.title);
    article.journal = non_empty(&record.source_title);
    article.authors = record
        .author
        .split(';')
        .filter(|a| !a.trim().is_empty())
        .map(Author::from_inverted_name)
        .collect();
    // "2015-03-01" or "2015"
    article.year = record.year.get(..4).and_then(|y| y.parse().ok());
    article.references = split_dois(&record.reference).into_iter().map(Some).collect();
    article.citations = Some(split_dois(&record.citation));
    article.citations_count = record.citation_count.trim().parse().ok();
    Ok(article)
}

impl Normalize for OpenCitationsResponse {
    fn normalize(self, source_order: Option<&[Option<ArticleId>]>) -> Result<NormalizedBatch> {
        let mut batch = NormalizedBatch::default();
        for record in self.records {
            batch.push(convert(record).map(|a| locate(a, source_order)));
        }
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_metadata_record() {
        let response = OpenCitationsResponse::from_json(json!([{
            "doi": "10.1108/jd-12-2013-0166",
            "title": "Setting our bibliographic references free",
            "author": "Peroni, Silvio; Dutton, Alexander; ",
            "year": "2015-03-09",
            "source_title": "Journal Of Documentation",
            "reference": "10.1001/jama.280.2.142; 10.1002/asi.21331",
            "citation": "10.1007/s11192-019-03217-6",
            "citation_count": "12"
        }]))
        .unwrap();

        let article = response.normalize(None).unwrap().articles.remove(0);
        assert_eq!(article.id.as_str(), "10.1108/JD-12-2013-0166");
        assert_eq!(article.authors.len(), 2);
        assert_eq!(article.authors[0].key(), "Silvio Peroni");
        assert_eq!(article.year, Some(2015));
        assert_eq!(article.references.len(), 2);
        assert!(article.references.iter().all(Option::is_some));
        assert_eq!(article.citations, Some(vec![ArticleId::new("10.1007/S11192-019-03217-6")]));
        assert_eq!(article.citations_count, Some(12));
    }

    #[test]
    fn test_empty_fields() {
        let response = OpenCitationsResponse::from_json(json!([{"doi": "10.1/x", "reference": "", "citation": ""}])).unwrap();
        let article = response.normalize(None).unwrap().articles.remove(0);
        assert!(article.references.is_empty());
        assert_eq!(article.citations, Some(vec![]));
        assert_eq!(article.year, None);
        assert_eq!(article.title, None);
    }

    #[test]
    fn test_object_body_rejected() {
        assert!(OpenCitationsResponse::from_json(json!({"error": "quota"})).is_err());
        assert!(OpenCitationsResponse::from_json(json!({"unexpected": true})).is_err());
    }
}
