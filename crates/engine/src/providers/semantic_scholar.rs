//! Semantic Scholar graph API (`/paper/batch`)
//!
//! Papers are keyed by DOI when they have one, otherwise by `paperId`, so
//! DOI-bearing records line up with the other DOI-keyed providers. The
//! batch endpoint answers positionally, with `null` for unknown ids.

use super::{check_error_envelope, coerce_text, locate, NormalizedBatch, Normalize};
use citenet_common::errors::{AppError, Result};
use citenet_common::{Article, ArticleId, Author, ProviderKind};
use serde::Deserialize;
use serde_json::Value;

const PROVIDER: &str = "Semantic Scholar";

/// Fields requested from the batch endpoint
pub const FIELDS: &str = "paperId,externalIds,title,venue,journal,year,authors,\
references.paperId,references.externalIds,citations.paperId,citations.externalIds,\
citationCount,abstract";

/// Raw batch response with the ids it answers, in request order
#[derive(Debug, Clone, Default)]
pub struct SemanticScholarResponse {
    pub requested: Vec<ArticleId>,
    pub records: Vec<Value>,
}

impl SemanticScholarResponse {
    pub fn from_json(body: Value, requested: Vec<ArticleId>) -> Result<Self> {
        check_error_envelope(ProviderKind::SemanticScholar, &body)?;
        match body {
            Value::Array(records) => Ok(Self { requested, records }),
            Value::Object(_) => Ok(Self {
                requested,
                records: vec![body],
            }),
            _ => Err(AppError::provider(PROVIDER, "response is neither an array nor a paper")),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Paper {
    paper_id: Option<String>,
    external_ids: Option<ExternalIds>,
    title: Option<Value>,
    venue: Option<Value>,
    journal: Option<JournalRef>,
    year: Option<i32>,
    #[serde(default)]
    authors: Vec<AuthorRef>,
    references: Option<Vec<PaperRef>>,
    citations: Option<Vec<PaperRef>>,
    citation_count: Option<u64>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaperRef {
    paper_id: Option<String>,
    external_ids: Option<ExternalIds>,
}

#[derive(Debug, Deserialize)]
struct ExternalIds {
    #[serde(rename = "DOI")]
    doi: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JournalRef {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthorRef {
    name: Option<String>,
}

fn ref_id(paper_id: Option<&str>, external_ids: Option<&ExternalIds>) -> Option<ArticleId> {
    external_ids
        .and_then(|e| e.doi.as_deref())
        .and_then(ArticleId::from_doi)
        .or_else(|| paper_id.filter(|p| !p.is_empty()).map(ArticleId::new))
}

fn convert(record: Value, requested: Option<&ArticleId>) -> Result<Article> {
    if record.is_null() {
        return Err(AppError::NotFound {
            id: requested.map(ToString::to_string).unwrap_or_else(|| "unknown".to_string()),
        });
    }

    let paper: Paper = serde_json::from_value(record)
        .map_err(|e| AppError::malformed(PROVIDER, format!("unreadable paper: {}", e)))?;

    let id = ref_id(paper.paper_id.as_deref(), paper.external_ids.as_ref())
        .ok_or_else(|| AppError::malformed(PROVIDER, "paper without paperId"))?;

    let authors = paper
        .authors
        .iter()
        .map(|a| {
            a.name
                .as_deref()
                .filter(|n| !n.trim().is_empty())
                .map(Author::from_display_name)
                .ok_or_else(|| AppError::malformed(PROVIDER, format!("{}: author without name", id)))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut article = Article::new(id);
    article.doi = paper
        .external_ids
        .as_ref()
        .and_then(|e| e.doi.as_deref())
        .and_then(citenet_common::models::normalize_doi);
    article.title = coerce_text(paper.title.as_ref());
    article.journal = paper
        .journal
        .and_then(|j| j.name)
        .filter(|n| !n.trim().is_empty())
        .or_else(|| coerce_text(paper.venue.as_ref()));
    article.authors = authors;
    article.year = paper.year;
    article.references = paper
        .references
        .unwrap_or_default()
        .iter()
        .map(|r| ref_id(r.paper_id.as_deref(), r.external_ids.as_ref()))
        .collect();
    article.citations = paper.citations.map(|cs| {
        cs.iter()
            .filter_map(|c| ref_id(c.paper_id.as_deref(), c.external_ids.as_ref()))
            .collect()
    });
    article.citations_count = paper.citation_count;
    article.abstract_text = paper.abstract_text.filter(|a| !a.trim().is_empty());
    Ok(article)
}

impl Normalize for SemanticScholarResponse {
    fn normalize(self, source_order: Option<&[Option<ArticleId>]>) -> Result<NormalizedBatch> {
        let mut batch = NormalizedBatch::default();
        for (i, record) in self.records.into_iter().enumerate() {
            batch.push(convert(record, self.requested.get(i)).map(|a| locate(a, source_order)));
        }
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn paper() -> Value {
        json!({
            "paperId": "649def34f8be52c8b66281af98ae884c09aef38b",
            "externalIds": {"DOI": "10.1093/mind/lix.236.433", "CorpusId": 1},
            "title": "Computing Machinery and Intelligence",
            "venue": "Mind",
            "journal": {"name": ""},
            "year": 1950,
            "authors": [{"authorId": "1", "name": "A. M. Turing"}],
            "references": [
                {"paperId": "aaa", "externalIds": {"DOI": "10.1/ref-one"}},
                {"paperId": null, "externalIds": null},
                {"paperId": "bbb", "externalIds": {}}
            ],
            "citations": [
                {"paperId": "ccc", "externalIds": {"DOI": "10.1/citer"}},
                {"paperId": null}
            ],
            "citationCount": 15000,
            "abstract": null
        })
    }

    #[test]
    fn test_normalize_paper_prefers_doi_ids() {
        let requested = vec![ArticleId::new("10.1093/mind/lix.236.433")];
        let response = SemanticScholarResponse::from_json(json!([paper()]), requested).unwrap();
        let batch = response.normalize(None).unwrap();
        let article = &batch.articles[0];

        assert_eq!(article.id.as_str(), "10.1093/MIND/LIX.236.433");
        assert_eq!(article.doi.as_deref(), Some("10.1093/MIND/LIX.236.433"));
        assert_eq!(article.journal.as_deref(), Some("Mind"));
        assert_eq!(article.authors[0].last_name, "Turing");
        assert_eq!(
            article.references,
            vec![Some(ArticleId::new("10.1/REF-ONE")), None, Some(ArticleId::new("BBB"))]
        );
        assert_eq!(article.citations, Some(vec![ArticleId::new("10.1/CITER")]));
        assert_eq!(article.abstract_text, None);
    }

    #[test]
    fn test_null_entry_names_requested_id() {
        let requested = vec![ArticleId::new("10.1/missing"), ArticleId::new("10.1093/mind/lix.236.433")];
        let response = SemanticScholarResponse::from_json(json!([null, paper()]), requested).unwrap();
        let batch = response.normalize(None).unwrap();
        assert_eq!(batch.articles.len(), 1);
        match &batch.skipped[0] {
            AppError::NotFound { id } => assert_eq!(id, "10.1/MISSING"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_author_without_name_is_malformed() {
        let mut broken = paper();
        broken["authors"] = json!([{"authorId": "7"}]);
        let response = SemanticScholarResponse::from_json(json!([broken]), vec![]).unwrap();
        let batch = response.normalize(None).unwrap();
        assert!(batch.articles.is_empty());
        assert!(matches!(batch.skipped[0], AppError::MalformedUpstreamRecord { .. }));
    }

    #[test]
    fn test_rate_limit_envelope() {
        let err = SemanticScholarResponse::from_json(json!({"message": "Too Many Requests"}), vec![]).unwrap_err();
        assert!(err.to_string().contains("Too Many Requests"));
    }
}
