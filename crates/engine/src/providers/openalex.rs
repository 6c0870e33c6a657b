//! OpenAlex works
//!
//! Works are keyed by their native `W…` id because `referenced_works`
//! only ever carries native ids. Reference order is not preserved and
//! unresolved references are simply absent.
//!
//! Two providers only agree on an article's id when both key by DOI; an
//! OpenAlex work keeps its `W…` id and carries the DOI in `doi` instead.

use super::{check_error_envelope, coerce_text, locate, reconstruct_abstract, NormalizedBatch, Normalize};
use citenet_common::errors::{AppError, Result};
use citenet_common::models::normalize_doi;
use citenet_common::{Article, ArticleId, Author, ProviderKind};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

const PROVIDER: &str = "OpenAlex";

/// Raw OpenAlex response: the `results` of a list query, or a single work
#[derive(Debug, Clone, Default)]
pub struct OpenAlexResponse {
    pub results: Vec<Value>,
}

impl OpenAlexResponse {
    pub fn from_json(body: Value) -> Result<Self> {
        check_error_envelope(ProviderKind::OpenAlex, &body)?;
        match body {
            Value::Object(mut obj) => match obj.remove("results") {
                Some(Value::Array(results)) => Ok(Self { results }),
                Some(_) => Err(AppError::provider(PROVIDER, "'results' is not an array")),
                None if obj.contains_key("id") => Ok(Self {
                    results: vec![Value::Object(obj)],
                }),
                None => Err(AppError::provider(PROVIDER, "response has neither 'results' nor 'id'")),
            },
            _ => Err(AppError::provider(PROVIDER, "response is not a JSON object")),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Work {
    id: Option<String>,
    doi: Option<String>,
    title: Option<Value>,
    display_name: Option<Value>,
    #[serde(default)]
    authorships: Vec<Authorship>,
    publication_year: Option<i32>,
    primary_location: Option<Location>,
    host_venue: Option<Source>,
    #[serde(default)]
    referenced_works: Vec<String>,
    cited_by_count: Option<u64>,
    abstract_inverted_index: Option<HashMap<String, Vec<usize>>>,
}

#[derive(Debug, Deserialize)]
struct Authorship {
    author: Option<AuthorRef>,
    #[serde(default)]
    institutions: Vec<Source>,
    #[serde(default)]
    raw_affiliation_strings: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct AuthorRef {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Location {
    source: Option<Source>,
}

#[derive(Debug, Deserialize)]
struct Source {
    display_name: Option<String>,
}

fn convert(record: Value) -> Result<Article> {
    let work: Work = serde_json::from_value(record)
        .map_err(|e| AppError::malformed(PROVIDER, format!("unreadable work: {}", e)))?;

    let id = work
        .id
        .as_deref()
        .and_then(ArticleId::from_openalex)
        .ok_or_else(|| AppError::malformed(PROVIDER, "work without id"))?;

    let authors = work
        .authorships
        .iter()
        .map(|a| {
            let name = a
                .author
                .as_ref()
                .and_then(|r| r.display_name.as_deref())
                .ok_or_else(|| AppError::malformed(PROVIDER, format!("{}: authorship without author", id)))?;
            let mut author = Author::from_display_name(name);
            author.affiliation = a
                .institutions
                .iter()
                .find_map(|i| i.display_name.clone())
                .or_else(|| a.raw_affiliation_strings.first().cloned());
            Ok(author)
        })
        .collect::<Result<Vec<_>>>()?;

    let journal = work
        .primary_location
        .and_then(|l| l.source)
        .and_then(|s| s.display_name)
        .or_else(|| work.host_venue.and_then(|v| v.display_name));

    let mut article = Article::new(id);
    article.doi = work.doi.as_deref().and_then(normalize_doi);
    article.title = coerce_text(work.title.as_ref()).or_else(|| coerce_text(work.display_name.as_ref()));
    article.journal = journal;
    article.authors = authors;
    article.year = work.publication_year;
    article.references = work
        .referenced_works
        .iter()
        .map(|r| ArticleId::from_openalex(r))
        .collect();
    article.citations_count = work.cited_by_count;
    article.abstract_text = work.abstract_inverted_index.as_ref().and_then(reconstruct_abstract);
    Ok(article)
}

impl Normalize for OpenAlexResponse {
    fn normalize(self, source_order: Option<&[Option<ArticleId>]>) -> Result<NormalizedBatch> {
        let mut batch = NormalizedBatch::default();
        for record in self.results {
            batch.push(convert(record).map(|a| locate(a, source_order)));
        }
        Ok(batch)
    }
}
