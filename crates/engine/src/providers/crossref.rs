//! Crossref REST API (`/works`)
//!
//! Crossref keeps the deposited bibliography in order; entries deposited
//! without a DOI become holes so numbering survives.

use super::{coerce_text, locate, NormalizedBatch, Normalize};
use citenet_common::errors::{AppError, Result};
use citenet_common::models::normalize_doi;
use citenet_common::{Article, ArticleId, Author};
use regex_lite::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::OnceLock;

const PROVIDER: &str = "Crossref";

/// Raw Crossref response items (list query or single work)
#[derive(Debug, Clone, Default)]
pub struct CrossrefResponse {
    pub items: Vec<Value>,
}

impl CrossrefResponse {
    pub fn from_json(body: Value) -> Result<Self> {
        let status = body.get("status").and_then(Value::as_str).unwrap_or("missing");
        if status != "ok" {
            let detail = body
                .get("message")
                .map(|m| match m {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .unwrap_or_default();
            return Err(AppError::provider(PROVIDER, format!("status '{}': {}", status, detail)));
        }

        match body.get("message") {
            Some(Value::Object(message)) => match message.get("items") {
                Some(Value::Array(items)) => Ok(Self { items: items.clone() }),
                Some(_) => Err(AppError::provider(PROVIDER, "'items' is not an array")),
                None => Ok(Self {
                    items: vec![Value::Object(message.clone())],
                }),
            },
            _ => Err(AppError::provider(PROVIDER, "response without 'message' object")),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct Work {
    #[serde(rename = "DOI")]
    doi: Option<String>,
    title: Option<Value>,
    container_title: Option<Value>,
    #[serde(default)]
    author: Vec<Contributor>,
    issued: Option<DateParts>,
    published: Option<DateParts>,
    #[serde(default)]
    reference: Vec<Reference>,
    is_referenced_by_count: Option<u64>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Contributor {
    given: Option<String>,
    family: Option<String>,
    name: Option<String>,
    #[serde(default)]
    affiliation: Vec<Affiliation>,
}

#[derive(Debug, Deserialize)]
struct Affiliation {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DateParts {
    #[serde(rename = "date-parts", default)]
    date_parts: Vec<Vec<Option<i32>>>,
}

impl DateParts {
    fn year(&self) -> Option<i32> {
        self.date_parts.first()?.first().copied().flatten()
    }
}

#[derive(Debug, Deserialize)]
struct Reference {
    #[serde(rename = "DOI")]
    doi: Option<String>,
}

fn markup() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").expect("valid markup regex"))
}

/// Drop JATS tags and collapse whitespace
fn strip_jats(raw: &str) -> String {
    markup()
        .replace_all(raw, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn convert(record: Value) -> Result<Article> {
    let work: Work = serde_json::from_value(record)
        .map_err(|e| AppError::malformed(PROVIDER, format!("unreadable work: {}", e)))?;

    let doi = work
        .doi
        .as_deref()
        .and_then(normalize_doi)
        .ok_or_else(|| AppError::malformed(PROVIDER, "work without DOI"))?;

    let authors = work
        .author
        .iter()
        .map(|c| {
            let mut author = match (c.family.as_deref(), c.name.as_deref()) {
                (Some(family), _) => Author::new(c.given.as_deref(), family),
                (None, Some(name)) => Author::new(None, name),
                (None, None) => {
                    return Err(AppError::malformed(PROVIDER, format!("{}: contributor without name", doi)))
                }
            };
            author.affiliation = c.affiliation.iter().find_map(|a| a.name.clone());
            Ok(author)
        })
        .collect::<Result<Vec<_>>>()?;

    let mut article = Article::new(ArticleId::new(&doi));
    article.doi = Some(doi);
    article.title = coerce_text(work.title.as_ref());
    article.journal = coerce_text(work.container_title.as_ref());
    article.authors = authors;
    article.year = work
        .issued
        .as_ref()
        .and_then(DateParts::year)
        .or_else(|| work.published.as_ref().and_then(DateParts::year));
    article.references = work
        .reference
        .iter()
        .map(|r| r.doi.as_deref().and_then(ArticleId::from_doi))
        .collect();
    article.citations_count = work.is_referenced_by_count;
    article.abstract_text = work
        .abstract_text
        .as_deref()
        .map(strip_jats)
        .filter(|a| !a.is_empty());
    Ok(article)
}

impl Normalize for CrossrefResponse {
    fn normalize(self, source_order: Option<&[Option<ArticleId>]>) -> Result<NormalizedBatch> {
        let mut batch = NormalizedBatch::default();
        for record in self.items {
            batch.push(convert(record).map(|a| locate(a, source_order)));
        }
        Ok(batch)
    }
}
