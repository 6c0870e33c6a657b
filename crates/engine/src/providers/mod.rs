//! Provider adapters
//!
//! Each bibliographic provider gets its own raw response variant and its
//! own normalizer. Nothing here tries to describe all providers with one
//! schema; the only shared shape is the canonical [`Article`].

pub mod crossref;
pub mod openalex;
pub mod opencitations;
pub mod semantic_scholar;

use citenet_common::errors::{AppError, Result};
use citenet_common::{Article, ArticleId, ProviderKind};
use serde_json::Value;
use std::collections::HashMap;

pub use crossref::CrossrefResponse;
pub use openalex::OpenAlexResponse;
pub use opencitations::OpenCitationsResponse;
pub use semantic_scholar::SemanticScholarResponse;

/// What a provider's data can support
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderCapabilities {
    /// Records carry the ids of citing articles (enables outgoing suggestions)
    pub incoming_citations: bool,
    /// Reference lists keep the original bibliography order
    pub preserves_reference_order: bool,
    /// Unresolvable bibliography entries show up as holes
    pub reports_reference_holes: bool,
    /// Records can be looked up by provider-native ids, not only by DOI
    pub native_ids: bool,
}

/// Static facts about each provider
pub fn capabilities(kind: ProviderKind) -> ProviderCapabilities {
    match kind {
        ProviderKind::OpenAlex => ProviderCapabilities {
            incoming_citations: false,
            preserves_reference_order: false,
            reports_reference_holes: false,
            native_ids: true,
        },
        ProviderKind::SemanticScholar => ProviderCapabilities {
            incoming_citations: true,
            preserves_reference_order: false,
            reports_reference_holes: true,
            native_ids: true,
        },
        ProviderKind::Crossref => ProviderCapabilities {
            incoming_citations: false,
            preserves_reference_order: true,
            reports_reference_holes: true,
            native_ids: false,
        },
        ProviderKind::OpenCitations => ProviderCapabilities {
            incoming_citations: true,
            preserves_reference_order: false,
            reports_reference_holes: false,
            native_ids: false,
        },
    }
}

/// Human-readable provider name, used in messages and metric labels
pub fn provider_name(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::OpenAlex => "OpenAlex",
        ProviderKind::SemanticScholar => "Semantic Scholar",
        ProviderKind::Crossref => "Crossref",
        ProviderKind::OpenCitations => "OpenCitations",
    }
}

/// Output of one normalization pass
///
/// Records that could not be turned into an [`Article`] are reported in
/// `skipped` instead of failing the whole batch.
#[derive(Debug, Default)]
pub struct NormalizedBatch {
    pub articles: Vec<Article>,
    pub skipped: Vec<AppError>,
}

impl NormalizedBatch {
    pub fn extend(&mut self, other: NormalizedBatch) {
        self.articles.extend(other.articles);
        self.skipped.extend(other.skipped);
    }

    fn push(&mut self, record: Result<Article>) {
        match record {
            Ok(article) => self.articles.push(article),
            Err(e) => {
                tracing::debug!(error = %e, "Skipping upstream record");
                self.skipped.push(e);
            }
        }
    }
}

/// Shared normalizer interface
pub trait Normalize {
    /// Convert a raw response into canonical articles
    ///
    /// `source_order` is the querying article's literal reference list;
    /// when given, each article's `number_in_source_references` is set
    /// from it.
    fn normalize(self, source_order: Option<&[Option<ArticleId>]>) -> Result<NormalizedBatch>;
}

/// Raw response, tagged by provider
#[derive(Debug, Clone)]
pub enum RawResponse {
    OpenAlex(OpenAlexResponse),
    SemanticScholar(SemanticScholarResponse),
    Crossref(CrossrefResponse),
    OpenCitations(OpenCitationsResponse),
}

impl RawResponse {
    pub fn provider(&self) -> ProviderKind {
        match self {
            RawResponse::OpenAlex(_) => ProviderKind::OpenAlex,
            RawResponse::SemanticScholar(_) => ProviderKind::SemanticScholar,
            RawResponse::Crossref(_) => ProviderKind::Crossref,
            RawResponse::OpenCitations(_) => ProviderKind::OpenCitations,
        }
    }

    /// Wrap a decoded JSON body
    ///
    /// `requested` is the id list sent upstream; Semantic Scholar batch
    /// responses are positional and need it to name missing records.
    pub fn from_json(kind: ProviderKind, body: Value, requested: &[ArticleId]) -> Result<Self> {
        Ok(match kind {
            ProviderKind::OpenAlex => RawResponse::OpenAlex(OpenAlexResponse::from_json(body)?),
            ProviderKind::SemanticScholar => RawResponse::SemanticScholar(
                SemanticScholarResponse::from_json(body, requested.to_vec())?,
            ),
            ProviderKind::Crossref => RawResponse::Crossref(CrossrefResponse::from_json(body)?),
            ProviderKind::OpenCitations => {
                RawResponse::OpenCitations(OpenCitationsResponse::from_json(body)?)
            }
        })
    }

    /// Concatenate two responses from the same provider (split batches)
    pub fn merge(self, other: RawResponse) -> Result<Self> {
        Ok(match (self, other) {
            (RawResponse::OpenAlex(mut a), RawResponse::OpenAlex(b)) => {
                a.results.extend(b.results);
                RawResponse::OpenAlex(a)
            }
            (RawResponse::SemanticScholar(mut a), RawResponse::SemanticScholar(b)) => {
                a.requested.extend(b.requested);
                a.records.extend(b.records);
                RawResponse::SemanticScholar(a)
            }
            (RawResponse::Crossref(mut a), RawResponse::Crossref(b)) => {
                a.items.extend(b.items);
                RawResponse::Crossref(a)
            }
            (RawResponse::OpenCitations(mut a), RawResponse::OpenCitations(b)) => {
                a.records.extend(b.records);
                RawResponse::OpenCitations(a)
            }
            (a, b) => {
                return Err(AppError::Internal {
                    message: format!(
                        "cannot merge {} and {} responses",
                        provider_name(a.provider()),
                        provider_name(b.provider())
                    ),
                })
            }
        })
    }
}

impl Normalize for RawResponse {
    fn normalize(self, source_order: Option<&[Option<ArticleId>]>) -> Result<NormalizedBatch> {
        let provider = provider_name(self.provider());
        let batch = match self {
            RawResponse::OpenAlex(r) => r.normalize(source_order)?,
            RawResponse::SemanticScholar(r) => r.normalize(source_order)?,
            RawResponse::Crossref(r) => r.normalize(source_order)?,
            RawResponse::OpenCitations(r) => r.normalize(source_order)?,
        };
        citenet_common::metrics::record_skipped(provider, batch.skipped.len());
        Ok(batch)
    }
}

/// Coerce a provider text field (string, array of strings, number, missing)
/// into one printable string
pub(crate) fn coerce_text(value: Option<&Value>) -> Option<String> {
    let text = match value? {
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(|v| coerce_text(Some(v)))
            .collect::<Vec<_>>()
            .join(" "),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Rebuild an abstract from a word -> positions inverted index
pub(crate) fn reconstruct_abstract(index: &HashMap<String, Vec<usize>>) -> Option<String> {
    let mut positioned: Vec<(usize, &str)> = index
        .iter()
        .flat_map(|(word, positions)| positions.iter().map(move |&p| (p, word.as_str())))
        .collect();
    if positioned.is_empty() {
        return None;
    }
    positioned.sort_unstable_by_key(|&(p, _)| p);
    Some(
        positioned
            .into_iter()
            .map(|(_, w)| w)
            .collect::<Vec<_>>()
            .join(" "),
    )
}

/// Apply the querying article's reference order, if any
pub(crate) fn locate(mut article: Article, source_order: Option<&[Option<ArticleId>]>) -> Article {
    if let Some(order) = source_order {
        article.locate_in(order);
    }
    article
}

/// Reject a body that is a provider error envelope rather than data
pub(crate) fn check_error_envelope(kind: ProviderKind, body: &Value) -> Result<()> {
    let Some(obj) = body.as_object() else {
        return Ok(());
    };
    let message = obj
        .get("error")
        .and_then(|e| {
            e.as_str()
                .or_else(|| e.get("message").and_then(Value::as_str))
                .map(str::to_string)
        })
        .or_else(|| {
            // Crossref and Semantic Scholar report failures as a bare message
            if obj.len() <= 2 && obj.contains_key("message") && !obj.contains_key("status") {
                obj.get("message").and_then(Value::as_str).map(str::to_string)
            } else {
                None
            }
        });
    match message {
        Some(message) => Err(AppError::provider(provider_name(kind), message)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coerce_text_shapes() {
        assert_eq!(coerce_text(Some(&json!("  A title "))), Some("A title".into()));
        assert_eq!(coerce_text(Some(&json!(["Part one", "Part two"]))), Some("Part one Part two".into()));
        assert_eq!(coerce_text(Some(&json!([]))), None);
        assert_eq!(coerce_text(Some(&json!(null))), None);
        assert_eq!(coerce_text(None), None);
        assert_eq!(coerce_text(Some(&json!(42))), Some("42".into()));
    }

    #[test]
    fn test_reconstruct_abstract() {
        let mut index = HashMap::new();
        index.insert("world".to_string(), vec![1]);
        index.insert("hello".to_string(), vec![0, 2]);
        assert_eq!(reconstruct_abstract(&index).as_deref(), Some("hello world hello"));
        assert_eq!(reconstruct_abstract(&HashMap::new()), None);
    }

    #[test]
    fn test_error_envelopes() {
        assert!(check_error_envelope(ProviderKind::OpenAlex, &json!({"error": "Invalid query", "message": "bad filter"})).is_err());
        assert!(check_error_envelope(ProviderKind::SemanticScholar, &json!({"message": "Too Many Requests"})).is_err());
        assert!(check_error_envelope(ProviderKind::Crossref, &json!({"status": "ok", "message": {"items": []}})).is_ok());
        assert!(check_error_envelope(ProviderKind::OpenCitations, &json!([])).is_ok());
    }

    #[test]
    fn test_capabilities() {
        assert!(capabilities(ProviderKind::SemanticScholar).incoming_citations);
        assert!(capabilities(ProviderKind::OpenCitations).incoming_citations);
        assert!(!capabilities(ProviderKind::OpenAlex).incoming_citations);
        assert!(capabilities(ProviderKind::Crossref).preserves_reference_order);
    }
}
