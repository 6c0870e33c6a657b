//! Session build pipeline
//!
//! Stage 1 resolves the seed (or identifier list) and its references and
//! builds the adjacency. Stages 2 and 3 fork from that snapshot and
//! resolve incoming and outgoing suggestions concurrently, each with one
//! batched provider call per id format.

use super::{GraphSession, SessionHandle, SessionOrigin, SuggestionKind};
use crate::citation::{select_incoming, select_outgoing};
use crate::connectors::SourceConnector;
use crate::providers::{capabilities, NormalizedBatch, Normalize};
use citenet_common::config::SessionConfig;
use citenet_common::errors::{AppError, Result};
use citenet_common::metrics::record_stage;
use citenet_common::{Article, ArticleId, IdFormat};
use indexmap::IndexSet;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

pub struct GraphPipeline {
    connector: Arc<dyn SourceConnector>,
    settings: SessionConfig,
}

impl GraphPipeline {
    pub fn new(connector: Arc<dyn SourceConnector>, settings: SessionConfig) -> Self {
        Self { connector, settings }
    }

    pub fn settings(&self) -> &SessionConfig {
        &self.settings
    }

    /// Resolve `ids` with one call per id format
    async fn resolve(
        &self,
        ids: &[ArticleId],
        source_order: Option<&[Option<ArticleId>]>,
    ) -> Result<NormalizedBatch> {
        let distinct: IndexSet<&ArticleId> = ids.iter().collect();
        let native_ids = capabilities(self.connector.provider()).native_ids;
        let mut batch = NormalizedBatch::default();

        for format in [IdFormat::Doi, IdFormat::Native] {
            let group: Vec<ArticleId> = distinct
                .iter()
                .filter(|id| id.format() == format)
                .map(|id| (*id).clone())
                .collect();
            if group.is_empty() {
                continue;
            }
            if format == IdFormat::Native && !native_ids {
                // DOI-only provider: these ids can never resolve here
                batch.skipped.extend(group.into_iter().map(|id| AppError::InvalidIdentifier {
                    input: id.to_string(),
                }));
                continue;
            }
            let raw = self.connector.fetch_by_ids(&group, format).await?;
            batch.extend(raw.normalize(source_order)?);
        }

        for skipped in &batch.skipped {
            debug!(error = %skipped, "Record skipped during resolution");
        }
        Ok(batch)
    }

    /// Stage 1 for a seed identifier
    pub async fn build_from_seed(&self, raw_id: &str) -> Result<GraphSession> {
        let id = ArticleId::parse_input(raw_id)?;
        let caps = capabilities(self.connector.provider());

        let NormalizedBatch { articles, skipped } = self.resolve(std::slice::from_ref(&id), None).await?;
        let mut seed = match articles.into_iter().next() {
            Some(seed) => seed,
            None => {
                return Err(skipped
                    .into_iter()
                    .next()
                    .unwrap_or(AppError::NotFound { id: id.to_string() }))
            }
        };
        if !seed.has_reference_data() {
            return Err(AppError::NoReferenceData { id: seed.id.to_string() });
        }
        seed.is_source = true;

        let reference_ids: Vec<ArticleId> = seed
            .resolved_references()
            .filter(|r| **r != seed.id)
            .cloned()
            .collect();
        let order = caps.preserves_reference_order.then_some(seed.references.as_slice());
        let references = self.resolve(&reference_ids, order).await?;

        info!(
            seed = %seed.id,
            references = seed.references.len(),
            resolved = references.articles.len(),
            skipped = references.skipped.len(),
            "Seed references resolved"
        );

        let mut input = Vec::with_capacity(references.articles.len() + 1);
        if self.settings.include_source_in_input {
            input.push(seed.clone());
        }
        input.extend(dedupe(references.articles, Some(&seed.id)));

        Ok(self.new_session(
            seed.label(),
            SessionOrigin::Seed { id: seed.id.clone() },
            Some(seed),
            input,
        ))
    }

    /// Stage 1 for an imported identifier list
    pub async fn build_from_identifier_list(
        &self,
        identifiers: &[String],
        label: Option<String>,
    ) -> Result<GraphSession> {
        let parsed: Vec<Option<ArticleId>> = identifiers
            .iter()
            .map(|raw| match ArticleId::parse_input(raw) {
                Ok(id) => Some(id),
                Err(e) => {
                    warn!(error = %e, "Ignoring identifier in list import");
                    None
                }
            })
            .collect();

        let valid: Vec<ArticleId> = parsed.iter().flatten().cloned().collect();
        if valid.is_empty() {
            return Err(AppError::Validation {
                message: "identifier list contains no valid identifiers".to_string(),
                field: Some("identifiers".to_string()),
            });
        }

        let resolved = self.resolve(&valid, Some(parsed.as_slice())).await?;
        info!(
            identifiers = identifiers.len(),
            resolved = resolved.articles.len(),
            "Identifier list resolved"
        );

        let label = label
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| format!("Imported list ({} ids)", identifiers.len()));
        let input = dedupe(resolved.articles, None);

        Ok(self.new_session(
            label,
            SessionOrigin::IdentifierList { identifiers: parsed },
            None,
            input,
        ))
    }

    fn new_session(
        &self,
        label: String,
        origin: SessionOrigin,
        source: Option<Article>,
        input: Vec<Article>,
    ) -> GraphSession {
        let mut session = GraphSession::new(label, origin, source, input, self.connector.provider());
        session.view.default_visible = self.settings.default_visible_suggestions;
        // Until candidates are ranked, every possible stage counts as pending
        session.loading.incoming = true;
        session.loading.outgoing = session.capabilities().incoming_citations;
        session
    }

    /// Stages 2 and 3: rank candidates from the finished adjacency and
    /// resolve both suggestion lists concurrently
    ///
    /// Results for a session closed in the meantime are dropped. Loading
    /// flags are cleared on every path.
    pub async fn resolve_suggestions(&self, handle: SessionHandle) {
        let cap = self.settings.suggestion_cap;
        let (incoming, outgoing) = {
            let mut session = handle.write().await;
            let input_ids = session.input_ids();
            let incoming = select_incoming(&session.graph.referenced_by, &input_ids, cap);
            let outgoing = if session.capabilities().incoming_citations {
                let incoming_ids: HashSet<ArticleId> = incoming.iter().cloned().collect();
                select_outgoing(&session.graph.citing, &input_ids, &incoming_ids, cap)
            } else {
                Vec::new()
            };

            session.incoming_candidates = incoming.clone();
            session.outgoing_candidates = outgoing.clone();
            session.loading.incoming = !incoming.is_empty();
            session.loading.outgoing = !outgoing.is_empty();
            (incoming, outgoing)
        };

        debug!(
            session_id = %handle.id(),
            incoming = incoming.len(),
            outgoing = outgoing.len(),
            "Suggestion candidates ranked"
        );

        tokio::join!(
            self.run_stage(&handle, SuggestionKind::Incoming, incoming),
            self.run_stage(&handle, SuggestionKind::Outgoing, outgoing),
        );
    }

    async fn run_stage(&self, handle: &SessionHandle, kind: SuggestionKind, ids: Vec<ArticleId>) {
        if ids.is_empty() {
            return;
        }
        let started = Instant::now();
        let result = self.resolve(&ids, None).await;
        record_stage(kind.as_str(), started.elapsed().as_secs_f64(), result.is_ok());

        let mut session = handle.write().await;
        if handle.is_closed() {
            debug!(session_id = %handle.id(), stage = kind.as_str(), "Session closed, discarding stage result");
            return;
        }

        match result {
            Ok(batch) => {
                let count = batch.articles.len();
                session.apply_suggestions(kind, batch.articles);
                info!(session_id = %handle.id(), stage = kind.as_str(), resolved = count, "Suggestions applied");
            }
            Err(e) => {
                warn!(session_id = %handle.id(), stage = kind.as_str(), error = %e, "Suggestion stage failed");
                session
                    .errors
                    .push(format!("Loading {} suggestions failed: {}", kind.as_str(), e));
            }
        }
        match kind {
            SuggestionKind::Incoming => session.loading.incoming = false,
            SuggestionKind::Outgoing => session.loading.outgoing = false,
        }
    }
}

/// Drop duplicates and the source itself, keeping first occurrence
fn dedupe(articles: Vec<Article>, source_id: Option<&ArticleId>) -> Vec<Article> {
    let mut seen: HashSet<ArticleId> = HashSet::new();
    articles
        .into_iter()
        .filter(|a| Some(&a.id) != source_id && seen.insert(a.id.clone()))
        .collect()
}
