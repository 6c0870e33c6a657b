//! Graph sessions
//!
//! A session is one exploration tab. It lives in a [`SessionCell`] that the
//! pipeline updates in place at stage checkpoints, so readers see partial
//! state while suggestions are still loading.

mod manager;
mod pipeline;
mod snapshot;
mod view;

pub use manager::SessionManager;
pub use pipeline::GraphPipeline;
pub use snapshot::{PersistedSession, SessionSnapshot, SNAPSHOT_VERSION};
pub use view::{ArticleRow, NodeRole, RenderEdge, RenderModel, RenderNode, SessionView};

use crate::citation::{estimate_completeness, order_by_rank, CitationGraph, CompletenessReport};
use crate::collaboration::Membership;
use crate::providers::{capabilities, ProviderCapabilities};
use chrono::{DateTime, Utc};
use citenet_common::{Article, ArticleId, ProviderKind};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

/// How a session was started
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionOrigin {
    /// Built around one seed article
    Seed { id: ArticleId },
    /// Built from an imported identifier list; the list acts as the
    /// pseudo-source's reference list, invalid entries kept as holes
    IdentifierList { identifiers: Vec<Option<ArticleId>> },
}

/// Client-adjustable suggestion caps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewSettings {
    #[serde(default)]
    pub max_incoming_suggestions: Option<usize>,
    #[serde(default)]
    pub max_outgoing_suggestions: Option<usize>,
    #[serde(default = "default_visible")]
    pub default_visible: usize,
}

fn default_visible() -> usize {
    10
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            max_incoming_suggestions: None,
            max_outgoing_suggestions: None,
            default_visible: default_visible(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadingState {
    pub incoming: bool,
    pub outgoing: bool,
}

impl LoadingState {
    pub fn any(&self) -> bool {
        self.incoming || self.outgoing
    }
}

/// Which suggestion list a stage fills
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestionKind {
    Incoming,
    Outgoing,
}

impl SuggestionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SuggestionKind::Incoming => "incoming",
            SuggestionKind::Outgoing => "outgoing",
        }
    }
}

/// One exploration tab
#[derive(Debug, Clone)]
pub struct GraphSession {
    pub id: Uuid,
    pub label: String,
    pub origin: SessionOrigin,
    pub source: Option<Article>,
    pub input: Vec<Article>,
    pub incoming_candidates: Vec<ArticleId>,
    pub outgoing_candidates: Vec<ArticleId>,
    pub incoming_suggestions: Vec<Article>,
    pub outgoing_suggestions: Vec<Article>,
    pub graph: CitationGraph,
    pub api: ProviderKind,
    pub created_at: DateTime<Utc>,
    pub view: ViewSettings,
    pub loading: LoadingState,
    /// One message per failed stage
    pub errors: Vec<String>,
}

impl GraphSession {
    /// A session with its input resolved and adjacency built
    pub fn new(
        label: String,
        origin: SessionOrigin,
        source: Option<Article>,
        input: Vec<Article>,
        api: ProviderKind,
    ) -> Self {
        let graph = CitationGraph::build(&input, capabilities(api).incoming_citations);
        Self {
            id: Uuid::new_v4(),
            label,
            origin,
            source,
            input,
            incoming_candidates: Vec::new(),
            outgoing_candidates: Vec::new(),
            incoming_suggestions: Vec::new(),
            outgoing_suggestions: Vec::new(),
            graph,
            api,
            created_at: Utc::now(),
            view: ViewSettings::default(),
            loading: LoadingState::default(),
            errors: Vec::new(),
        }
    }

    pub fn capabilities(&self) -> ProviderCapabilities {
        capabilities(self.api)
    }

    pub fn input_ids(&self) -> HashSet<ArticleId> {
        self.input.iter().map(|a| a.id.clone()).collect()
    }

    pub fn incoming_ids(&self) -> HashSet<ArticleId> {
        self.incoming_suggestions.iter().map(|a| a.id.clone()).collect()
    }

    /// Literal length of the source's reference list (holes included)
    pub fn source_reference_count(&self) -> usize {
        match (&self.source, &self.origin) {
            (Some(source), _) => source.references.len(),
            (None, SessionOrigin::IdentifierList { identifiers }) => identifiers.len(),
            (None, SessionOrigin::Seed { .. }) => 0,
        }
    }

    pub fn input_without_source(&self) -> Vec<&Article> {
        self.input.iter().filter(|a| !a.is_source).collect()
    }

    /// Every resolved article: input, then incoming, then outgoing
    pub fn known_articles(&self) -> impl Iterator<Item = &Article> {
        self.input
            .iter()
            .chain(&self.incoming_suggestions)
            .chain(&self.outgoing_suggestions)
    }

    pub fn find(&self, id: &ArticleId) -> Option<&Article> {
        self.known_articles().find(|a| &a.id == id)
    }

    fn visible_count(&self, setting: Option<usize>, available: usize) -> usize {
        setting.unwrap_or(self.view.default_visible).min(available)
    }

    pub fn visible_incoming(&self) -> &[Article] {
        let n = self.visible_count(self.view.max_incoming_suggestions, self.incoming_suggestions.len());
        &self.incoming_suggestions[..n]
    }

    pub fn visible_outgoing(&self) -> &[Article] {
        let n = self.visible_count(self.view.max_outgoing_suggestions, self.outgoing_suggestions.len());
        &self.outgoing_suggestions[..n]
    }

    /// Adjust the visible slices; `None` leaves a direction unchanged
    ///
    /// The requested count is stored as given and clamped to the ranked
    /// list length when read, so a limit set while a stage is still loading
    /// applies once its results arrive. The ranking itself is never touched.
    pub fn set_suggestion_limits(&mut self, incoming: Option<usize>, outgoing: Option<usize>) {
        if let Some(n) = incoming {
            self.view.max_incoming_suggestions = Some(n);
        }
        if let Some(n) = outgoing {
            self.view.max_outgoing_suggestions = Some(n);
        }
    }

    /// Store resolved suggestions in rank order and fold them into `citing`
    pub fn apply_suggestions(&mut self, kind: SuggestionKind, articles: Vec<Article>) {
        let input_ids = self.input_ids();
        let (ranked, excluded) = match kind {
            SuggestionKind::Incoming => (&self.incoming_candidates, HashSet::new()),
            SuggestionKind::Outgoing => (&self.outgoing_candidates, self.incoming_ids()),
        };
        let ordered: Vec<Article> = order_by_rank(articles, ranked)
            .into_iter()
            .filter(|a| !input_ids.contains(&a.id) && !excluded.contains(&a.id))
            .collect();

        match kind {
            SuggestionKind::Incoming => self.incoming_suggestions = ordered,
            SuggestionKind::Outgoing => self.outgoing_suggestions = ordered,
        }
        self.refresh_citing();
    }

    /// Extend `citing` over every known article
    pub fn refresh_citing(&mut self) {
        let incoming_citations = self.capabilities().incoming_citations;
        let Self {
            input,
            incoming_suggestions,
            outgoing_suggestions,
            graph,
            ..
        } = self;
        let articles: Vec<&Article> = input
            .iter()
            .chain(incoming_suggestions.iter())
            .chain(outgoing_suggestions.iter())
            .collect();
        let known: HashSet<&ArticleId> = articles.iter().map(|a| &a.id).collect();
        graph.extend_citing(&known, articles.iter().copied(), incoming_citations);
    }

    pub fn completeness(&self) -> CompletenessReport {
        estimate_completeness(
            self.source_reference_count(),
            &self.input_without_source(),
            self.capabilities(),
        )
    }

    /// Articles tagged with the part of the session they belong to
    pub fn memberships(&self) -> Vec<(&Article, Membership)> {
        self.input
            .iter()
            .map(|a| (a, Membership::Input))
            .chain(self.incoming_suggestions.iter().map(|a| (a, Membership::Incoming)))
            .chain(self.outgoing_suggestions.iter().map(|a| (a, Membership::Outgoing)))
            .collect()
    }
}

/// Shared, observable cell holding one session
///
/// The pipeline captures the cell (not a tab index) when it dispatches a
/// stage. Closing marks the cell, and late results for a closed cell are
/// dropped.
#[derive(Debug)]
pub struct SessionCell {
    id: Uuid,
    closed: AtomicBool,
    state: RwLock<GraphSession>,
}

pub type SessionHandle = Arc<SessionCell>;

impl SessionCell {
    pub fn new(session: GraphSession) -> SessionHandle {
        Arc::new(Self {
            id: session.id,
            closed: AtomicBool::new(false),
            state: RwLock::new(session),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn mark_closed(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, GraphSession> {
        self.state.read().await
    }

    pub async fn write(&self) -> RwLockWriteGuard<'_, GraphSession> {
        self.state.write().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ArticleId {
        ArticleId::new(s)
    }

    fn article(key: &str, refs: &[&str]) -> Article {
        let mut a = Article::new(id(key));
        a.references = refs.iter().map(|r| Some(id(r))).collect();
        a
    }

    fn session() -> GraphSession {
        let input = vec![article("a", &["x", "y"]), article("b", &["x", "y", "a"])];
        GraphSession::new(
            "test".into(),
            SessionOrigin::IdentifierList {
                identifiers: vec![Some(id("a")), Some(id("b")), None],
            },
            None,
            input,
            ProviderKind::OpenAlex,
        )
    }

    #[test]
    fn test_apply_incoming_orders_by_rank_and_backfills_citing() {
        let mut s = session();
        s.incoming_candidates = vec![id("y"), id("x")];
        s.apply_suggestions(
            SuggestionKind::Incoming,
            vec![article("x", &["y"]), article("y", &[]), article("a", &[])],
        );

        let got: Vec<_> = s.incoming_suggestions.iter().map(|a| a.id.clone()).collect();
        assert_eq!(got, vec![id("y"), id("x")]);
        assert_eq!(s.graph.citing(&id("x")), &[id("y")]);
        assert_eq!(s.graph.citing(&id("a")), &[id("x"), id("y")]);
    }

    #[test]
    fn test_outgoing_never_overlaps_incoming() {
        let mut s = session();
        s.incoming_candidates = vec![id("x")];
        s.apply_suggestions(SuggestionKind::Incoming, vec![article("x", &[])]);
        s.outgoing_candidates = vec![id("x"), id("z")];
        s.apply_suggestions(SuggestionKind::Outgoing, vec![article("x", &[]), article("z", &["a"])]);

        let got: Vec<_> = s.outgoing_suggestions.iter().map(|a| a.id.clone()).collect();
        assert_eq!(got, vec![id("z")]);
    }

    #[test]
    fn test_visible_slices_clamp_without_reranking() {
        let mut s = session();
        s.incoming_candidates = (0..15).map(|i| id(&format!("c{i}"))).collect();
        let resolved: Vec<Article> = s.incoming_candidates.iter().map(|c| Article::new(c.clone())).collect();
        s.apply_suggestions(SuggestionKind::Incoming, resolved);

        assert_eq!(s.visible_incoming().len(), 10);
        s.set_suggestion_limits(Some(3), None);
        assert_eq!(s.visible_incoming()[0].id, id("c0"));
        assert_eq!(s.visible_incoming().len(), 3);
        s.set_suggestion_limits(Some(99), Some(4));
        assert_eq!(s.visible_incoming().len(), 15);
        assert_eq!(s.view.max_outgoing_suggestions, Some(4));
        assert!(s.visible_outgoing().is_empty());
    }

    #[test]
    fn test_limit_set_while_loading_applies_to_later_results() {
        let mut s = session();
        s.incoming_candidates = (0..8).map(|i| id(&format!("c{i}"))).collect();
        s.set_suggestion_limits(Some(5), None);
        assert_eq!(s.view.max_incoming_suggestions, Some(5));
        assert!(s.visible_incoming().is_empty());

        let resolved: Vec<Article> = s.incoming_candidates.iter().map(|c| Article::new(c.clone())).collect();
        s.apply_suggestions(SuggestionKind::Incoming, resolved);
        assert_eq!(s.incoming_suggestions.len(), 8);
        assert_eq!(s.visible_incoming().len(), 5);
        assert_eq!(s.visible_incoming()[4].id, id("c4"));
    }

    #[test]
    fn test_list_import_counts_identifiers_as_source_references() {
        let s = session();
        assert_eq!(s.source_reference_count(), 3);
        assert_eq!(s.input_without_source().len(), 2);
    }

    #[tokio::test]
    async fn test_cell_close_flag() {
        let cell = SessionCell::new(session());
        assert!(!cell.is_closed());
        cell.mark_closed();
        assert!(cell.is_closed());
        assert_eq!(cell.read().await.id, cell.id());
    }
}
