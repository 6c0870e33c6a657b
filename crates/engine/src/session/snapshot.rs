//! Serializable session snapshots
//!
//! Snapshots written by older versions may lack fields added later
//! (`citing`, `referencedBy`, view settings, candidate lists) or may be a
//! bare array of sessions. Restoring fills the gaps from data already in
//! the snapshot; it never calls a provider.

use super::{GraphSession, LoadingState, SessionOrigin, ViewSettings};
use crate::citation::CitationGraph;
use crate::providers::capabilities;
use chrono::{DateTime, Utc};
use citenet_common::errors::Result;
use citenet_common::{Article, ArticleId, ProviderKind};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use uuid::Uuid;

pub const SNAPSHOT_VERSION: u32 = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub active_index: Option<usize>,
    #[serde(default)]
    pub sessions: Vec<PersistedSession>,
}

impl SessionSnapshot {
    pub fn new(sessions: Vec<PersistedSession>, active_index: Option<usize>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            active_index,
            sessions,
        }
    }

    /// Parse a stored snapshot in any known layout
    pub fn from_value(value: Value) -> Result<Self> {
        let snapshot = match value {
            // Oldest layout: just the list of sessions
            Value::Array(_) => Self {
                version: 0,
                active_index: None,
                sessions: serde_json::from_value(value)?,
            },
            other => serde_json::from_value(other)?,
        };
        if snapshot.version > SNAPSHOT_VERSION {
            tracing::warn!(
                version = snapshot.version,
                supported = SNAPSHOT_VERSION,
                "Snapshot is newer than this build, restoring known fields only"
            );
        }
        Ok(snapshot)
    }
}

/// One session as stored
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub origin: Option<SessionOrigin>,
    #[serde(default)]
    pub source: Option<Article>,
    #[serde(default)]
    pub input: Vec<Article>,
    #[serde(default)]
    pub incoming_suggestions: Vec<Article>,
    #[serde(default)]
    pub outgoing_suggestions: Vec<Article>,
    #[serde(default)]
    pub incoming_candidates: Option<Vec<ArticleId>>,
    #[serde(default)]
    pub outgoing_candidates: Option<Vec<ArticleId>>,
    #[serde(default)]
    pub referenced_by: Option<IndexMap<ArticleId, Vec<ArticleId>>>,
    #[serde(default)]
    pub citing: Option<IndexMap<ArticleId, Vec<ArticleId>>>,
    #[serde(default)]
    pub api: Option<ProviderKind>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub view: Option<ViewSettings>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl From<&GraphSession> for PersistedSession {
    fn from(session: &GraphSession) -> Self {
        Self {
            id: Some(session.id),
            label: Some(session.label.clone()),
            origin: Some(session.origin.clone()),
            source: session.source.clone(),
            input: session.input.clone(),
            incoming_suggestions: session.incoming_suggestions.clone(),
            outgoing_suggestions: session.outgoing_suggestions.clone(),
            incoming_candidates: Some(session.incoming_candidates.clone()),
            outgoing_candidates: Some(session.outgoing_candidates.clone()),
            referenced_by: Some(session.graph.referenced_by.clone()),
            citing: Some(session.graph.citing.clone()),
            api: Some(session.api),
            created_at: Some(session.created_at),
            view: Some(session.view),
            errors: session.errors.clone(),
        }
    }
}

impl PersistedSession {
    /// Turn a stored session back into a live one
    ///
    /// `fallback_api` is used for snapshots that predate provider tagging.
    pub fn upgrade(self, fallback_api: ProviderKind) -> GraphSession {
        let api = self.api.unwrap_or(fallback_api);
        let incoming_citations = capabilities(api).incoming_citations;

        let referenced_by = match self.referenced_by {
            Some(map) => map,
            None => CitationGraph::build(&self.input, false).referenced_by,
        };

        let mut graph = CitationGraph {
            referenced_by,
            citing: self.citing.clone().unwrap_or_default(),
        };
        if self.citing.is_none() {
            let articles: Vec<&Article> = self
                .input
                .iter()
                .chain(&self.incoming_suggestions)
                .chain(&self.outgoing_suggestions)
                .collect();
            let known: HashSet<&ArticleId> = articles.iter().map(|a| &a.id).collect();
            graph.extend_citing(&known, articles.iter().copied(), incoming_citations);
            tracing::debug!(entries = graph.citing.len(), "Rebuilt citing map from snapshot data");
        }

        let origin = self.origin.unwrap_or_else(|| match &self.source {
            Some(source) => SessionOrigin::Seed { id: source.id.clone() },
            None => SessionOrigin::IdentifierList {
                identifiers: self.input.iter().map(|a| Some(a.id.clone())).collect(),
            },
        });
        let label = self.label.unwrap_or_else(|| match &self.source {
            Some(source) => source.label(),
            None => "Restored session".to_string(),
        });
        let ids = |articles: &[Article]| articles.iter().map(|a| a.id.clone()).collect::<Vec<_>>();

        GraphSession {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            label,
            origin,
            incoming_candidates: self
                .incoming_candidates
                .unwrap_or_else(|| ids(&self.incoming_suggestions)),
            outgoing_candidates: self
                .outgoing_candidates
                .unwrap_or_else(|| ids(&self.outgoing_suggestions)),
            source: self.source,
            input: self.input,
            incoming_suggestions: self.incoming_suggestions,
            outgoing_suggestions: self.outgoing_suggestions,
            graph,
            api,
            created_at: self.created_at.unwrap_or_else(Utc::now),
            view: self.view.unwrap_or_default(),
            loading: LoadingState::default(),
            errors: self.errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_legacy_session_without_citing_is_rebuilt() {
        let value = json!([{
            "source": {"id": "10.1/seed", "references": ["10.1/a", "10.1/b"], "isSource": true},
            "input": [
                {"id": "10.1/seed", "references": ["10.1/a", "10.1/b"], "isSource": true},
                {"id": "10.1/a", "references": ["10.1/x", "10.1/b"]},
                {"id": "10.1/b", "references": ["10.1/x"]}
            ],
            "incomingSuggestions": [
                {"id": "10.1/x", "references": ["10.1/b"]}
            ],
            "api": "crossref"
        }]);

        let snapshot = SessionSnapshot::from_value(value).unwrap();
        assert_eq!(snapshot.version, 0);
        let session = snapshot.sessions.into_iter().next().unwrap().upgrade(ProviderKind::OpenAlex);

        let id = ArticleId::new;
        assert_eq!(session.api, ProviderKind::Crossref);
        assert_eq!(session.graph.citing(&id("10.1/a")), &[id("10.1/x"), id("10.1/b")]);
        assert_eq!(session.graph.citing(&id("10.1/x")), &[id("10.1/b")]);
        assert_eq!(session.graph.in_degree(&id("10.1/x")), 2);
        assert_eq!(session.incoming_candidates, vec![id("10.1/x")]);
        assert_eq!(session.origin, SessionOrigin::Seed { id: id("10.1/seed") });
        assert!(!session.loading.any());
    }

    #[test]
    fn test_current_layout_round_trips_graph() {
        let mut a = Article::new(ArticleId::new("10.1/a"));
        a.references = vec![Some(ArticleId::new("10.1/b"))];
        let b = Article::new(ArticleId::new("10.1/b"));
        let mut session = GraphSession::new(
            "list".into(),
            SessionOrigin::IdentifierList { identifiers: vec![Some(a.id.clone()), None] },
            None,
            vec![a, b],
            ProviderKind::SemanticScholar,
        );
        session.loading.incoming = true;
        session.set_suggestion_limits(Some(3), None);

        let snapshot = SessionSnapshot::new(vec![PersistedSession::from(&session)], Some(0));
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["version"], SNAPSHOT_VERSION);
        assert!(value["sessions"][0]["citing"].is_object());

        let restored = SessionSnapshot::from_value(value).unwrap().sessions.remove(0).upgrade(ProviderKind::OpenAlex);
        assert_eq!(restored.id, session.id);
        assert_eq!(restored.graph, session.graph);
        assert_eq!(restored.origin, session.origin);
        assert_eq!(restored.view, session.view);
        assert!(!restored.loading.incoming);
    }
}
