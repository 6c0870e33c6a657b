//! Derived view state
//!
//! Everything here is recomputed from a [`GraphSession`] on demand, so a
//! switch between sessions can never reuse another session's tables.

use super::{GraphSession, LoadingState};
use crate::citation::{CitationGraph, CompletenessReport};
use chrono::{DateTime, Utc};
use citenet_common::{Article, ArticleId, ProviderKind};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use uuid::Uuid;

/// Role of a node in the rendered graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    Seed,
    Input,
    IncomingSuggestion,
    OutgoingSuggestion,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderNode {
    pub id: ArticleId,
    pub label: String,
    /// Journal, used for coloring
    pub group_key: Option<String>,
    /// Rank of the year among the distinct years shown
    pub level_key: Option<usize>,
    pub size_weight: usize,
    pub shape_key: NodeRole,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderEdge {
    pub from: ArticleId,
    pub to: ArticleId,
}

/// Declarative node/edge model for any graph widget
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RenderModel {
    pub nodes: Vec<RenderNode>,
    pub edges: Vec<RenderEdge>,
}

impl RenderModel {
    pub fn build(session: &GraphSession) -> Self {
        let graph = &session.graph;
        let mut placed: Vec<(&Article, NodeRole)> = Vec::new();
        let mut seen: HashSet<&ArticleId> = HashSet::new();

        let roles = session
            .input
            .iter()
            .map(|a| (a, if a.is_source { NodeRole::Seed } else { NodeRole::Input }))
            .chain(session.visible_incoming().iter().map(|a| (a, NodeRole::IncomingSuggestion)))
            .chain(session.visible_outgoing().iter().map(|a| (a, NodeRole::OutgoingSuggestion)));
        for (article, role) in roles {
            if seen.insert(&article.id) {
                placed.push((article, role));
            }
        }

        let years: Vec<i32> = placed
            .iter()
            .filter_map(|(a, _)| a.year)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let nodes = placed
            .iter()
            .map(|(article, role)| RenderNode {
                id: article.id.clone(),
                label: article.label(),
                group_key: article.journal.clone(),
                level_key: article.year.and_then(|y| years.binary_search(&y).ok()),
                size_weight: size_weight(graph, &article.id, *role),
                shape_key: *role,
            })
            .collect();

        let visible = &seen;
        let edges = placed
            .iter()
            .flat_map(move |&(article, _)| {
                graph
                    .citing(&article.id)
                    .iter()
                    .filter(move |target| visible.contains(*target))
                    .map(move |target| RenderEdge {
                        from: article.id.clone(),
                        to: target.clone(),
                    })
            })
            .collect();

        Self { nodes, edges }
    }
}

fn size_weight(graph: &CitationGraph, id: &ArticleId, role: NodeRole) -> usize {
    match role {
        NodeRole::OutgoingSuggestion => graph.out_degree(id),
        _ => graph.in_degree(id),
    }
}

/// One table row
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleRow {
    pub id: ArticleId,
    pub doi: Option<String>,
    pub title: String,
    pub authors: String,
    pub journal: Option<String>,
    pub year: Option<i32>,
    pub citations_count: Option<u64>,
    pub number_in_source_references: Option<usize>,
    pub in_degree: usize,
    pub out_degree: usize,
    pub is_source: bool,
}

impl ArticleRow {
    fn new(article: &Article, graph: &CitationGraph) -> Self {
        Self {
            id: article.id.clone(),
            doi: article.doi.clone(),
            title: article.title_or_default().to_string(),
            authors: article
                .authors
                .iter()
                .map(|a| a.short_name())
                .collect::<Vec<_>>()
                .join("; "),
            journal: article.journal.clone(),
            year: article.year,
            citations_count: article.citations_count,
            number_in_source_references: article.number_in_source_references,
            in_degree: graph.in_degree(&article.id),
            out_degree: graph.out_degree(&article.id),
            is_source: article.is_source,
        }
    }
}

/// Everything a client needs to render one session
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub index: usize,
    pub session_id: Uuid,
    pub label: String,
    pub api: ProviderKind,
    pub created_at: DateTime<Utc>,
    pub loading: LoadingState,
    pub errors: Vec<String>,
    pub source: Option<ArticleRow>,
    /// Sorted by in-degree, highest first
    pub input: Vec<ArticleRow>,
    pub incoming_suggestions: Vec<ArticleRow>,
    pub outgoing_suggestions: Vec<ArticleRow>,
    pub total_incoming_suggestions: usize,
    pub total_outgoing_suggestions: usize,
    pub max_incoming_suggestions: usize,
    pub max_outgoing_suggestions: usize,
    /// Default-selected row
    pub selected: Option<ArticleId>,
    pub graph: RenderModel,
    pub completeness: CompletenessReport,
}

impl SessionView {
    pub fn build(index: usize, session: &GraphSession) -> Self {
        let graph = &session.graph;
        let rows = |articles: &[Article]| -> Vec<ArticleRow> {
            articles.iter().map(|a| ArticleRow::new(a, graph)).collect()
        };

        let mut input = rows(session.input.as_slice());
        input.sort_by(|a, b| b.in_degree.cmp(&a.in_degree));

        let selected = session
            .source
            .as_ref()
            .map(|s| s.id.clone())
            .or_else(|| input.first().map(|r| r.id.clone()));

        let incoming = session.visible_incoming();
        let outgoing = session.visible_outgoing();

        Self {
            index,
            session_id: session.id,
            label: session.label.clone(),
            api: session.api,
            created_at: session.created_at,
            loading: session.loading,
            errors: session.errors.clone(),
            source: session.source.as_ref().map(|s| ArticleRow::new(s, graph)),
            input,
            incoming_suggestions: rows(incoming),
            outgoing_suggestions: rows(outgoing),
            total_incoming_suggestions: session.incoming_suggestions.len(),
            total_outgoing_suggestions: session.outgoing_suggestions.len(),
            max_incoming_suggestions: incoming.len(),
            max_outgoing_suggestions: outgoing.len(),
            selected,
            graph: RenderModel::build(session),
            completeness: session.completeness(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{SessionOrigin, SuggestionKind};
    use citenet_common::Author;

    fn id(s: &str) -> ArticleId {
        ArticleId::new(s)
    }

    fn article(key: &str, year: Option<i32>, refs: &[&str]) -> Article {
        let mut a = Article::new(id(key));
        a.year = year;
        a.authors = vec![Author::new(Some("Ada"), &format!("Author{key}"))];
        a.references = refs.iter().map(|r| Some(id(r))).collect();
        a
    }

    fn session() -> GraphSession {
        let mut seed = article("seed", Some(2020), &["a", "b"]);
        seed.is_source = true;
        let input = vec![
            seed.clone(),
            article("a", Some(2010), &["x", "b"]),
            article("b", Some(2015), &["x"]),
        ];
        let mut s = GraphSession::new(
            "seed".into(),
            SessionOrigin::Seed { id: seed.id.clone() },
            Some(seed),
            input,
            ProviderKind::Crossref,
        );
        s.incoming_candidates = vec![id("x")];
        s.apply_suggestions(SuggestionKind::Incoming, vec![article("x", None, &[])]);
        s
    }

    #[test]
    fn test_input_sorted_by_in_degree_and_seed_selected() {
        let view = SessionView::build(0, &session());
        let order: Vec<_> = view.input.iter().map(|r| r.id.clone()).collect();
        assert_eq!(order, vec![id("b"), id("a"), id("seed")]);
        assert_eq!(view.selected, Some(id("seed")));
        assert_eq!(view.incoming_suggestions.len(), 1);
        assert_eq!(view.max_incoming_suggestions, 1);
    }

    #[test]
    fn test_render_model_levels_roles_and_edges() {
        let model = RenderModel::build(&session());
        let node = |key: &str| model.nodes.iter().find(|n| n.id == id(key)).unwrap();

        assert_eq!(node("seed").shape_key, NodeRole::Seed);
        assert_eq!(node("x").shape_key, NodeRole::IncomingSuggestion);
        assert_eq!(node("a").level_key, Some(0));
        assert_eq!(node("b").level_key, Some(1));
        assert_eq!(node("seed").level_key, Some(2));
        assert_eq!(node("x").level_key, None);
        assert_eq!(node("x").size_weight, 2);
        assert_eq!(node("a").label, "Authora 2010");

        assert!(model.edges.contains(&RenderEdge { from: id("a"), to: id("x") }));
        assert!(model.edges.contains(&RenderEdge { from: id("seed"), to: id("b") }));
        assert_eq!(model.edges.len(), 5);
    }

    #[test]
    fn test_hiding_suggestions_removes_their_edges() {
        let mut s = session();
        s.set_suggestion_limits(Some(0), None);
        let model = RenderModel::build(&s);
        assert!(model.nodes.iter().all(|n| n.id != id("x")));
        assert!(model.edges.iter().all(|e| e.to != id("x")));
    }
}
