//! Citation adjacency
//!
//! `referenced_by[x]` lists the input articles whose bibliography contains
//! `x`. `citing[x]` lists the known articles `x` points to, plus (for
//! providers with an incoming-citation feed) the input articles `x` is
//! reported to cite. Both maps keep insertion order, which is the
//! encounter order used to break ranking ties.

use citenet_common::{Article, ArticleId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Local citation adjacency for one session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CitationGraph {
    #[serde(default)]
    pub referenced_by: IndexMap<ArticleId, Vec<ArticleId>>,

    #[serde(default)]
    pub citing: IndexMap<ArticleId, Vec<ArticleId>>,
}

fn push_unique(list: &mut Vec<ArticleId>, id: &ArticleId) {
    if !list.contains(id) {
        list.push(id.clone());
    }
}

impl CitationGraph {
    /// Build both maps from the input set
    pub fn build(input: &[Article], incoming_citations: bool) -> Self {
        let mut graph = Self::default();
        for article in input {
            for reference in article.resolved_references() {
                if reference == &article.id {
                    continue;
                }
                push_unique(
                    graph.referenced_by.entry(reference.clone()).or_default(),
                    &article.id,
                );
            }
        }

        let known: HashSet<&ArticleId> = input.iter().map(|a| &a.id).collect();
        graph.extend_citing(&known, input, incoming_citations);
        graph
    }

    /// Fold `articles` into `citing` against the `known` id set
    ///
    /// Existing entries are extended, never replaced, so edges found by an
    /// earlier stage survive.
    pub fn extend_citing<'a>(
        &mut self,
        known: &HashSet<&ArticleId>,
        articles: impl IntoIterator<Item = &'a Article>,
        incoming_citations: bool,
    ) {
        for article in articles {
            for reference in article.resolved_references() {
                if reference != &article.id && known.contains(reference) {
                    push_unique(self.citing.entry(article.id.clone()).or_default(), reference);
                }
            }

            if !incoming_citations {
                continue;
            }
            for citer in article.citations.iter().flatten() {
                if citer != &article.id {
                    push_unique(self.citing.entry(citer.clone()).or_default(), &article.id);
                }
            }
        }
    }

    pub fn in_degree(&self, id: &ArticleId) -> usize {
        self.referenced_by.get(id).map_or(0, Vec::len)
    }

    pub fn out_degree(&self, id: &ArticleId) -> usize {
        self.citing.get(id).map_or(0, Vec::len)
    }

    /// Input articles referencing `id`
    pub fn referenced_by(&self, id: &ArticleId) -> &[ArticleId] {
        self.referenced_by.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Articles `id` points to
    pub fn citing(&self, id: &ArticleId) -> &[ArticleId] {
        self.citing.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.referenced_by.is_empty() && self.citing.is_empty()
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

    #[test]
    fn test_duplicate_references_count_once() {
        let mut seed = article("seed", &["a", "b", "b", "c"]);
        seed.references.push(None);
        let input = vec![seed, article("a", &[]), article("b", &[])];

        let graph = CitationGraph::build(&input, false);
        assert_eq!(graph.referenced_by(&id("b")), &[id("seed")]);
        assert_eq!(graph.in_degree(&id("c")), 1);
        assert_eq!(graph.citing(&id("seed")), &[id("a"), id("b")]);
        assert_eq!(graph.out_degree(&id("seed")), 2);
    }

    #[test]
    fn test_self_reference_ignored() {
        let graph = CitationGraph::build(&[article("a", &["a", "x"])], false);
        assert_eq!(graph.in_degree(&id("a")), 0);
        assert_eq!(graph.out_degree(&id("a")), 0);
        assert_eq!(graph.in_degree(&id("x")), 1);
    }

    #[test]
    fn test_incoming_feed_fills_citing_for_unknown_citers() {
        let mut a = article("a", &[]);
        a.citations = Some(vec![id("z"), id("b")]);
        let mut b = article("b", &[]);
        b.citations = Some(vec![id("z")]);

        let without = CitationGraph::build(&[a.clone(), b.clone()], false);
        assert_eq!(without.out_degree(&id("z")), 0);

        let with = CitationGraph::build(&[a, b], true);
        assert_eq!(with.citing(&id("z")), &[id("a"), id("b")]);
        assert_eq!(with.citing(&id("b")), &[id("a")]);
    }

    #[test]
    fn test_extend_keeps_existing_edges() {
        let input = vec![article("a", &["b", "s"]), article("b", &[])];
        let mut graph = CitationGraph::build(&input, false);
        assert_eq!(graph.citing(&id("a")), &[id("b")]);

        let suggestion = article("s", &["b"]);
        let mut all = input.clone();
        all.push(suggestion);
        let known: HashSet<&ArticleId> = all.iter().map(|a| &a.id).collect();
        graph.extend_citing(&known, &all, false);

        assert_eq!(graph.citing(&id("a")), &[id("b"), id("s")]);
        assert_eq!(graph.citing(&id("s")), &[id("b")]);
        // referenced_by stays the input-only view
        assert_eq!(graph.in_degree(&id("s")), 1);
    }

    #[test]
    fn test_degree_matches_list_length() {
        let input = vec![article("a", &["x", "y"]), article("b", &["x", "a"])];
        let graph = CitationGraph::build(&input, false);
        for (key, list) in &graph.referenced_by {
            assert_eq!(graph.in_degree(key), list.len());
        }
        for (key, list) in &graph.citing {
            assert_eq!(graph.out_degree(key), list.len());
        }
    }
}
