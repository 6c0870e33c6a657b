//! Co-authorship graph
//!
//! Authors are keyed by `"first last"` and deduplicated per article. Unless
//! the caller pins a minimum publication count, the threshold is raised
//! from the configured start until at most `max_authors` remain.

use citenet_common::config::CollaborationConfig;
use citenet_common::{Article, Author};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Which part of the session an article came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Membership {
    Input,
    Incoming,
    Outgoing,
}

impl Membership {
    fn bit(self) -> u8 {
        match self {
            Membership::Input => 1,
            Membership::Incoming => 2,
            Membership::Outgoing => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorNode {
    pub key: String,
    /// "Last, F."
    pub label: String,
    pub publication_count: usize,
    pub is_seed_coauthor: bool,
    /// Bitmask over input (1), incoming (2) and outgoing (4)
    pub group: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollaborationEdge {
    pub from: String,
    pub to: String,
    /// Articles the two authors share
    pub collaborations: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorCollaborationGraph {
    pub nodes: Vec<AuthorNode>,
    pub edges: Vec<CollaborationEdge>,
    pub chosen_threshold: usize,
}

struct Tally {
    author: Author,
    count: usize,
    group: u8,
}

/// Number of authors with at least `threshold` publications
pub fn authors_at_threshold(counts: &[usize], threshold: usize) -> usize {
    counts.iter().filter(|&&c| c >= threshold).count()
}

/// Smallest threshold from `start` leaving at most `max_authors` authors
pub fn adaptive_threshold(counts: &[usize], start: usize, max_authors: usize) -> usize {
    let mut threshold = start;
    while authors_at_threshold(counts, threshold) > max_authors {
        threshold += 1;
    }
    threshold
}

/// Builds co-authorship graphs with adaptive density control
#[derive(Debug, Clone)]
pub struct CollaborationBuilder {
    max_authors: usize,
    start_threshold: usize,
}

impl Default for CollaborationBuilder {
    fn default() -> Self {
        Self::new(&CollaborationConfig::default())
    }
}

impl CollaborationBuilder {
    pub fn new(config: &CollaborationConfig) -> Self {
        Self {
            max_authors: config.max_authors,
            start_threshold: config.start_threshold,
        }
    }

    /// Build the graph over `articles`
    ///
    /// `seed` marks its co-authors; `min_publications` pins the threshold
    /// and disables the size cap.
    pub fn build(
        &self,
        articles: &[(&Article, Membership)],
        seed: Option<&Article>,
        min_publications: Option<usize>,
    ) -> AuthorCollaborationGraph {
        let per_article: Vec<IndexSet<String>> = articles
            .iter()
            .map(|(article, _)| article.authors.iter().map(Author::key).collect())
            .collect();

        let mut tallies: IndexMap<String, Tally> = IndexMap::new();
        for ((article, membership), keys) in articles.iter().zip(&per_article) {
            for key in keys {
                let tally = tallies.entry(key.clone()).or_insert_with(|| Tally {
                    author: article
                        .authors
                        .iter()
                        .find(|a| &a.key() == key)
                        .cloned()
                        .unwrap_or_default(),
                    count: 0,
                    group: 0,
                });
                tally.count += 1;
                tally.group |= membership.bit();
            }
        }

        let threshold = match min_publications {
            Some(pinned) => pinned,
            None => {
                let counts: Vec<usize> = tallies.values().map(|t| t.count).collect();
                adaptive_threshold(&counts, self.start_threshold, self.max_authors)
            }
        };

        let kept: IndexMap<&str, &Tally> = tallies
            .iter()
            .filter(|(_, t)| t.count >= threshold)
            .map(|(k, t)| (k.as_str(), t))
            .collect();

        // Both directions of every co-occurring pair are counted
        let mut pairs: HashMap<(usize, usize), u32> = HashMap::new();
        for keys in &per_article {
            let present: Vec<usize> = keys.iter().filter_map(|k| kept.get_index_of(k.as_str())).collect();
            for &i in &present {
                for &j in &present {
                    if i != j {
                        *pairs.entry((i, j)).or_default() += 1;
                    }
                }
            }
        }

        let seed_keys: IndexSet<String> = seed
            .map(|s| s.authors.iter().map(Author::key).collect())
            .unwrap_or_default();

        let nodes: Vec<AuthorNode> = kept
            .iter()
            .map(|(key, tally)| AuthorNode {
                key: key.to_string(),
                label: tally.author.short_name(),
                publication_count: tally.count,
                is_seed_coauthor: seed_keys.contains(*key),
                group: tally.group,
            })
            .collect();

        let mut edges: Vec<CollaborationEdge> = pairs
            .iter()
            .filter(|((i, j), _)| i < j)
            .map(|(&(i, j), &forward)| {
                let backward = pairs.get(&(j, i)).copied().unwrap_or(0);
                CollaborationEdge {
                    from: nodes[i].key.clone(),
                    to: nodes[j].key.clone(),
                    collaborations: (forward + backward) / 2,
                }
            })
            .collect();
        edges.sort_by(|a, b| (&a.from, &a.to).cmp(&(&b.from, &b.to)));

        tracing::debug!(
            authors = tallies.len(),
            kept = nodes.len(),
            edges = edges.len(),
            threshold,
            "Built collaboration graph"
        );

        AuthorCollaborationGraph {
            nodes,
            edges,
            chosen_threshold: threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use citenet_common::ArticleId;
    use rand::Rng;

    fn article(id: &str, authors: &[&str]) -> Article {
        let mut a = Article::new(ArticleId::new(id));
        a.authors = authors.iter().map(|n| Author::from_display_name(n)).collect();
        a
    }

    #[test]
    fn test_pairs_and_dedup() {
        let a = article("1", &["Ada Lovelace", "Charles Babbage", "Ada Lovelace"]);
        let b = article("2", &["Ada Lovelace", "Charles Babbage"]);
        let c = article("3", &["Ada Lovelace", "Mary Somerville"]);
        let articles = vec![
            (&a, Membership::Input),
            (&b, Membership::Input),
            (&c, Membership::Incoming),
        ];

        let graph = CollaborationBuilder::default().build(&articles, Some(&a), Some(1));
        assert_eq!(graph.chosen_threshold, 1);
        assert_eq!(graph.nodes.len(), 3);

        let ada = &graph.nodes[0];
        assert_eq!(ada.key, "Ada Lovelace");
        assert_eq!(ada.label, "Lovelace, A.");
        assert_eq!(ada.publication_count, 3);
        assert!(ada.is_seed_coauthor);
        assert_eq!(ada.group, 1 | 2);

        let edge = graph
            .edges
            .iter()
            .find(|e| e.from == "Ada Lovelace" && e.to == "Charles Babbage")
            .unwrap();
        assert_eq!(edge.collaborations, 2);
        assert_eq!(graph.edges.len(), 2);
    }

    #[test]
    fn test_adaptive_threshold_caps_author_count() {
        let owned: Vec<Article> = (0..60)
            .map(|i| article(&format!("{i}"), &[&format!("Solo Author{i}"), "Shared Person"]))
            .collect();
        let articles: Vec<(&Article, Membership)> = owned.iter().map(|a| (a, Membership::Input)).collect();

        let graph = CollaborationBuilder::default().build(&articles, None, None);
        // 60 single-paper authors drop out at threshold 2
        assert_eq!(graph.chosen_threshold, 2);
        assert_eq!(graph.nodes.len(), 1);
        assert!(graph.edges.is_empty());
    }

    #[test]
    fn test_pinned_threshold_skips_cap() {
        let owned: Vec<Article> = (0..60)
            .map(|i| article(&format!("{i}"), &[&format!("Solo Author{i}")]))
            .collect();
        let articles: Vec<(&Article, Membership)> = owned.iter().map(|a| (a, Membership::Input)).collect();

        let graph = CollaborationBuilder::default().build(&articles, None, Some(1));
        assert_eq!(graph.nodes.len(), 60);
    }

    #[test]
    fn test_threshold_search_is_monotonic() {
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let len = rng.gen_range(0..400);
            let counts: Vec<usize> = (0..len).map(|_| rng.gen_range(1..30)).collect();

            let mut previous = usize::MAX;
            for threshold in 2..32 {
                let size = authors_at_threshold(&counts, threshold);
                assert!(size <= previous);
                previous = size;
            }

            let chosen = adaptive_threshold(&counts, 2, 50);
            assert!(authors_at_threshold(&counts, chosen) <= 50);
            if chosen > 2 {
                assert!(authors_at_threshold(&counts, chosen - 1) > 50);
            }
        }
    }
}
