//! Suggestion ranking
//!
//! Candidates are ranked by how many input articles they are connected to.
//! Ties keep the adjacency map's encounter order (stable sort).

use citenet_common::{Article, ArticleId};
use indexmap::IndexMap;
use std::collections::HashSet;

/// Default number of ranked candidates kept per direction
pub const DEFAULT_SUGGESTION_CAP: usize = 20;

fn rank(
    adjacency: &IndexMap<ArticleId, Vec<ArticleId>>,
    excluded: impl Fn(&ArticleId) -> bool,
    cap: usize,
) -> Vec<ArticleId> {
    let mut candidates: Vec<(&ArticleId, usize)> = adjacency
        .iter()
        .filter(|(id, list)| list.len() > 1 && !excluded(id))
        .map(|(id, list)| (id, list.len()))
        .collect();
    candidates.sort_by(|a, b| b.1.cmp(&a.1));
    candidates.into_iter().take(cap).map(|(id, _)| id.clone()).collect()
}

/// Ids referenced by more than one input article
pub fn select_incoming(
    referenced_by: &IndexMap<ArticleId, Vec<ArticleId>>,
    input_ids: &HashSet<ArticleId>,
    cap: usize,
) -> Vec<ArticleId> {
    rank(referenced_by, |id| input_ids.contains(id), cap)
}

/// Ids citing more than one known article, outside input and incoming
pub fn select_outgoing(
    citing: &IndexMap<ArticleId, Vec<ArticleId>>,
    input_ids: &HashSet<ArticleId>,
    incoming_ids: &HashSet<ArticleId>,
    cap: usize,
) -> Vec<ArticleId> {
    rank(
        citing,
        |id| input_ids.contains(id) || incoming_ids.contains(id),
        cap,
    )
}

/// Reorder resolved articles to follow the ranking
///
/// Providers answer in their own order; articles whose id is not in
/// `ranked` are dropped.
pub fn order_by_rank(articles: Vec<Article>, ranked: &[ArticleId]) -> Vec<Article> {
    let mut by_id: IndexMap<ArticleId, Article> = IndexMap::new();
    for article in articles {
        by_id.entry(article.id.clone()).or_insert(article);
    }
    ranked.iter().filter_map(|id| by_id.swap_remove(id)).collect()
}
