//! Canonical article record shared by every provider

use super::ArticleId;
use serde::{Deserialize, Serialize};

/// One author as listed on an article
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub last_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affiliation: Option<String>,
}

impl Author {
    pub fn new(first_name: Option<&str>, last_name: &str) -> Self {
        Self {
            last_name: last_name.trim().to_string(),
            first_name: first_name
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            affiliation: None,
        }
    }

    /// Split a single display name ("Ada Lovelace") on its last space
    pub fn from_display_name(name: &str) -> Self {
        let name = name.trim();
        match name.rsplit_once(' ') {
            Some((first, last)) => Self::new(Some(first), last),
            None => Self::new(None, name),
        }
    }

    /// Split a "Last, First" string
    pub fn from_inverted_name(name: &str) -> Self {
        match name.split_once(',') {
            Some((last, first)) => Self::new(Some(first), last),
            None => Self::from_display_name(name),
        }
    }

    /// Key used to identify an author across articles
    pub fn key(&self) -> String {
        match &self.first_name {
            Some(first) => format!("{} {}", first, self.last_name),
            None => self.last_name.clone(),
        }
    }

    /// "Lovelace, A."
    pub fn short_name(&self) -> String {
        match self.first_name.as_deref().and_then(|f| f.chars().next()) {
            Some(initial) => format!("{}, {}.", self.last_name, initial),
            None => self.last_name.clone(),
        }
    }
}

/// Canonical publication record
///
/// `title` and `journal` are explicit optionals rather than a literal
/// `"undefined"` placeholder; display code substitutes its own fallback.
/// `references` keeps unresolvable bibliography positions as `None` so the
/// original numbering survives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: ArticleId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub journal: Option<String>,

    #[serde(default)]
    pub authors: Vec<Author>,

    #[serde(default)]
    pub year: Option<i32>,

    #[serde(default)]
    pub references: Vec<Option<ArticleId>>,

    /// Ids of articles citing this one, from providers with an incoming feed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citations: Option<Vec<ArticleId>>,

    #[serde(default)]
    pub citations_count: Option<u64>,

    /// 1-based position in the querying article's reference list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_in_source_references: Option<usize>,

    #[serde(default, rename = "abstract", skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,

    #[serde(default)]
    pub is_source: bool,
}

impl Article {
    /// Minimal record; providers fill the rest
    pub fn new(id: ArticleId) -> Self {
        Self {
            id,
            doi: None,
            title: None,
            journal: None,
            authors: Vec::new(),
            year: None,
            references: Vec::new(),
            citations: None,
            citations_count: None,
            number_in_source_references: None,
            abstract_text: None,
            is_source: false,
        }
    }

    /// Non-hole reference ids, in bibliography order
    pub fn resolved_references(&self) -> impl Iterator<Item = &ArticleId> {
        self.references.iter().flatten()
    }

    /// Whether the provider returned any reference list at all
    pub fn has_reference_data(&self) -> bool {
        !self.references.is_empty()
    }

    /// Set `number_in_source_references` from the querying article's list
    ///
    /// Matches on the id first, then on the DOI.
    pub fn locate_in(&mut self, source_order: &[Option<ArticleId>]) {
        let position = source_order
            .iter()
            .position(|r| r.as_ref() == Some(&self.id))
            .or_else(|| {
                let doi = self.doi.as_deref()?;
                source_order
                    .iter()
                    .position(|r| r.as_ref().map(ArticleId::as_str) == Some(doi))
            });
        self.number_in_source_references = position.map(|p| p + 1);
    }

    pub fn title_or_default(&self) -> &str {
        self.title.as_deref().unwrap_or("Untitled")
    }

    /// Short node label: first author's last name and year
    pub fn label(&self) -> String {
        let author = self
            .authors
            .first()
            .map(|a| a.last_name.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("Anonymous");
        match self.year {
            Some(year) => format!("{} {}", author, year),
            None => author.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ArticleId {
        ArticleId::new(s)
    }

    #[test]
    fn test_author_name_splitting() {
        let a = Author::from_display_name("Grace Brewster Hopper");
        assert_eq!(a.last_name, "Hopper");
        assert_eq!(a.first_name.as_deref(), Some("Grace Brewster"));
        assert_eq!(a.key(), "Grace Brewster Hopper");
        assert_eq!(a.short_name(), "Hopper, G.");

        let b = Author::from_inverted_name("Lovelace, Ada");
        assert_eq!(b.key(), "Ada Lovelace");

        let c = Author::from_display_name("Plato");
        assert_eq!(c.key(), "Plato");
        assert_eq!(c.short_name(), "Plato");
    }

    #[test]
    fn test_locate_in_source_order() {
        let order = vec![Some(id("10.1/a")), None, Some(id("10.1/b"))];

        let mut b = Article::new(id("10.1/b"));
        b.locate_in(&order);
        assert_eq!(b.number_in_source_references, Some(3));

        let mut native = Article::new(id("W9"));
        native.doi = Some("10.1/A".into());
        native.locate_in(&order);
        assert_eq!(native.number_in_source_references, Some(1));

        let mut absent = Article::new(id("10.1/z"));
        absent.locate_in(&order);
        assert_eq!(absent.number_in_source_references, None);
    }

    #[test]
    fn test_label() {
        let mut a = Article::new(id("W1"));
        assert_eq!(a.label(), "Anonymous");
        a.authors.push(Author::new(Some("Ada"), "Lovelace"));
        a.year = Some(1843);
        assert_eq!(a.label(), "Lovelace 1843");
    }

    #[test]
    fn test_serialized_shape_is_camel_case() {
        let mut a = Article::new(id("10.1/x"));
        a.references = vec![Some(id("10.1/y")), None];
        a.abstract_text = Some("Background".into());
        let json = serde_json::to_value(&a).unwrap();
        assert_eq!(json["references"], serde_json::json!(["10.1/Y", null]));
        assert_eq!(json["abstract"], "Background");
        assert_eq!(json["isSource"], false);
        assert!(json.get("citations").is_none());
    }
}
