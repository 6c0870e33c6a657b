//! Canonical data model

mod article;
mod identifier;

pub use article::{Article, Author};
pub use identifier::{normalize_doi, ArticleId, IdFormat};
