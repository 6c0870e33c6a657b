//! Article identifiers
//!
//! Identifiers are upper-cased once, at construction. Every lookup in the
//! engine can then compare ids byte-for-byte.

use crate::errors::{AppError, Result};
use regex_lite::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::sync::OnceLock;

/// How an identifier is addressed at the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdFormat {
    /// A DOI (`10.xxxx/...`)
    Doi,
    /// A provider-native id (OpenAlex `W…`, Semantic Scholar hash, numeric ids)
    Native,
}

/// Upper-cased article identifier: a DOI or a provider-native id
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ArticleId(String);

const DOI_PREFIXES: &[&str] = &[
    "https://doi.org/",
    "http://doi.org/",
    "https://dx.doi.org/",
    "http://dx.doi.org/",
    "doi.org/",
    "doi:",
];

const OPENALEX_PREFIXES: &[&str] = &["https://openalex.org/", "http://openalex.org/"];

fn doi_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^10\.\d{4,9}/\S+$").expect("valid DOI regex"))
}

fn native_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // OpenAlex work ids, bare numeric ids, Semantic Scholar sha1 ids
    RE.get_or_init(|| {
        Regex::new(r"^(W\d+|\d+|[0-9A-F]{40})$").expect("valid native id regex")
    })
}

fn strip_prefix_ci<'a>(value: &'a str, prefixes: &[&str]) -> &'a str {
    for prefix in prefixes {
        let matches = value
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix));
        if matches {
            return &value[prefix.len()..];
        }
    }
    value
}

/// Normalize a DOI as delivered by a provider (bare, `doi:` or URL form)
///
/// Returns `None` for empty strings.
pub fn normalize_doi(raw: &str) -> Option<String> {
    let trimmed = strip_prefix_ci(raw.trim(), DOI_PREFIXES).trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_uppercase())
    }
}

impl ArticleId {
    /// Build an id from a provider value, upper-casing it
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_uppercase())
    }

    /// Build an id from a DOI in any of its usual spellings
    pub fn from_doi(raw: &str) -> Option<Self> {
        normalize_doi(raw).map(Self)
    }

    /// Build an id from an OpenAlex work id or URL
    pub fn from_openalex(raw: &str) -> Option<Self> {
        let stripped = strip_prefix_ci(raw.trim(), OPENALEX_PREFIXES);
        if stripped.is_empty() {
            None
        } else {
            Some(Self::new(stripped))
        }
    }

    /// Parse an identifier typed or pasted by a user
    pub fn parse_input(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let invalid = || AppError::InvalidIdentifier {
            input: input.to_string(),
        };

        if trimmed.is_empty() {
            return Err(invalid());
        }

        if let Some(doi) = normalize_doi(trimmed) {
            if doi_pattern().is_match(&doi) {
                return Ok(Self(doi));
            }
        }

        let native = strip_prefix_ci(trimmed, OPENALEX_PREFIXES).to_uppercase();
        if native_pattern().is_match(&native) {
            return Ok(Self(native));
        }

        Err(invalid())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_doi(&self) -> bool {
        self.0.starts_with("10.")
    }

    pub fn format(&self) -> IdFormat {
        if self.is_doi() {
            IdFormat::Doi
        } else {
            IdFormat::Native
        }
    }
}

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ArticleId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<u64> for ArticleId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for ArticleId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl<'de> Deserialize<'de> for ArticleId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        // Older snapshots stored numeric ids as JSON numbers
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Number(u64),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Text(s) => ArticleId::new(s),
            Repr::Number(n) => ArticleId::from(n),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_uppercased_at_construction() {
        let id = ArticleId::new("10.1038/nphys1170");
        assert_eq!(id.as_str(), "10.1038/NPHYS1170");
        assert_eq!(id, ArticleId::new("10.1038/NPHYS1170"));
        assert_eq!(id.format(), IdFormat::Doi);
    }

    #[test]
    fn test_doi_spellings_converge() {
        let a = ArticleId::from_doi("https://doi.org/10.7717/peerj.4375").unwrap();
        let b = ArticleId::from_doi("doi:10.7717/PEERJ.4375").unwrap();
        let c = ArticleId::from_doi("10.7717/peerj.4375").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert!(ArticleId::from_doi("  ").is_none());
    }

    #[test]
    fn test_parse_input_accepts_known_shapes() {
        assert_eq!(
            ArticleId::parse_input(" https://doi.org/10.1000/xyz123 ").unwrap().as_str(),
            "10.1000/XYZ123"
        );
        assert_eq!(
            ArticleId::parse_input("https://openalex.org/w2741809807").unwrap().as_str(),
            "W2741809807"
        );
        assert_eq!(ArticleId::parse_input("2123456").unwrap().format(), IdFormat::Native);
        assert!(ArticleId::parse_input("649def34f8be52c8b66281af98ae884c09aef38b").is_ok());
    }

    #[test]
    fn test_parse_input_rejects_garbage() {
        for bad in ["", "hello world", "10.12/short", "doi:", "W12X"] {
            assert!(
                matches!(ArticleId::parse_input(bad), Err(AppError::InvalidIdentifier { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_non_ascii_input_does_not_panic() {
        assert!(matches!(
            ArticleId::parse_input("aéééééééé"),
            Err(AppError::InvalidIdentifier { .. })
        ));
        assert!(ArticleId::parse_input("дои:10.1000/xyz").is_err());
        assert_eq!(ArticleId::from_doi("10.1/abäxyz").unwrap().as_str(), "10.1/ABÄXYZ");
        assert_eq!(ArticleId::from_openalex("ñandú").unwrap().as_str(), "ÑANDÚ");
        assert_eq!(
            ArticleId::parse_input("https://doi.org/10.1000/café").unwrap().as_str(),
            "10.1000/CAFÉ"
        );
    }

    #[test]
    fn test_deserialize_number_or_string() {
        let ids: Vec<ArticleId> = serde_json::from_str(r#"["w12", 2045]"#).unwrap();
        assert_eq!(ids[0].as_str(), "W12");
        assert_eq!(ids[1].as_str(), "2045");
    }
}
