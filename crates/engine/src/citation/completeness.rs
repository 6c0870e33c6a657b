//! Data-completeness estimates
//!
//! These only measure what the active provider returned. A ratio whose
//! denominator is zero is reported as not applicable, and inner
//! completeness is only meaningful for providers that keep unresolved
//! bibliography entries as holes.

use crate::providers::ProviderCapabilities;
use citenet_common::Article;
use serde::{Deserialize, Serialize};

/// A fraction in `[0, 1]`, or "not applicable"
///
/// Serialized as a number or `null`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Metric {
    Value(f64),
    NotApplicable,
}

impl Metric {
    fn ratio(numerator: usize, denominator: usize) -> Self {
        if denominator == 0 {
            Metric::NotApplicable
        } else {
            Metric::Value((numerator as f64 / denominator as f64).clamp(0.0, 1.0))
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            Metric::Value(v) => Some(v),
            Metric::NotApplicable => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletenessReport {
    /// Literal length of the source's reference list, holes included
    pub source_reference_count: usize,
    /// Input articles other than the source
    pub input_count: usize,
    /// Share of the source's references that resolved
    pub reference_coverage: Metric,
    /// Share of input articles with a reference list of their own
    pub reference_list_coverage: Metric,
    /// Mean share of resolved entries in those reference lists
    pub average_inner_completeness: Metric,
}

/// Estimate completeness for one session's input set
pub fn estimate(
    source_reference_count: usize,
    input_without_source: &[&Article],
    capabilities: ProviderCapabilities,
) -> CompletenessReport {
    let input_count = input_without_source.len();
    let with_references: Vec<&Article> = input_without_source
        .iter()
        .copied()
        .filter(|a| a.has_reference_data())
        .collect();

    let average_inner_completeness = if capabilities.reports_reference_holes && !with_references.is_empty() {
        let total: f64 = with_references
            .iter()
            .map(|a| a.resolved_references().count() as f64 / a.references.len() as f64)
            .sum();
        Metric::Value((total / with_references.len() as f64).clamp(0.0, 1.0))
    } else {
        Metric::NotApplicable
    };

    CompletenessReport {
        source_reference_count,
        input_count,
        reference_coverage: Metric::ratio(input_count, source_reference_count),
        reference_list_coverage: Metric::ratio(with_references.len(), input_count),
        average_inner_completeness,
    }
}
