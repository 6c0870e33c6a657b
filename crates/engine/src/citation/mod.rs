//! Citation graph, suggestion ranking and completeness estimates

mod completeness;
mod graph;
mod ranking;

pub use completeness::{estimate as estimate_completeness, CompletenessReport, Metric};
pub use graph::CitationGraph;
pub use ranking::{order_by_rank, select_incoming, select_outgoing, DEFAULT_SUGGESTION_CAP};
