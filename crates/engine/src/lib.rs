//! citenet engine
//!
//! Local citation network exploration:
//! - Provider normalizers and batched source connectors
//! - Citation adjacency, suggestion ranking and completeness estimates
//! - Co-authorship graph with adaptive density control
//! - Session lifecycle, async build pipeline, view model and snapshots

pub mod citation;
pub mod collaboration;
pub mod connectors;
pub mod providers;
pub mod service;
pub mod session;

pub use citation::{CitationGraph, CompletenessReport, Metric};
pub use collaboration::{AuthorCollaborationGraph, CollaborationBuilder, Membership};
pub use connectors::{create_connector, HttpConnector, MockConnector, SourceConnector};
pub use providers::{capabilities, Normalize, NormalizedBatch, ProviderCapabilities, RawResponse};
pub use service::{ExplorerService, SessionBuild, SessionSummary};
pub use session::{GraphSession, SessionHandle, SessionOrigin, SessionSnapshot, SessionView};
