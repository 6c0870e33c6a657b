//! citenet Common Library
//!
//! Shared code for the citation network engine and its gateway:
//! - Canonical article model and identifiers
//! - Error types and handling
//! - Configuration management
//! - Metrics helpers
//! - Snapshot storage backends

pub mod config;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod store;

// Re-export commonly used types
pub use config::{AppConfig, ProviderKind};
pub use errors::{AppError, Result};
pub use models::{Article, ArticleId, Author, IdFormat};
pub use store::SnapshotStore;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
