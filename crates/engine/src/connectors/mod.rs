//! Source connectors
//!
//! A connector fetches raw records for a batch of ids from one provider.
//! Every pipeline stage issues a single batched call per id format.

mod http;
mod mock;

pub use http::HttpConnector;
pub use mock::MockConnector;

use crate::providers::RawResponse;
use async_trait::async_trait;
use citenet_common::config::ProviderConfig;
use citenet_common::errors::Result;
use citenet_common::{ArticleId, IdFormat, ProviderKind};
use std::sync::Arc;

/// Trait for provider access
#[async_trait]
pub trait SourceConnector: Send + Sync {
    /// Provider this connector talks to
    fn provider(&self) -> ProviderKind;

    /// Fetch all `ids` (all of the same `format`) in one logical request
    async fn fetch_by_ids(&self, ids: &[ArticleId], format: IdFormat) -> Result<RawResponse>;
}

/// Create a connector based on configuration
pub fn create_connector(config: &ProviderConfig) -> Result<Arc<dyn SourceConnector>> {
    Ok(Arc::new(HttpConnector::new(config)?))
}
