//! Explorer service
//!
//! Ties the pipeline, the session manager and the snapshot store together.
//! This is the API the gateway (or any other front end) talks to.

use crate::citation::CompletenessReport;
use crate::collaboration::{AuthorCollaborationGraph, CollaborationBuilder};
use crate::connectors::SourceConnector;
use crate::session::{
    GraphPipeline, GraphSession, PersistedSession, SessionCell, SessionHandle, SessionManager,
    SessionSnapshot, SessionView,
};
use chrono::{DateTime, Utc};
use citenet_common::errors::Result;
use citenet_common::{AppConfig, ProviderKind, SnapshotStore};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

/// A freshly admitted session and its background suggestion task
#[derive(Debug)]
pub struct SessionBuild {
    pub index: usize,
    pub handle: SessionHandle,
    pub suggestions: JoinHandle<()>,
}

/// One entry of the session list
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub index: usize,
    pub session_id: Uuid,
    pub label: String,
    pub api: ProviderKind,
    pub created_at: DateTime<Utc>,
    pub input_count: usize,
    pub loading: bool,
    pub active: bool,
}

pub struct ExplorerService {
    pipeline: Arc<GraphPipeline>,
    manager: RwLock<SessionManager>,
    store: Option<Arc<dyn SnapshotStore>>,
    collaboration: CollaborationBuilder,
    provider: ProviderKind,
}

impl ExplorerService {
    pub fn new(
        connector: Arc<dyn SourceConnector>,
        config: &AppConfig,
        store: Option<Arc<dyn SnapshotStore>>,
    ) -> Self {
        let provider = connector.provider();
        Self {
            pipeline: Arc::new(GraphPipeline::new(connector, config.sessions.clone())),
            manager: RwLock::new(SessionManager::new(config.sessions.max_sessions)),
            store,
            collaboration: CollaborationBuilder::new(&config.collaboration),
            provider,
        }
    }

    /// Build a session around a seed identifier
    ///
    /// Returns once the input set and adjacency are ready; suggestions
    /// keep resolving in the background.
    pub async fn create_from_seed(self: &Arc<Self>, raw_id: &str) -> Result<SessionBuild> {
        let session = self.pipeline.build_from_seed(raw_id).await?;
        Ok(self.admit(session).await)
    }

    /// Build a session from an imported identifier list
    pub async fn create_from_identifier_list(
        self: &Arc<Self>,
        identifiers: &[String],
        label: Option<String>,
    ) -> Result<SessionBuild> {
        let session = self
            .pipeline
            .build_from_identifier_list(identifiers, label)
            .await?;
        Ok(self.admit(session).await)
    }

    async fn admit(self: &Arc<Self>, session: GraphSession) -> SessionBuild {
        info!(
            session_id = %session.id,
            label = %session.label,
            input = session.input.len(),
            "Session created"
        );
        let handle = SessionCell::new(session);
        let index = self.manager.write().await.push(handle.clone());

        let service = Arc::clone(self);
        let task_handle = handle.clone();
        let suggestions = tokio::spawn(async move {
            service.pipeline.resolve_suggestions(task_handle).await;
            service.persist().await;
        });

        SessionBuild {
            index,
            handle,
            suggestions,
        }
    }

    /// Close a session; returns the newly active index
    pub async fn close(&self, index: usize) -> Result<Option<usize>> {
        let active = self.manager.write().await.close(index)?;
        self.persist().await;
        Ok(active)
    }

    /// Make a session active and rebuild its view
    pub async fn switch_to(&self, index: usize) -> Result<SessionView> {
        let handle = self.manager.write().await.switch_to(index)?;
        let session = handle.read().await;
        Ok(SessionView::build(index, &session))
    }

    pub async fn view(&self, index: usize) -> Result<SessionView> {
        let handle = self.handle(index).await?;
        let session = handle.read().await;
        Ok(SessionView::build(index, &session))
    }

    pub async fn active_index(&self) -> Option<usize> {
        self.manager.read().await.active_index()
    }

    pub async fn set_suggestion_limits(
        &self,
        index: usize,
        incoming: Option<usize>,
        outgoing: Option<usize>,
    ) -> Result<SessionView> {
        let handle = self.handle(index).await?;
        let view = {
            let mut session = handle.write().await;
            session.set_suggestion_limits(incoming, outgoing);
            SessionView::build(index, &session)
        };
        self.persist().await;
        Ok(view)
    }

    pub async fn collaboration(
        &self,
        index: usize,
        min_publications: Option<usize>,
    ) -> Result<AuthorCollaborationGraph> {
        let handle = self.handle(index).await?;
        let session = handle.read().await;
        Ok(self
            .collaboration
            .build(&session.memberships(), session.source.as_ref(), min_publications))
    }

    pub async fn completeness(&self, index: usize) -> Result<CompletenessReport> {
        let handle = self.handle(index).await?;
        let session = handle.read().await;
        Ok(session.completeness())
    }

    pub async fn list(&self) -> Vec<SessionSummary> {
        let (handles, active) = {
            let manager = self.manager.read().await;
            (manager.sessions().to_vec(), manager.active_index())
        };

        let mut summaries = Vec::with_capacity(handles.len());
        for (index, handle) in handles.iter().enumerate() {
            let session = handle.read().await;
            summaries.push(SessionSummary {
                index,
                session_id: session.id,
                label: session.label.clone(),
                api: session.api,
                created_at: session.created_at,
                input_count: session.input.len(),
                loading: session.loading.any(),
                active: active == Some(index),
            });
        }
        summaries
    }

    async fn handle(&self, index: usize) -> Result<SessionHandle> {
        self.manager.read().await.get(index)
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let (handles, active) = {
            let manager = self.manager.read().await;
            (manager.sessions().to_vec(), manager.active_index())
        };

        let mut sessions = Vec::with_capacity(handles.len());
        for handle in &handles {
            sessions.push(PersistedSession::from(&*handle.read().await));
        }
        SessionSnapshot::new(sessions, active)
    }

    /// Save the current state; failures are logged, never returned
    pub async fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };
        let snapshot = self.snapshot().await;
        let result = match serde_json::to_value(&snapshot) {
            Ok(value) => store.save(&value).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            warn!(backend = store.backend(), error = %e, "Failed to persist sessions");
        }
    }

    /// Load the stored snapshot; returns the number of restored sessions
    pub async fn restore(&self) -> Result<usize> {
        let Some(store) = &self.store else {
            return Ok(0);
        };
        let Some(value) = store.load().await? else {
            return Ok(0);
        };

        let snapshot = SessionSnapshot::from_value(value)?;
        let handles: Vec<SessionHandle> = snapshot
            .sessions
            .into_iter()
            .map(|s| SessionCell::new(s.upgrade(self.provider)))
            .collect();
        let count = handles.len();

        self.manager.write().await.restore(handles, snapshot.active_index);
        info!(backend = store.backend(), sessions = count, "Sessions restored");
        Ok(count)
    }
}
