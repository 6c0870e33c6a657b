//! Session management handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use citenet_common::errors::{AppError, Result};
use citenet_engine::{
    AuthorCollaborationGraph, CompletenessReport, SessionBuild, SessionSummary, SessionView,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;

/// Create a session around a seed article
#[derive(Debug, Deserialize, Validate)]
pub struct CreateSessionRequest {
    /// DOI or provider-native identifier, in any accepted spelling
    #[validate(length(min = 1, max = 512))]
    pub id: String,
}

/// Create a session from a pasted identifier list
#[derive(Debug, Deserialize, Validate)]
pub struct ImportSessionRequest {
    #[validate(length(min = 1, max = 1000))]
    pub identifiers: Vec<String>,

    #[validate(length(min = 1, max = 200))]
    pub label: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SuggestionLimitsRequest {
    pub incoming: Option<usize>,
    pub outgoing: Option<usize>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AuthorsQuery {
    #[validate(range(min = 1))]
    pub min_publications: Option<usize>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionListResponse {
    pub active_index: Option<usize>,
    pub sessions: Vec<SessionSummary>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseSessionResponse {
    pub active_index: Option<usize>,
}

fn validate<T: Validate>(request: &T) -> Result<()> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })
}

/// Render the new session straight from its handle; the index may already
/// point elsewhere if an eviction ran in between
async fn created(build: SessionBuild) -> (StatusCode, Json<SessionView>) {
    let view = SessionView::build(build.index, &*build.handle.read().await);
    tracing::info!(
        index = build.index,
        session_id = %view.session_id,
        input = view.input.len(),
        "Session opened"
    );
    (StatusCode::CREATED, Json(view))
}

/// List open sessions
pub async fn list_sessions(State(state): State<AppState>) -> Json<SessionListResponse> {
    Json(SessionListResponse {
        active_index: state.explorer.active_index().await,
        sessions: state.explorer.list().await,
    })
}

/// Open a session from a seed identifier
///
/// Responds as soon as the input set is built; suggestions keep loading
/// and show up in later `GET /sessions/{index}` responses.
pub async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionView>)> {
    validate(&request)?;
    let build = state.explorer.create_from_seed(&request.id).await?;
    Ok(created(build).await)
}

/// Open a session from an identifier list
pub async fn import_session(
    State(state): State<AppState>,
    Json(request): Json<ImportSessionRequest>,
) -> Result<(StatusCode, Json<SessionView>)> {
    validate(&request)?;
    let build = state
        .explorer
        .create_from_identifier_list(&request.identifiers, request.label)
        .await?;
    Ok(created(build).await)
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> Result<Json<SessionView>> {
    Ok(Json(state.explorer.view(index).await?))
}

pub async fn close_session(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> Result<Json<CloseSessionResponse>> {
    let active_index = state.explorer.close(index).await?;
    tracing::info!(index, active_index = ?active_index, "Session closed");
    Ok(Json(CloseSessionResponse { active_index }))
}

pub async fn activate_session(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> Result<Json<SessionView>> {
    Ok(Json(state.explorer.switch_to(index).await?))
}

/// Change how many ranked suggestions are shown per direction
pub async fn set_suggestion_limits(
    State(state): State<AppState>,
    Path(index): Path<usize>,
    Json(request): Json<SuggestionLimitsRequest>,
) -> Result<Json<SessionView>> {
    validate(&request)?;
    let view = state
        .explorer
        .set_suggestion_limits(index, request.incoming, request.outgoing)
        .await?;
    Ok(Json(view))
}

/// Co-authorship graph over the session's articles
pub async fn get_authors(
    State(state): State<AppState>,
    Path(index): Path<usize>,
    Query(query): Query<AuthorsQuery>,
) -> Result<Json<AuthorCollaborationGraph>> {
    validate(&query)?;
    let graph = state
        .explorer
        .collaboration(index, query.min_publications)
        .await?;
    Ok(Json(graph))
}

pub async fn get_completeness(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> Result<Json<CompletenessReport>> {
    Ok(Json(state.explorer.completeness(index).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use citenet_common::{AppConfig, Article, ArticleId, ProviderKind};
    use citenet_engine::{ExplorerService, MockConnector};
    use std::sync::Arc;

    fn article(id: &str, refs: &[&str]) -> Article {
        let mut a = Article::new(ArticleId::new(id));
        a.year = Some(2020);
        a.references = refs.iter().map(|r| Some(ArticleId::new(r))).collect();
        a
    }

    #[tokio::test]
    async fn test_created_response_survives_eviction() {
        let articles = vec![
            article("10.1234/first", &["10.1234/a"]),
            article("10.1234/second", &["10.1234/a"]),
            article("10.1234/a", &[]),
        ];
        let connector = Arc::new(MockConnector::with_articles(ProviderKind::Crossref, &articles));
        let mut config = AppConfig::default();
        config.sessions.max_sessions = 1;
        let explorer = Arc::new(ExplorerService::new(connector, &config, None));

        let first = explorer.create_from_seed("10.1234/first").await.unwrap();
        let first_id = first.handle.id();
        // evicts `first`; index 0 now belongs to the second session
        let second = explorer.create_from_seed("10.1234/second").await.unwrap();
        assert_eq!(second.index, 0);

        let (status, Json(view)) = created(first).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(view.session_id, first_id);
        assert_eq!(view.index, 0);
        assert_eq!(view.source.map(|s| s.id), Some(ArticleId::new("10.1234/first")));

        let (_, Json(view)) = created(second).await;
        assert_ne!(view.session_id, first_id);
    }
}
