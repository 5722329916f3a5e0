use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::repos::FetchSource;
use crate::application::snippets::{CreateSnippet, UpdateSnippet};
use crate::domain::snippets::Snippet;

use super::error::ApiError;
use super::HttpState;

#[derive(Debug, Deserialize)]
pub struct CreateSnippetRequest {
    pub content: String,
    #[serde(default)]
    pub expires_in_secs: u64,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSnippetRequest {
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// `0` clears the expiry; omitting the field keeps the stored deadline.
    pub expires_in_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub tag: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FetchedSnippetBody {
    pub snippet: Snippet,
    pub source: FetchSource,
}

#[derive(Debug, Serialize)]
pub struct SnippetListBody {
    pub snippets: Vec<Snippet>,
}

pub async fn create(
    State(state): State<HttpState>,
    Json(req): Json<CreateSnippetRequest>,
) -> Result<(StatusCode, Json<Snippet>), ApiError> {
    if req.content.trim().is_empty() {
        return Err(ApiError::bad_request("content must not be empty"));
    }
    let snippet = state
        .snippets
        .create(CreateSnippet {
            content: req.content,
            expires_in_secs: req.expires_in_secs,
            tags: req.tags,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(snippet)))
}

pub async fn fetch(
    State(state): State<HttpState>,
    Path(id): Path<Uuid>,
) -> Result<Json<FetchedSnippetBody>, ApiError> {
    let fetched = state.snippets.get(id).await?;
    Ok(Json(FetchedSnippetBody {
        snippet: fetched.snippet,
        source: fetched.source,
    }))
}

pub async fn update(
    State(state): State<HttpState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateSnippetRequest>,
) -> Result<Json<Snippet>, ApiError> {
    if req.content.trim().is_empty() {
        return Err(ApiError::bad_request("content must not be empty"));
    }
    let snippet = state
        .snippets
        .update(UpdateSnippet {
            id,
            content: req.content,
            tags: req.tags,
            expires_in_secs: req.expires_in_secs,
        })
        .await?;
    Ok(Json(snippet))
}

pub async fn list(
    State(state): State<HttpState>,
    Query(params): Query<ListParams>,
) -> Result<Json<SnippetListBody>, ApiError> {
    let snippets = state
        .snippets
        .list(
            params.page.unwrap_or(1),
            params.limit.unwrap_or(0),
            params.tag,
        )
        .await?;
    Ok(Json(SnippetListBody { snippets }))
}
