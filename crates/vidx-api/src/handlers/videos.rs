//! Video listing and search handlers.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use validator::Validate;

use vidx_models::VideoListResponse;

use crate::error::ApiResult;
use crate::state::AppState;

/// Query parameters for `GET /videos`.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ListVideosQuery {
    #[validate(range(min = 1, message = "page must be greater than or equal to 1"))]
    pub page: Option<u32>,
    pub size: Option<u32>,
}

/// Query parameters for `GET /search`. Blank `q` is rejected by the query service.
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

/// List indexed videos, newest first.
pub async fn list_videos(
    State(state): State<AppState>,
    query: Result<Query<ListVideosQuery>, QueryRejection>,
) -> ApiResult<Json<VideoListResponse>> {
    let Query(query) = query?;
    query.validate()?;

    let response = state.query.list(query.page, query.size).await?;
    Ok(Json(response))
}

/// Fuzzy search over title and description.
pub async fn search_videos(
    State(state): State<AppState>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> ApiResult<Json<VideoListResponse>> {
    let Query(query) = query?;

    let response = state.query.search(query.q.as_deref()).await?;
    Ok(Json(response))
}
