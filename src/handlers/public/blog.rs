use axum::{
    extract::{Path, RawQuery, State},
    Json,
};

use crate::app::AppState;
use crate::database::models::{BlogPost, BlogPostSummary};
use crate::error::ApiError;
use crate::services::{Page, PageQuery, PageRequest};

/// GET /api/blog - published posts, newest first
pub async fn list(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> Result<Json<Page<BlogPostSummary>>, ApiError> {
    let request = PageRequest::from_query(&PageQuery::parse(raw.as_deref()), &state.api);
    let page = state.listing.published_posts(request).await?;
    Ok(Json(page))
}

/// GET /api/blog/:slug - one published post with its body
pub async fn show(State(state): State<AppState>, Path(slug): Path<String>) -> Result<Json<BlogPost>, ApiError> {
    let post = state
        .store
        .find_published_post(&slug)
        .await?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;
    Ok(Json(post))
}
