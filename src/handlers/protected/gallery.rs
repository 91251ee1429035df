use axum::{
    body::Bytes,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, Path, RawQuery, State,
    },
    http::StatusCode,
    Extension, Json,
};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::app::AppState;
use crate::auth::AuthUser;
use crate::database::models::{GalleryItem, MediaType, NewGalleryItem};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::{GalleryMutation, ListingScope, MutationOutcome, Page, PageQuery, PageRequest};

fn page_request(state: &AppState, raw: Option<String>) -> PageRequest {
    PageRequest::from_query(&PageQuery::parse(raw.as_deref()), &state.api)
}

fn item_id(id: &str) -> Result<&str, ApiError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(ApiError::bad_request("Invalid item ID"));
    }
    Ok(id)
}

/// GET /api/gallery - the caller's items, newest first
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    RawQuery(raw): RawQuery,
) -> ApiResult<Page<GalleryItem>> {
    let request = page_request(&state, raw);
    let page = state.listing.gallery(&user.identity, ListingScope::Owned, request).await?;
    Ok(ApiResponse::success(page))
}

/// GET /api/gallery/favorites - the caller's favourite items
pub async fn favorites(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    RawQuery(raw): RawQuery,
) -> Result<Json<Page<GalleryItem>>, ApiError> {
    let request = page_request(&state, raw);
    let page = state
        .listing
        .gallery(&user.identity, ListingScope::Favorites, request)
        .await?;
    Ok(Json(page))
}

/// DELETE /api/gallery/:id - remove an owned item and its media file
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    let id = item_id(&id)?;
    state.mutations.mutate(&user.identity, id, GalleryMutation::Delete).await?;
    Ok(ApiResponse::ok())
}

/// PUT /api/gallery/:id/favorite - body `{"isFavorite": bool}`
pub async fn favorite(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Value> {
    let id = item_id(&id)?;
    let mutation = GalleryMutation::favorite_from_body(&body)?;

    match state.mutations.mutate(&user.identity, id, mutation).await? {
        MutationOutcome::Updated(item) => Ok(ApiResponse::success(json!({ "item": item }))),
        MutationOutcome::Deleted => Err(ApiError::internal()),
    }
}

#[derive(Default)]
struct UploadForm {
    file: Option<(String, Bytes)>,
    title: Option<String>,
    description: Option<String>,
    media_type: Option<String>,
}

/// POST /api/gallery/upload - multipart `file`, `title`, `mediaType`, `description`
pub async fn upload(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Value> {
    let mut multipart = multipart.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let limit = state.files.max_bytes();
    let form = read_form(&mut multipart, limit).await?;

    let (mime, data) = form.file.ok_or_else(|| ApiError::bad_request("No file uploaded"))?;
    let title = form.title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
    let media_type = form.media_type.as_deref().and_then(MediaType::parse);
    let (Some(title), Some(media_type)) = (title, media_type) else {
        return Err(ApiError::bad_request("Invalid title or media type"));
    };

    let file_url = state.files.save_upload(&mime, &data).await?;
    let record = NewGalleryItem {
        user_id: user.identity.as_str().to_string(),
        title,
        description: form.description.unwrap_or_default(),
        file_url: file_url.clone(),
        media_type,
    };

    let item = match state.store.insert_gallery_item(record).await {
        Ok(item) => item,
        Err(e) => {
            if let Err(cleanup) = state.files.remove(&file_url).await {
                warn!(error = %cleanup, file_url = %file_url, "could not remove orphaned upload");
            }
            return Err(e.into());
        }
    };

    info!(item_id = %item.id, owner = %user.identity, "gallery item uploaded");
    Ok(ApiResponse::success(json!({ "item": item })))
}

async fn read_form(multipart: &mut Multipart, limit: usize) -> Result<UploadForm, ApiError> {
    let read_error = |e: MultipartError| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::payload_too_large(format!("File exceeds the {} byte upload limit", limit))
        } else {
            ApiError::bad_request(e.body_text())
        }
    };

    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await.map_err(read_error)? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("file") if form.file.is_none() => {
                let mime = field.content_type().unwrap_or("application/octet-stream").to_string();
                let data = field.bytes().await.map_err(read_error)?;
                form.file = Some((mime, data));
            }
            Some("title") => form.title = Some(field.text().await.map_err(read_error)?),
            Some("description") => form.description = Some(field.text().await.map_err(read_error)?),
            Some("mediaType") => form.media_type = Some(field.text().await.map_err(read_error)?),
            _ => {}
        }
    }
    Ok(form)
}
