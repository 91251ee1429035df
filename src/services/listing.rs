use std::sync::Arc;
use tracing::debug;

use crate::database::models::{BlogPostSummary, GalleryItem, User, UserFilter};
use crate::database::{GalleryFilter, Store, StoreError};
use crate::services::pagination::{paginate, Page, PageRequest};
use crate::types::Identity;

/// Which of the caller's gallery items a listing covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingScope {
    Owned,
    Favorites,
}

/// Paginated, newest-first listings over the store
#[derive(Clone)]
pub struct ListingService {
    store: Arc<dyn Store>,
}

impl ListingService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn gallery(
        &self,
        identity: &Identity,
        scope: ListingScope,
        request: PageRequest,
    ) -> Result<Page<GalleryItem>, StoreError> {
        let filter = match scope {
            ListingScope::Owned => GalleryFilter::owned_by(identity),
            ListingScope::Favorites => GalleryFilter::favorites_of(identity),
        };
        debug!(owner = %identity, ?scope, page = request.page, limit = request.limit, "listing gallery");

        paginate(
            request,
            self.store.count_gallery_items(&filter),
            self.store.list_gallery_items(&filter, request.window()),
        )
        .await
    }

    pub async fn users(&self, filter: &UserFilter, request: PageRequest) -> Result<Page<User>, StoreError> {
        paginate(
            request,
            self.store.count_users(filter),
            self.store.list_users(filter, request.window()),
        )
        .await
    }

    pub async fn published_posts(&self, request: PageRequest) -> Result<Page<BlogPostSummary>, StoreError> {
        paginate(
            request,
            self.store.count_published_posts(),
            self.store.list_published_posts(request.window()),
        )
        .await
    }
}
