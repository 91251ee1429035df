pub mod manager;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod query_builder;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::Identity;
use models::{BlogPost, BlogPostSummary, GalleryItem, NewBlogPost, NewGalleryItem, NewUser, User, UserFilter};

pub use manager::DatabaseManager;
pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Errors surfaced by any `Store` implementation
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("{0} not found")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Bounded slice of an ordered result set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub offset: u64,
    pub limit: u32,
}

/// Which gallery items a listing covers. Always scoped to one owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryFilter {
    pub owner: String,
    pub favorites_only: bool,
}

impl GalleryFilter {
    pub fn owned_by(identity: &Identity) -> Self {
        Self {
            owner: identity.as_str().to_string(),
            favorites_only: false,
        }
    }

    pub fn favorites_of(identity: &Identity) -> Self {
        Self {
            owner: identity.as_str().to_string(),
            favorites_only: true,
        }
    }

    pub fn matches(&self, item: &GalleryItem) -> bool {
        item.user_id == self.owner && (!self.favorites_only || item.is_favorite)
    }
}

/// Persistence boundary for every entity the API touches.
///
/// Listings are ordered newest first (`created_at` descending, later insertions
/// first on equal timestamps). Count and list are independent reads.
#[async_trait]
pub trait Store: Send + Sync {
    async fn health_check(&self) -> Result<(), StoreError>;

    // Gallery items
    async fn insert_gallery_item(&self, item: NewGalleryItem) -> Result<GalleryItem, StoreError>;
    async fn find_gallery_item(&self, id: &str) -> Result<Option<GalleryItem>, StoreError>;
    async fn list_gallery_items(
        &self,
        filter: &GalleryFilter,
        window: PageWindow,
    ) -> Result<Vec<GalleryItem>, StoreError>;
    async fn count_gallery_items(&self, filter: &GalleryFilter) -> Result<u64, StoreError>;
    /// Returns the updated item, or `None` when it no longer exists
    async fn set_gallery_favorite(&self, id: &str, is_favorite: bool) -> Result<Option<GalleryItem>, StoreError>;
    /// Returns whether a row was removed
    async fn delete_gallery_item(&self, id: &str) -> Result<bool, StoreError>;

    // Users
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError>;
    async fn find_user(&self, id: &str) -> Result<Option<User>, StoreError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_user_by_email_or_username(&self, email: &str, username: &str) -> Result<Option<User>, StoreError>;
    async fn list_users(&self, filter: &UserFilter, window: PageWindow) -> Result<Vec<User>, StoreError>;
    async fn count_users(&self, filter: &UserFilter) -> Result<u64, StoreError>;
    /// Flags a pending reactivation request, only if the account is inactive
    /// and has none pending. Returns whether this call made the transition.
    async fn request_reactivation(&self, user_id: &str, at: DateTime<Utc>) -> Result<bool, StoreError>;
    /// Sets the active flag and clears any pending reactivation request
    async fn set_user_active(
        &self,
        user_id: &str,
        active: bool,
        deactivation_reason: Option<String>,
    ) -> Result<Option<User>, StoreError>;
    /// Marks the account approved, returning `None` when it does not exist
    async fn set_user_approved(&self, user_id: &str) -> Result<Option<User>, StoreError>;

    // Blog
    async fn insert_blog_post(&self, post: NewBlogPost) -> Result<BlogPostSummary, StoreError>;
    async fn list_published_posts(&self, window: PageWindow) -> Result<Vec<BlogPostSummary>, StoreError>;
    async fn count_published_posts(&self) -> Result<u64, StoreError>;
    /// Drafts are never returned
    async fn find_published_post(&self, slug: &str) -> Result<Option<BlogPost>, StoreError>;
}
