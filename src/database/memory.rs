use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::database::models::{
    AuthorRef, BlogPost, BlogPostSummary, GalleryItem, NewBlogPost, NewGalleryItem, NewUser, User, UserFilter,
};
use crate::database::{GalleryFilter, PageWindow, Store, StoreError};

struct StoredPost {
    author_id: String,
    slug: String,
    title: String,
    description: String,
    content: String,
    published: bool,
    created_at: DateTime<Utc>,
}

/// Rows keep the insertion sequence next to the record so equal timestamps
/// still order deterministically.
#[derive(Default)]
struct Tables {
    next_seq: u64,
    gallery: Vec<(u64, GalleryItem)>,
    users: Vec<(u64, User)>,
    posts: Vec<(u64, StoredPost)>,
}

impl Tables {
    fn seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn author(&self, author_id: &str) -> AuthorRef {
        let username = self
            .users
            .iter()
            .find(|(_, u)| u.id == author_id)
            .map(|(_, u)| u.username.clone())
            .unwrap_or_default();
        AuthorRef { username }
    }
}

/// Newest first, later insertions first on equal timestamps, then the window
fn page_of<'a, T: 'a>(
    rows: impl Iterator<Item = (u64, DateTime<Utc>, &'a T)>,
    window: PageWindow,
) -> Vec<&'a T> {
    let mut rows: Vec<_> = rows.collect();
    rows.sort_by_key(|(seq, created_at, _)| (Reverse(*created_at), Reverse(*seq)));
    rows.into_iter()
        .skip(usize::try_from(window.offset).unwrap_or(usize::MAX))
        .take(window.limit as usize)
        .map(|(_, _, row)| row)
        .collect()
}

/// In-process store used by the development profile and the test suite
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn insert_gallery_item(&self, item: NewGalleryItem) -> Result<GalleryItem, StoreError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let record = GalleryItem {
            id: Uuid::new_v4().to_string(),
            user_id: item.user_id,
            title: item.title,
            description: item.description,
            file_url: item.file_url,
            media_type: item.media_type,
            is_favorite: false,
            created_at: now,
            updated_at: now,
        };
        let seq = tables.seq();
        tables.gallery.push((seq, record.clone()));
        Ok(record)
    }

    async fn find_gallery_item(&self, id: &str) -> Result<Option<GalleryItem>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.gallery.iter().find(|(_, g)| g.id == id).map(|(_, g)| g.clone()))
    }

    async fn list_gallery_items(
        &self,
        filter: &GalleryFilter,
        window: PageWindow,
    ) -> Result<Vec<GalleryItem>, StoreError> {
        let tables = self.tables.read().await;
        let rows = tables
            .gallery
            .iter()
            .filter(|(_, g)| filter.matches(g))
            .map(|(seq, g)| (*seq, g.created_at, g));
        Ok(page_of(rows, window).into_iter().cloned().collect())
    }

    async fn count_gallery_items(&self, filter: &GalleryFilter) -> Result<u64, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.gallery.iter().filter(|(_, g)| filter.matches(g)).count() as u64)
    }

    async fn set_gallery_favorite(&self, id: &str, is_favorite: bool) -> Result<Option<GalleryItem>, StoreError> {
        let mut tables = self.tables.write().await;
        Ok(tables.gallery.iter_mut().find(|(_, g)| g.id == id).map(|(_, g)| {
            g.is_favorite = is_favorite;
            g.updated_at = Utc::now();
            g.clone()
        }))
    }

    async fn delete_gallery_item(&self, id: &str) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let before = tables.gallery.len();
        tables.gallery.retain(|(_, g)| g.id != id);
        Ok(tables.gallery.len() < before)
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;
        if tables
            .users
            .iter()
            .any(|(_, u)| u.email == user.email || u.username == user.username)
        {
            return Err(StoreError::Conflict(format!("user '{}' already exists", user.email)));
        }

        let now = Utc::now();
        let record = User {
            id: Uuid::new_v4().to_string(),
            email: user.email,
            username: user.username,
            phone_number: user.phone_number,
            role: user.role,
            is_verified: user.is_verified,
            is_approved: user.is_approved,
            is_active: user.is_active,
            reactivation_requested: Some(false),
            reactivation_requested_at: None,
            deactivation_reason: None,
            created_at: now,
            updated_at: now,
        };
        let seq = tables.seq();
        tables.users.push((seq, record.clone()));
        Ok(record)
    }

    async fn find_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|(_, u)| u.id == id).map(|(_, u)| u.clone()))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|(_, u)| u.email == email).map(|(_, u)| u.clone()))
    }

    async fn find_user_by_email_or_username(&self, email: &str, username: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .find(|(_, u)| u.email == email || u.username == username)
            .map(|(_, u)| u.clone()))
    }

    async fn list_users(&self, filter: &UserFilter, window: PageWindow) -> Result<Vec<User>, StoreError> {
        let tables = self.tables.read().await;
        let rows = tables
            .users
            .iter()
            .filter(|(_, u)| filter.matches(u))
            .map(|(seq, u)| (*seq, u.created_at, u));
        Ok(page_of(rows, window).into_iter().cloned().collect())
    }

    async fn count_users(&self, filter: &UserFilter) -> Result<u64, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().filter(|(_, u)| filter.matches(u)).count() as u64)
    }

    async fn request_reactivation(&self, user_id: &str, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let Some((_, user)) = tables.users.iter_mut().find(|(_, u)| u.id == user_id) else {
            return Ok(false);
        };
        if user.is_active != Some(false) || user.reactivation_requested.unwrap_or(false) {
            return Ok(false);
        }
        user.reactivation_requested = Some(true);
        user.reactivation_requested_at = Some(at);
        user.updated_at = Utc::now();
        Ok(true)
    }

    async fn set_user_active(
        &self,
        user_id: &str,
        active: bool,
        deactivation_reason: Option<String>,
    ) -> Result<Option<User>, StoreError> {
        let mut tables = self.tables.write().await;
        Ok(tables.users.iter_mut().find(|(_, u)| u.id == user_id).map(|(_, u)| {
            u.is_active = Some(active);
            u.reactivation_requested = Some(false);
            u.reactivation_requested_at = None;
            u.deactivation_reason = deactivation_reason;
            u.updated_at = Utc::now();
            u.clone()
        }))
    }

    async fn set_user_approved(&self, user_id: &str) -> Result<Option<User>, StoreError> {
        let mut tables = self.tables.write().await;
        Ok(tables.users.iter_mut().find(|(_, u)| u.id == user_id).map(|(_, u)| {
            u.is_approved = true;
            u.updated_at = Utc::now();
            u.clone()
        }))
    }

    async fn insert_blog_post(&self, post: NewBlogPost) -> Result<BlogPostSummary, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.posts.iter().any(|(_, p)| p.slug == post.slug) {
            return Err(StoreError::Conflict(format!("slug '{}' already exists", post.slug)));
        }
        if !tables.users.iter().any(|(_, u)| u.id == post.author_id) {
            return Err(StoreError::NotFound(format!("Author {}", post.author_id)));
        }

        let stored = StoredPost {
            author_id: post.author_id,
            slug: post.slug,
            title: post.title,
            description: post.description,
            content: post.content,
            published: post.published,
            created_at: Utc::now(),
        };
        let summary = BlogPostSummary {
            slug: stored.slug.clone(),
            title: stored.title.clone(),
            description: stored.description.clone(),
            created_at: stored.created_at,
            author: tables.author(&stored.author_id),
        };
        let seq = tables.seq();
        tables.posts.push((seq, stored));
        Ok(summary)
    }

    async fn list_published_posts(&self, window: PageWindow) -> Result<Vec<BlogPostSummary>, StoreError> {
        let tables = self.tables.read().await;
        let rows = tables
            .posts
            .iter()
            .filter(|(_, p)| p.published)
            .map(|(seq, p)| (*seq, p.created_at, p));
        Ok(page_of(rows, window)
            .into_iter()
            .map(|p| BlogPostSummary {
                slug: p.slug.clone(),
                title: p.title.clone(),
                description: p.description.clone(),
                created_at: p.created_at,
                author: tables.author(&p.author_id),
            })
            .collect())
    }

    async fn count_published_posts(&self) -> Result<u64, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.posts.iter().filter(|(_, p)| p.published).count() as u64)
    }

    async fn find_published_post(&self, slug: &str) -> Result<Option<BlogPost>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .posts
            .iter()
            .find(|(_, p)| p.published && p.slug == slug)
            .map(|(_, p)| BlogPost {
                slug: p.slug.clone(),
                title: p.title.clone(),
                description: p.description.clone(),
                content: p.content.clone(),
                created_at: p.created_at,
                author: tables.author(&p.author_id),
            }))
    }
}
