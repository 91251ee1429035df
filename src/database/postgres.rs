use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::database::models::{BlogPost, BlogPostSummary, GalleryItem, NewBlogPost, NewGalleryItem, NewUser, User, UserFilter};
use crate::database::query_builder::{
    bind_param_query, bind_param_query_as, gallery_query, published_posts_query, users_query, QueryBuilder,
};
use crate::database::{GalleryFilter, PageWindow, Store, StoreError};

/// Schema applied by `gallery migrate`
pub const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

const GALLERY_COLUMNS: &str =
    "id, user_id, title, description, file_url, media_type, is_favorite, created_at, updated_at";

const USER_COLUMNS: &str = "id, email, username, phone_number, role, is_verified, is_approved, is_active, \
     reactivation_requested, reactivation_requested_at, deactivation_reason, created_at, updated_at";

/// Postgres-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let url = config
            .url
            .as_deref()
            .ok_or(StoreError::ConfigMissing("DATABASE_URL"))?;
        url::Url::parse(url).map_err(|_| StoreError::InvalidDatabaseUrl)?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(url)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        info!("Created database pool ({} max connections)", config.max_connections);
        Ok(Self { pool })
    }

    /// Applies `sql/schema.sql` one statement at a time
    pub async fn migrate(&self) -> Result<usize, StoreError> {
        let statements = split_sql_statements(SCHEMA_SQL);
        for statement in &statements {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(statements.len())
    }

    async fn fetch_all<T>(&self, query: &QueryBuilder) -> Result<Vec<T>, StoreError>
    where
        T: for<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> + Send + Unpin,
    {
        let sql_result = query.to_sql();
        let mut q = sqlx::query_as::<_, T>(&sql_result.query);
        for p in sql_result.params.iter() {
            q = bind_param_query_as(q, p);
        }
        Ok(q.fetch_all(&self.pool).await?)
    }

    async fn count(&self, query: &QueryBuilder) -> Result<u64, StoreError> {
        let sql_result = query.to_count_sql();
        let mut q = sqlx::query(&sql_result.query);
        for p in sql_result.params.iter() {
            q = bind_param_query(q, p);
        }
        let row = q.fetch_one(&self.pool).await?;
        let count: i64 = row.try_get("count")?;
        Ok(count.max(0) as u64)
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

/// Splits a schema file into individual statements. Assumes statements end
/// with `;` at the end of a line and never nest semicolons.
fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("--") {
            continue;
        }
        current.push_str(line);
        current.push('\n');

        if trimmed.ends_with(';') {
            let statement = current.trim();
            if !statement.is_empty() {
                statements.push(statement.to_string());
            }
            current.clear();
        }
    }

    let leftover = current.trim();
    if !leftover.is_empty() {
        statements.push(leftover.to_string());
    }

    statements
}

#[async_trait]
impl Store for PgStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_gallery_item(&self, item: NewGalleryItem) -> Result<GalleryItem, StoreError> {
        let sql = format!(
            "INSERT INTO gallery_items (id, user_id, title, description, file_url, media_type) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            GALLERY_COLUMNS
        );
        let row = sqlx::query_as::<_, GalleryItem>(&sql)
            .bind(Uuid::new_v4().to_string())
            .bind(&item.user_id)
            .bind(&item.title)
            .bind(&item.description)
            .bind(&item.file_url)
            .bind(item.media_type.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    async fn find_gallery_item(&self, id: &str) -> Result<Option<GalleryItem>, StoreError> {
        let sql = format!("SELECT {} FROM gallery_items WHERE id = $1", GALLERY_COLUMNS);
        let row = sqlx::query_as::<_, GalleryItem>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn list_gallery_items(
        &self,
        filter: &GalleryFilter,
        window: PageWindow,
    ) -> Result<Vec<GalleryItem>, StoreError> {
        self.fetch_all(&gallery_query(filter).window(window)).await
    }

    async fn count_gallery_items(&self, filter: &GalleryFilter) -> Result<u64, StoreError> {
        self.count(&gallery_query(filter)).await
    }

    async fn set_gallery_favorite(&self, id: &str, is_favorite: bool) -> Result<Option<GalleryItem>, StoreError> {
        let sql = format!(
            "UPDATE gallery_items SET is_favorite = $2, updated_at = now() WHERE id = $1 RETURNING {}",
            GALLERY_COLUMNS
        );
        let row = sqlx::query_as::<_, GalleryItem>(&sql)
            .bind(id)
            .bind(is_favorite)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn delete_gallery_item(&self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM gallery_items WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let sql = format!(
            "INSERT INTO users (id, email, username, phone_number, role, is_verified, is_approved, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4().to_string())
            .bind(&user.email)
            .bind(&user.username)
            .bind(&user.phone_number)
            .bind(user.role.as_str())
            .bind(user.is_verified)
            .bind(user.is_approved)
            .bind(user.is_active)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::Conflict(format!("user '{}' already exists", user.email))
                } else {
                    e.into()
                }
            })
    }

    async fn find_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql).bind(id).fetch_optional(&self.pool).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql).bind(email).fetch_optional(&self.pool).await?)
    }

    async fn find_user_by_email_or_username(&self, email: &str, username: &str) -> Result<Option<User>, StoreError> {
        let sql = format!(
            "SELECT {} FROM users WHERE email = $1 OR username = $2 LIMIT 1",
            USER_COLUMNS
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_users(&self, filter: &UserFilter, window: PageWindow) -> Result<Vec<User>, StoreError> {
        self.fetch_all(&users_query(filter).window(window)).await
    }

    async fn count_users(&self, filter: &UserFilter) -> Result<u64, StoreError> {
        self.count(&users_query(filter)).await
    }

    async fn request_reactivation(&self, user_id: &str, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE users SET reactivation_requested = true, reactivation_requested_at = $2, updated_at = now() \
             WHERE id = $1 AND is_active = false AND COALESCE(reactivation_requested, false) = false",
        )
        .bind(user_id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn set_user_active(
        &self,
        user_id: &str,
        active: bool,
        deactivation_reason: Option<String>,
    ) -> Result<Option<User>, StoreError> {
        let sql = format!(
            "UPDATE users SET is_active = $2, reactivation_requested = false, reactivation_requested_at = NULL, \
             deactivation_reason = $3, updated_at = now() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(user_id)
            .bind(active)
            .bind(deactivation_reason)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn set_user_approved(&self, user_id: &str) -> Result<Option<User>, StoreError> {
        let sql = format!(
            "UPDATE users SET is_approved = true, updated_at = now() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn insert_blog_post(&self, post: NewBlogPost) -> Result<BlogPostSummary, StoreError> {
        let row = sqlx::query_as::<_, BlogPostSummary>(
            "WITH inserted AS ( \
                INSERT INTO blog_posts (id, author_id, slug, title, description, content, published) \
                VALUES ($1, $2, $3, $4, $5, $6, $7) \
                RETURNING slug, title, description, created_at, author_id \
             ) \
             SELECT i.slug, i.title, i.description, i.created_at, u.username AS author_username \
             FROM inserted i JOIN users u ON u.id = i.author_id",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&post.author_id)
        .bind(&post.slug)
        .bind(&post.title)
        .bind(&post.description)
        .bind(&post.content)
        .bind(post.published)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Conflict(format!("slug '{}' already exists", post.slug))
            } else {
                e.into()
            }
        })?;
        Ok(row)
    }

    async fn list_published_posts(&self, window: PageWindow) -> Result<Vec<BlogPostSummary>, StoreError> {
        self.fetch_all(&published_posts_query().window(window)).await
    }

    async fn count_published_posts(&self) -> Result<u64, StoreError> {
        self.count(&published_posts_query()).await
    }

    async fn find_published_post(&self, slug: &str) -> Result<Option<BlogPost>, StoreError> {
        Ok(sqlx::query_as::<_, BlogPost>(
            "SELECT p.slug, p.title, p.description, p.content, p.created_at, u.username AS author_username \
             FROM blog_posts p JOIN users u ON u.id = p.author_id \
             WHERE p.slug = $1 AND p.published = true",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?)
    }
}
