use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, FromRow, Row};

#[derive(Debug, Clone)]
pub struct NewBlogPost {
    pub author_id: String,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub content: String,
    pub published: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorRef {
    pub username: String,
}

/// Listing projection of a published post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPostSummary {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub author: AuthorRef,
}

/// A single published post, body included
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPost {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub author: AuthorRef,
}

impl<'r> FromRow<'r, PgRow> for BlogPost {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            slug: row.try_get("slug")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            content: row.try_get("content")?,
            created_at: row.try_get("created_at")?,
            author: AuthorRef {
                username: row.try_get("author_username")?,
            },
        })
    }
}

impl<'r> FromRow<'r, PgRow> for BlogPostSummary {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            slug: row.try_get("slug")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            created_at: row.try_get("created_at")?,
            author: AuthorRef {
                username: row.try_get("author_username")?,
            },
        })
    }
}
