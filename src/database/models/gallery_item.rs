use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, FromRow, Row};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MediaType {
    Image,
    Video,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "IMAGE",
            MediaType::Video => "VIDEO",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "IMAGE" => Some(MediaType::Image),
            "VIDEO" => Some(MediaType::Video),
            _ => None,
        }
    }
}

/// A single uploaded gallery entry. `user_id` is fixed at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryItem {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub file_url: String,
    pub media_type: MediaType,
    pub is_favorite: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewGalleryItem {
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub file_url: String,
    pub media_type: MediaType,
}

impl<'r> FromRow<'r, PgRow> for GalleryItem {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let media_type: String = row.try_get("media_type")?;
        let media_type = MediaType::parse(&media_type)
            .ok_or_else(|| sqlx::Error::Decode(format!("unknown media type '{}'", media_type).into()))?;

        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            file_url: row.try_get("file_url")?,
            media_type,
            is_favorite: row.try_get("is_favorite")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}
