use serde::Serialize;
use std::future::Future;

use crate::config::ApiConfig;
use crate::database::{PageWindow, StoreError};

/// Raw `page` / `limit` query parameters, kept as text so that malformed
/// values fall back to defaults instead of rejecting the request.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PageQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl PageQuery {
    /// Reads `page` and `limit` from a raw query string. The first occurrence
    /// of a repeated key wins and unrelated keys are ignored.
    pub fn parse(raw: Option<&str>) -> Self {
        let mut query = Self::default();
        for (key, value) in url::form_urlencoded::parse(raw.unwrap_or_default().as_bytes()) {
            match key.as_ref() {
                "page" if query.page.is_none() => query.page = Some(value.into_owned()),
                "limit" if query.limit.is_none() => query.limit = Some(value.into_owned()),
                _ => {}
            }
        }
        query
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u32,
}

impl PageRequest {
    pub fn new(page: u64, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.max(1),
        }
    }

    /// Coerces raw query values. Leading digits are honoured ("2abc" is page 2);
    /// anything without them, or zero, takes the default. Limits are capped at
    /// the configured maximum.
    pub fn from_query(query: &PageQuery, api: &ApiConfig) -> Self {
        let page = query.page.as_deref().and_then(leading_integer).unwrap_or(1);
        let limit = query
            .limit
            .as_deref()
            .and_then(leading_integer)
            .map(|l| l.min(api.max_page_size as u64) as u32)
            .unwrap_or(api.default_page_size);
        Self::new(page, limit)
    }

    pub fn window(&self) -> PageWindow {
        PageWindow {
            offset: (self.page - 1).saturating_mul(self.limit as u64),
            limit: self.limit,
        }
    }
}

/// Positive integer prefix of `raw`, saturating on overflow
fn leading_integer(raw: &str) -> Option<u64> {
    let trimmed = raw.trim_start();
    let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let end = digits.find(|c: char| !c.is_ascii_digit()).unwrap_or(digits.len());
    let digits = &digits[..end];
    if digits.is_empty() {
        return None;
    }
    let value = digits.parse::<u64>().unwrap_or(u64::MAX);
    (value > 0).then_some(value)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_items: u64,
    pub current_page: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total_items: u64, request: PageRequest) -> Self {
        Self {
            items,
            total_items,
            current_page: request.page,
            total_pages: total_items.div_ceil(request.limit as u64),
        }
    }
}

/// Runs the count and the windowed fetch concurrently. The two reads are not
/// isolated from each other, so a write landing between them can make
/// `total_items` disagree with `items`.
pub async fn paginate<T, C, L>(request: PageRequest, count: C, list: L) -> Result<Page<T>, StoreError>
where
    C: Future<Output = Result<u64, StoreError>>,
    L: Future<Output = Result<Vec<T>, StoreError>>,
{
    let (total, items) = futures::try_join!(count, list)?;
    Ok(Page::new(items, total, request))
}
