use sqlx::{self, postgres::PgArguments, FromRow};

use crate::database::{GalleryFilter, PageWindow};
use crate::database::models::{UserFilter, UserStatusFilter};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// A bound `$n` value. Only the column types the listings filter on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlParam {
    Text(String),
    Bool(bool),
    Int(i64),
}

impl From<String> for SqlParam {
    fn from(value: String) -> Self {
        SqlParam::Text(value)
    }
}

impl From<&str> for SqlParam {
    fn from(value: &str) -> Self {
        SqlParam::Text(value.to_string())
    }
}

impl From<bool> for SqlParam {
    fn from(value: bool) -> Self {
        SqlParam::Bool(value)
    }
}

impl From<i64> for SqlParam {
    fn from(value: i64) -> Self {
        SqlParam::Int(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<SqlParam>,
}

/// Renders parameterised SELECT / COUNT statements.
///
/// Table and column names are compile-time constants; every caller-supplied
/// value goes through a `$n` placeholder.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    from: &'static str,
    columns: &'static str,
    conditions: Vec<String>,
    params: Vec<SqlParam>,
    order: Vec<(&'static str, SortDirection)>,
    window: Option<PageWindow>,
}

impl QueryBuilder {
    pub fn new(from: &'static str) -> Self {
        Self {
            from,
            columns: "*",
            conditions: Vec::new(),
            params: Vec::new(),
            order: Vec::new(),
            window: None,
        }
    }

    pub fn select(mut self, columns: &'static str) -> Self {
        self.columns = columns;
        self
    }

    fn bind(&mut self, value: SqlParam) -> String {
        self.params.push(value);
        format!("${}", self.params.len())
    }

    pub fn where_eq(mut self, column: &'static str, value: impl Into<SqlParam>) -> Self {
        let placeholder = self.bind(value.into());
        self.conditions.push(format!("{} = {}", column, placeholder));
        self
    }

    /// Case-sensitive substring match against any of `columns`
    pub fn where_contains_any(mut self, columns: &[&'static str], needle: &str) -> Self {
        let placeholder = self.bind(SqlParam::Text(format!("%{}%", escape_like(needle))));
        let alternatives: Vec<String> = columns
            .iter()
            .map(|c| format!("{} LIKE {} ESCAPE '\\'", c, placeholder))
            .collect();
        self.conditions.push(format!("({})", alternatives.join(" OR ")));
        self
    }

    pub fn order_by(mut self, column: &'static str, direction: SortDirection) -> Self {
        self.order.push((column, direction));
        self
    }

    pub fn window(mut self, window: PageWindow) -> Self {
        self.window = Some(window);
        self
    }

    fn where_sql(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        }
    }

    pub fn to_sql(&self) -> SqlResult {
        let mut builder = self.clone();
        let mut query = format!("SELECT {} FROM {}{}", builder.columns, builder.from, builder.where_sql());

        if !builder.order.is_empty() {
            let order: Vec<String> = builder
                .order
                .iter()
                .map(|(column, dir)| format!("{} {}", column, dir.to_sql()))
                .collect();
            query.push_str(&format!(" ORDER BY {}", order.join(", ")));
        }

        if let Some(window) = builder.window {
            let limit = builder.bind(SqlParam::Int(i64::from(window.limit)));
            let offset = builder.bind(SqlParam::Int(i64::try_from(window.offset).unwrap_or(i64::MAX)));
            query.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset));
        }

        SqlResult {
            query,
            params: builder.params,
        }
    }

    pub fn to_count_sql(&self) -> SqlResult {
        SqlResult {
            query: format!("SELECT COUNT(*) AS count FROM {}{}", self.from, self.where_sql()),
            params: self.params.clone(),
        }
    }
}

fn escape_like(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

pub fn gallery_query(filter: &GalleryFilter) -> QueryBuilder {
    let query = QueryBuilder::new("gallery_items")
        .select("id, user_id, title, description, file_url, media_type, is_favorite, created_at, updated_at")
        .where_eq("user_id", filter.owner.clone());

    let query = if filter.favorites_only {
        query.where_eq("is_favorite", true)
    } else {
        query
    };

    query
        .order_by("created_at", SortDirection::Desc)
        .order_by("seq", SortDirection::Desc)
}

pub fn users_query(filter: &UserFilter) -> QueryBuilder {
    let mut query = QueryBuilder::new("users").select(
        "id, email, username, phone_number, role, is_verified, is_approved, is_active, \
         reactivation_requested, reactivation_requested_at, deactivation_reason, created_at, updated_at",
    );

    if let Some(search) = &filter.search {
        query = query.where_contains_any(&["email", "username"], search);
    }
    query = match filter.status {
        Some(UserStatusFilter::Verified) => query.where_eq("is_verified", true),
        Some(UserStatusFilter::Unverified) => query.where_eq("is_verified", false),
        Some(UserStatusFilter::Approved) => query.where_eq("is_approved", true),
        Some(UserStatusFilter::Unapproved) => query.where_eq("is_approved", false),
        Some(UserStatusFilter::PendingApproval) => query.where_eq("is_verified", true).where_eq("is_approved", false),
        None => query,
    };
    if let Some(role) = filter.role {
        query = query.where_eq("role", role.as_str());
    }

    query
        .order_by("created_at", SortDirection::Desc)
        .order_by("seq", SortDirection::Desc)
}

pub fn published_posts_query() -> QueryBuilder {
    QueryBuilder::new("blog_posts p JOIN users u ON u.id = p.author_id")
        .select("p.slug, p.title, p.description, p.created_at, u.username AS author_username")
        .where_eq("p.published", true)
        .order_by("p.created_at", SortDirection::Desc)
        .order_by("p.seq", SortDirection::Desc)
}

pub fn bind_param_query<'q>(
    q: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    param: &'q SqlParam,
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    match param {
        SqlParam::Text(s) => q.bind(s),
        SqlParam::Bool(b) => q.bind(*b),
        SqlParam::Int(i) => q.bind(*i),
    }
}

pub fn bind_param_query_as<'q, O>(
    q: sqlx::query::QueryAs<'q, sqlx::Postgres, O, PgArguments>,
    param: &'q SqlParam,
) -> sqlx::query::QueryAs<'q, sqlx::Postgres, O, PgArguments>
where
    O: for<'r> FromRow<'r, sqlx::postgres::PgRow>,
{
    match param {
        SqlParam::Text(s) => q.bind(s),
        SqlParam::Bool(b) => q.bind(*b),
        SqlParam::Int(i) => q.bind(*i),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Identity, Role};

    #[test]
    fn gallery_listing_is_owner_scoped_and_windowed() {
        let filter = GalleryFilter::owned_by(&Identity::new("u1"));
        let sql = gallery_query(&filter).window(PageWindow { offset: 10, limit: 10 }).to_sql();
        assert_eq!(
            sql.query,
            "SELECT id, user_id, title, description, file_url, media_type, is_favorite, created_at, updated_at \
             FROM gallery_items WHERE user_id = $1 ORDER BY created_at DESC, seq DESC LIMIT $2 OFFSET $3"
        );
        assert_eq!(sql.params, vec![SqlParam::from("u1"), SqlParam::Int(10), SqlParam::Int(10)]);
    }

    #[test]
    fn favorites_count_shares_the_listing_filter() {
        let filter = GalleryFilter::favorites_of(&Identity::new("u1"));
        let sql = gallery_query(&filter).to_count_sql();
        assert_eq!(
            sql.query,
            "SELECT COUNT(*) AS count FROM gallery_items WHERE user_id = $1 AND is_favorite = $2"
        );
        assert_eq!(sql.params, vec![SqlParam::from("u1"), SqlParam::Bool(true)]);
    }

    #[test]
    fn user_search_escapes_like_wildcards() {
        let filter = UserFilter {
            search: Some("50%_off".into()),
            status: Some(UserStatusFilter::Unverified),
            role: Some(Role::Admin),
        };
        let sql = users_query(&filter).to_count_sql();
        assert!(sql.query.contains("(email LIKE $1 ESCAPE '\\' OR username LIKE $1 ESCAPE '\\')"));
        assert!(sql.query.contains("is_verified = $2 AND role = $3"));
        assert_eq!(sql.params, vec![SqlParam::from("%50\\%\\_off%"), SqlParam::Bool(false), SqlParam::from("ADMIN")]);
    }

    #[test]
    fn published_posts_join_authors() {
        let sql = published_posts_query().window(PageWindow { offset: 0, limit: 5 }).to_sql();
        assert!(sql.query.starts_with("SELECT p.slug, p.title, p.description, p.created_at, u.username AS author_username FROM blog_posts p JOIN users u"));
        assert!(sql.query.ends_with("ORDER BY p.created_at DESC, p.seq DESC LIMIT $2 OFFSET $3"));
    }

    #[test]
    fn pending_approval_filters_on_both_flags() {
        let sql = users_query(&UserFilter::pending_approval()).to_count_sql();
        assert!(sql.query.ends_with("WHERE is_verified = $1 AND is_approved = $2 AND role = $3"));
        assert_eq!(
            sql.params,
            vec![SqlParam::Bool(true), SqlParam::Bool(false), SqlParam::from("USER")]
        );
    }

    #[test]
    fn huge_offset_binds_as_max_bigint() {
        let filter = GalleryFilter::owned_by(&Identity::new("u1"));
        let sql = gallery_query(&filter)
            .window(PageWindow { offset: u64::MAX, limit: 10 })
            .to_sql();
        assert_eq!(sql.params.last(), Some(&SqlParam::Int(i64::MAX)));
    }
}
