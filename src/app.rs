use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{from_fn_with_state, map_response},
    response::{IntoResponse, Json},
    routing::{delete, get, post, put},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::auth::TokenVerifier;
use crate::config::{ApiConfig, AppConfig};
use crate::database::Store;
use crate::error::ApiError;
use crate::handlers::{elevated, protected, public};
use crate::middleware::{json_method_not_allowed, require_auth, Authenticator, TokenSource};
use crate::services::{AccountLifecycle, AdminNotifier, ListingService, LogNotifier, MutationService};
use crate::storage::FileStore;
use crate::types::Role;

/// Multipart framing on top of the file itself
const UPLOAD_OVERHEAD_BYTES: usize = 64 * 1024;

/// Shared, request-independent dependencies. Everything mutable lives in the store.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub verifier: Arc<TokenVerifier>,
    pub files: FileStore,
    pub listing: ListingService,
    pub mutations: MutationService,
    pub accounts: AccountLifecycle,
    pub api: ApiConfig,
    pub auth_cookie: String,
    pub cors_origins: Vec<String>,
    pub health_timeout: Duration,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: &AppConfig) -> Self {
        let files = FileStore::from_config(&config.storage, &config.api);
        Self {
            verifier: Arc::new(TokenVerifier::from_config(&config.security)),
            listing: ListingService::new(store.clone()),
            mutations: MutationService::new(store.clone(), files.clone()),
            accounts: AccountLifecycle::new(store.clone(), Arc::new(LogNotifier)),
            files,
            store,
            api: config.api.clone(),
            auth_cookie: config.security.auth_cookie.clone(),
            cors_origins: config.security.cors_origins.clone(),
            health_timeout: Duration::from_secs(config.database.health_timeout_secs),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn AdminNotifier>) -> Self {
        self.accounts = AccountLifecycle::new(self.store.clone(), notifier);
        self
    }

    fn authenticator(&self, source: TokenSource) -> Authenticator {
        Authenticator::new(self.verifier.clone(), &self.auth_cookie).source(source)
    }
}

pub fn app(state: AppState, request_logging: bool) -> Router {
    let router = Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(public_routes())
        // Protected
        .merge(gallery_routes(&state))
        .merge(auth_routes(&state))
        // Elevated
        .merge(admin_routes(&state))
        .fallback(not_found)
        .layer(map_response(json_method_not_allowed))
        .layer(cors_layer(&state.cors_origins))
        .with_state(state);

    if request_logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/api/users/request-reactivation", post(public::users_request_reactivation))
        .route("/api/blog", get(public::blog_list))
        .route("/api/blog/:slug", get(public::blog_show))
}

fn gallery_routes(state: &AppState) -> Router<AppState> {
    let upload_limit = state.files.max_bytes() + UPLOAD_OVERHEAD_BYTES;

    let cookie_only = Router::new()
        .route("/api/gallery", get(protected::gallery_list))
        .route_layer(from_fn_with_state(state.authenticator(TokenSource::Cookie), require_auth));

    let bearer_only = Router::new()
        .route("/api/gallery/favorites", get(protected::gallery_favorites))
        .route_layer(from_fn_with_state(state.authenticator(TokenSource::Bearer), require_auth));

    let either = Router::new()
        .route("/api/gallery/:id", delete(protected::gallery_delete))
        .route("/api/gallery/:id/favorite", put(protected::gallery_favorite))
        .route(
            "/api/gallery/upload",
            post(protected::gallery_upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route_layer(from_fn_with_state(
            state.authenticator(TokenSource::CookieOrBearer),
            require_auth,
        ));

    cookie_only.merge(bearer_only).merge(either)
}

fn auth_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/api/auth/me", get(protected::auth_me))
        .route_layer(from_fn_with_state(state.authenticator(TokenSource::Bearer), require_auth))
}

fn admin_routes(state: &AppState) -> Router<AppState> {
    let admin = state.authenticator(TokenSource::Bearer).require_role(Role::Admin);

    Router::new()
        .route("/api/admin/users", get(elevated::admin_users))
        .route("/api/admin/deactivate-user", post(elevated::admin_deactivate_user))
        .route("/api/admin/reactivate-user", post(elevated::admin_reactivate_user))
        .route("/api/admin/approve-user", post(elevated::admin_approve_user))
        .route("/api/admin/pending-users", get(elevated::admin_pending_users))
        .route_layer(from_fn_with_state(admin, require_auth))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

async fn not_found() -> ApiError {
    ApiError::not_found("Not found")
}

async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "Gallery API",
            "version": env!("CARGO_PKG_VERSION"),
            "endpoints": {
                "health": "/health (public)",
                "blog": "/api/blog[/:slug] (public)",
                "reactivation": "/api/users/request-reactivation (public)",
                "gallery": "/api/gallery[/:id] (cookie or bearer)",
                "auth": "/api/auth/me (bearer)",
                "admin": "/api/admin/* (bearer, ADMIN)",
            }
        }
    }))
}

/// Probes the store, giving up after the configured timeout
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    let database = match tokio::time::timeout(state.health_timeout, state.store.health_check()).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "health check failed");
            Err("unavailable")
        }
        Err(_) => {
            tracing::error!("health check timed out after {:?}", state.health_timeout);
            Err("timeout")
        }
    };

    match database {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": { "status": "ok", "timestamp": now, "database": "ok" }
            })),
        ),
        Err(reason) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "success": false,
                "message": "Database unavailable",
                "data": { "status": "degraded", "timestamp": now, "database": reason }
            })),
        ),
    }
}
