#![allow(dead_code)]

use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tower::ServiceExt;

use gallery_api::config::AppConfig;
use gallery_api::database::models::{
    BlogPost, BlogPostSummary, GalleryItem, MediaType, NewBlogPost, NewGalleryItem, NewUser, User, UserFilter,
};
use gallery_api::database::{GalleryFilter, MemoryStore, PageWindow, Store, StoreError};
use gallery_api::services::AdminNotifier;
use gallery_api::types::Role;
use gallery_api::{app, AppState};

// ---------------------------------------------------------------------------
// Spawned binary, for smoke tests over a real socket
// ---------------------------------------------------------------------------

static SERVER: OnceLock<TestServer> = OnceLock::new();

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    child: Child,
    _public_dir: tempfile::TempDir,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);
        let public_dir = tempfile::tempdir().context("failed to create public dir")?;

        let mut cmd = Command::new(env!("CARGO_BIN_EXE_gallery-api"));
        cmd.env("GALLERY_API_PORT", port.to_string())
            .env("APP_ENV", "development")
            .env("STORE_BACKEND", "memory")
            .env("STORAGE_PUBLIC_DIR", public_dir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self {
            port,
            base_url,
            child,
            _public_dir: public_dir,
        })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == reqwest::StatusCode::OK
                    || resp.status() == reqwest::StatusCode::SERVICE_UNAVAILABLE
                {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }
}

pub async fn ensure_server() -> Result<&'static TestServer> {
    let server = SERVER.get_or_init(|| TestServer::spawn().expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(10)).await?;
    Ok(server)
}

// ---------------------------------------------------------------------------
// In-process router over a seeded store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct CountingNotifier {
    count: AtomicUsize,
    emails: std::sync::Mutex<Vec<String>>,
}

impl CountingNotifier {
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn emails(&self) -> Vec<String> {
        self.emails.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl AdminNotifier for CountingNotifier {
    fn reactivation_requested(&self, user: &User) {
        self.count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut emails) = self.emails.lock() {
            emails.push(user.email.clone());
        }
    }
}

pub enum Auth<'a> {
    None,
    Cookie(&'a str),
    Bearer(&'a str),
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<dyn Store>,
    pub notifier: Arc<CountingNotifier>,
    pub public_dir: tempfile::TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    pub fn with_store(store: Arc<dyn Store>) -> Self {
        let public_dir = tempfile::tempdir().expect("tempdir");
        let mut config = AppConfig::development();
        config.storage.public_dir = public_dir.path().to_path_buf();

        let notifier = Arc::new(CountingNotifier::default());
        let state = AppState::new(store.clone(), &config).with_notifier(notifier.clone());
        Self::from_state(state, store, notifier, public_dir)
    }

    pub fn from_state(
        state: AppState,
        store: Arc<dyn Store>,
        notifier: Arc<CountingNotifier>,
        public_dir: tempfile::TempDir,
    ) -> Self {
        Self {
            router: app(state.clone(), false),
            state,
            store,
            notifier,
            public_dir,
        }
    }

    /// Same app with a different health probe deadline
    pub fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.state.health_timeout = timeout;
        self.router = app(self.state.clone(), false);
        self
    }

    pub fn token(&self, user_id: &str, role: Role) -> String {
        self.state.verifier.issue(user_id, role).expect("sign token")
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.expect("router is infallible");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("JSON body")
        };
        (status, body)
    }

    pub async fn request(&self, method: &str, uri: &str, auth: Auth<'_>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        builder = match auth {
            Auth::None => builder,
            Auth::Cookie(token) => builder.header(header::COOKIE, format!("authToken={}", token)),
            Auth::Bearer(token) => builder.header(header::AUTHORIZATION, format!("Bearer {}", token)),
        };
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");
        self.send(request).await
    }

    pub async fn get(&self, uri: &str, auth: Auth<'_>) -> (StatusCode, Value) {
        self.request("GET", uri, auth, None).await
    }

    pub async fn seed_item(&self, owner: &str, title: &str) -> GalleryItem {
        self.store
            .insert_gallery_item(NewGalleryItem {
                user_id: owner.into(),
                title: title.into(),
                description: String::new(),
                file_url: format!("/uploads/{}.png", title.replace(' ', "-")),
                media_type: MediaType::Image,
            })
            .await
            .expect("seed item")
    }

    /// Seeds an item whose media file exists under the public dir
    pub async fn seed_item_with_file(&self, owner: &str, title: &str) -> (GalleryItem, std::path::PathBuf) {
        let file_url = self.state.files.save_upload("image/png", b"\x89PNG").await.expect("save");
        let path = self.state.files.resolve(&file_url).expect("resolve");
        let item = self
            .store
            .insert_gallery_item(NewGalleryItem {
                user_id: owner.into(),
                title: title.into(),
                description: String::new(),
                file_url,
                media_type: MediaType::Image,
            })
            .await
            .expect("seed item");
        (item, path)
    }

    pub async fn seed_user(&self, email: &str, username: &str, active: Option<bool>, role: Role) -> User {
        let mut user = NewUser::member(email, username);
        user.is_active = active;
        user.role = role;
        self.store.insert_user(user).await.expect("seed user")
    }
}

pub fn multipart_body(boundary: &str, fields: &[(&str, &str)], file: Option<(&str, &str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes());
        body.extend_from_slice(value.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    if let Some((filename, mime, bytes)) = file {
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                filename, mime
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
    body
}

// ---------------------------------------------------------------------------
// Stores that misbehave
// ---------------------------------------------------------------------------

/// Every call fails with an error that carries internal detail
pub struct BrokenStore;

fn broken<T>() -> Result<T, StoreError> {
    Err(StoreError::Query("relation \"secret_internal_table\" does not exist".into()))
}

#[async_trait]
impl Store for BrokenStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
    async fn insert_gallery_item(&self, _: NewGalleryItem) -> Result<GalleryItem, StoreError> {
        broken()
    }
    async fn find_gallery_item(&self, _: &str) -> Result<Option<GalleryItem>, StoreError> {
        broken()
    }
    async fn list_gallery_items(&self, _: &GalleryFilter, _: PageWindow) -> Result<Vec<GalleryItem>, StoreError> {
        broken()
    }
    async fn count_gallery_items(&self, _: &GalleryFilter) -> Result<u64, StoreError> {
        broken()
    }
    async fn set_gallery_favorite(&self, _: &str, _: bool) -> Result<Option<GalleryItem>, StoreError> {
        broken()
    }
    async fn delete_gallery_item(&self, _: &str) -> Result<bool, StoreError> {
        broken()
    }
    async fn insert_user(&self, _: NewUser) -> Result<User, StoreError> {
        broken()
    }
    async fn find_user(&self, _: &str) -> Result<Option<User>, StoreError> {
        broken()
    }
    async fn find_user_by_email(&self, _: &str) -> Result<Option<User>, StoreError> {
        broken()
    }
    async fn find_user_by_email_or_username(&self, _: &str, _: &str) -> Result<Option<User>, StoreError> {
        broken()
    }
    async fn list_users(&self, _: &UserFilter, _: PageWindow) -> Result<Vec<User>, StoreError> {
        broken()
    }
    async fn count_users(&self, _: &UserFilter) -> Result<u64, StoreError> {
        broken()
    }
    async fn request_reactivation(&self, _: &str, _: DateTime<Utc>) -> Result<bool, StoreError> {
        broken()
    }
    async fn set_user_active(&self, _: &str, _: bool, _: Option<String>) -> Result<Option<User>, StoreError> {
        broken()
    }
    async fn set_user_approved(&self, _: &str) -> Result<Option<User>, StoreError> {
        broken()
    }
    async fn insert_blog_post(&self, _: NewBlogPost) -> Result<BlogPostSummary, StoreError> {
        broken()
    }
    async fn list_published_posts(&self, _: PageWindow) -> Result<Vec<BlogPostSummary>, StoreError> {
        broken()
    }
    async fn count_published_posts(&self) -> Result<u64, StoreError> {
        broken()
    }
    async fn find_published_post(&self, _: &str) -> Result<Option<BlogPost>, StoreError> {
        broken()
    }
}

/// Memory store whose health probe never answers
pub struct HangingStore(pub MemoryStore);

#[async_trait]
impl Store for HangingStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        std::future::pending::<()>().await;
        Ok(())
    }
    async fn insert_gallery_item(&self, item: NewGalleryItem) -> Result<GalleryItem, StoreError> {
        self.0.insert_gallery_item(item).await
    }
    async fn find_gallery_item(&self, id: &str) -> Result<Option<GalleryItem>, StoreError> {
        self.0.find_gallery_item(id).await
    }
    async fn list_gallery_items(&self, f: &GalleryFilter, w: PageWindow) -> Result<Vec<GalleryItem>, StoreError> {
        self.0.list_gallery_items(f, w).await
    }
    async fn count_gallery_items(&self, f: &GalleryFilter) -> Result<u64, StoreError> {
        self.0.count_gallery_items(f).await
    }
    async fn set_gallery_favorite(&self, id: &str, fav: bool) -> Result<Option<GalleryItem>, StoreError> {
        self.0.set_gallery_favorite(id, fav).await
    }
    async fn delete_gallery_item(&self, id: &str) -> Result<bool, StoreError> {
        self.0.delete_gallery_item(id).await
    }
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        self.0.insert_user(user).await
    }
    async fn find_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        self.0.find_user(id).await
    }
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.0.find_user_by_email(email).await
    }
    async fn find_user_by_email_or_username(&self, e: &str, u: &str) -> Result<Option<User>, StoreError> {
        self.0.find_user_by_email_or_username(e, u).await
    }
    async fn list_users(&self, f: &UserFilter, w: PageWindow) -> Result<Vec<User>, StoreError> {
        self.0.list_users(f, w).await
    }
    async fn count_users(&self, f: &UserFilter) -> Result<u64, StoreError> {
        self.0.count_users(f).await
    }
    async fn request_reactivation(&self, id: &str, at: DateTime<Utc>) -> Result<bool, StoreError> {
        self.0.request_reactivation(id, at).await
    }
    async fn set_user_active(&self, id: &str, active: bool, reason: Option<String>) -> Result<Option<User>, StoreError> {
        self.0.set_user_active(id, active, reason).await
    }
    async fn set_user_approved(&self, id: &str) -> Result<Option<User>, StoreError> {
        self.0.set_user_approved(id).await
    }
    async fn insert_blog_post(&self, post: NewBlogPost) -> Result<BlogPostSummary, StoreError> {
        self.0.insert_blog_post(post).await
    }
    async fn list_published_posts(&self, w: PageWindow) -> Result<Vec<BlogPostSummary>, StoreError> {
        self.0.list_published_posts(w).await
    }
    async fn count_published_posts(&self) -> Result<u64, StoreError> {
        self.0.count_published_posts().await
    }
    async fn find_published_post(&self, slug: &str) -> Result<Option<BlogPost>, StoreError> {
        self.0.find_published_post(slug).await
    }
}
