use anyhow::Result;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::json;
use std::sync::Arc;

mod common;
use common::{multipart_body, Auth, BrokenStore, TestApp};
use gallery_api::types::Role;

async fn seeded() -> TestApp {
    let app = TestApp::new();
    for i in 0..15 {
        app.seed_item("u1", &format!("u1 item {}", i)).await;
    }
    for i in 0..5 {
        app.seed_item("u2", &format!("u2 item {}", i)).await;
    }
    app
}

fn upload_request(token: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/gallery/upload")
        .header(header::COOKIE, format!("authToken={}", token))
        .header(header::CONTENT_TYPE, "multipart/form-data; boundary=XBOUNDARY")
        .body(Body::from(body))
        .expect("request")
}

#[tokio::test]
async fn second_page_of_owned_items() -> Result<()> {
    let app = seeded().await;
    let token = app.token("u1", Role::User);

    let (status, body) = app.get("/api/gallery?page=2&limit=10", Auth::Cookie(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["items"].as_array().map(Vec::len), Some(5));
    assert_eq!(body["totalItems"], 15);
    assert_eq!(body["totalPages"], 2);
    assert_eq!(body["currentPage"], 2);
    assert!(body["items"]
        .as_array()
        .into_iter()
        .flatten()
        .all(|item| item["userId"] == "u1"));
    Ok(())
}

#[tokio::test]
async fn listing_is_newest_first() -> Result<()> {
    let app = seeded().await;
    let token = app.token("u1", Role::User);

    let (_, body) = app.get("/api/gallery", Auth::Cookie(&token)).await;
    assert_eq!(body["items"][0]["title"], "u1 item 14");
    assert_eq!(body["items"][9]["title"], "u1 item 5");
    Ok(())
}

#[tokio::test]
async fn malformed_paging_falls_back_to_defaults() -> Result<()> {
    let app = seeded().await;
    let token = app.token("u1", Role::User);

    let (status, body) = app.get("/api/gallery?page=abc&limit=0", Auth::Cookie(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["currentPage"], 1);
    assert_eq!(body["items"].as_array().map(Vec::len), Some(10));

    let (_, body) = app.get("/api/gallery?page=2x&limit=500", Auth::Cookie(&token)).await;
    assert_eq!(body["currentPage"], 2);
    assert_eq!(body["totalPages"], 1);
    assert_eq!(body["items"].as_array().map(Vec::len), Some(0));
    Ok(())
}

#[tokio::test]
async fn gallery_requires_cookie_credential() -> Result<()> {
    let app = seeded().await;
    let token = app.token("u1", Role::User);

    let (status, body) = app.get("/api/gallery", Auth::None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, _) = app.get("/api/gallery", Auth::Bearer(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app.get("/api/gallery", Auth::Cookie("not.a.jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid token");
    Ok(())
}

#[tokio::test]
async fn favorites_use_bearer_and_only_list_favorites() -> Result<()> {
    let app = seeded().await;
    let token = app.token("u1", Role::User);

    let (_, page) = app.get("/api/gallery?limit=2", Auth::Cookie(&token)).await;
    for item in page["items"].as_array().into_iter().flatten() {
        let id = item["id"].as_str().unwrap_or_default();
        let (status, body) = app
            .request(
                "PUT",
                &format!("/api/gallery/{}/favorite", id),
                Auth::Bearer(&token),
                Some(json!({ "isFavorite": true })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["item"]["isFavorite"], true);
    }

    let (status, body) = app.get("/api/gallery/favorites", Auth::Bearer(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalItems"], 2);
    assert_eq!(body["totalPages"], 1);

    let (status, _) = app.get("/api/gallery/favorites", Auth::Cookie(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn favorite_requires_a_json_boolean() -> Result<()> {
    let app = TestApp::new();
    let item = app.seed_item("u1", "sunset").await;
    let token = app.token("u1", Role::User);
    let uri = format!("/api/gallery/{}/favorite", item.id);

    for body in [json!({ "isFavorite": "true" }), json!({ "isFavorite": 1 }), json!({})] {
        let (status, resp) = app.request("PUT", &uri, Auth::Cookie(&token), Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp["message"], "Invalid favorite status");
    }

    let stored = app.store.find_gallery_item(&item.id).await?.expect("still there");
    assert!(!stored.is_favorite);
    Ok(())
}

#[tokio::test]
async fn non_owner_cannot_mutate() -> Result<()> {
    let app = TestApp::new();
    let (item, path) = app.seed_item_with_file("u1", "sunset").await;
    let intruder = app.token("u2", Role::User);

    let (status, body) = app
        .request("DELETE", &format!("/api/gallery/{}", item.id), Auth::Cookie(&intruder), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);

    let (status, _) = app
        .request(
            "PUT",
            &format!("/api/gallery/{}/favorite", item.id),
            Auth::Bearer(&intruder),
            Some(json!({ "isFavorite": true })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let stored = app.store.find_gallery_item(&item.id).await?.expect("item intact");
    assert!(!stored.is_favorite);
    assert!(path.exists());
    Ok(())
}

#[tokio::test]
async fn owner_delete_removes_record_and_file() -> Result<()> {
    let app = TestApp::new();
    let (item, path) = app.seed_item_with_file("u1", "sunset").await;
    let token = app.token("u1", Role::User);
    let uri = format!("/api/gallery/{}", item.id);

    let (status, body) = app.request("DELETE", &uri, Auth::Bearer(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true }));
    assert!(app.store.find_gallery_item(&item.id).await?.is_none());
    assert!(!path.exists());

    let (status, body) = app.request("DELETE", &uri, Auth::Bearer(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Item not found");
    Ok(())
}

#[tokio::test]
async fn wrong_method_is_json_405() -> Result<()> {
    let app = TestApp::new();
    let item = app.seed_item("u1", "sunset").await;
    let token = app.token("u1", Role::User);

    let (status, body) = app.get(&format!("/api/gallery/{}", item.id), Auth::Cookie(&token)).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["success"], false);
    Ok(())
}

#[tokio::test]
async fn upload_stores_file_and_item() -> Result<()> {
    let app = TestApp::new();
    let token = app.token("u1", Role::User);
    let body = multipart_body(
        "XBOUNDARY",
        &[("title", "Beach"), ("mediaType", "IMAGE"), ("description", "low tide")],
        Some(("beach.png", "image/png", b"\x89PNG\r\n")),
    );

    let (status, body) = app.send(upload_request(&token, body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["item"]["userId"], "u1");
    assert_eq!(body["item"]["mediaType"], "IMAGE");

    let file_url = body["item"]["fileUrl"].as_str().unwrap_or_default();
    assert!(file_url.starts_with("/uploads/") && file_url.ends_with(".png"));
    assert!(app.state.files.resolve(file_url)?.exists());
    Ok(())
}

#[tokio::test]
async fn upload_rejects_incomplete_forms() -> Result<()> {
    let app = TestApp::new();
    let token = app.token("u1", Role::User);

    let no_file = multipart_body("XBOUNDARY", &[("title", "Beach"), ("mediaType", "IMAGE")], None);
    let (status, body) = app.send(upload_request(&token, no_file)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "No file uploaded");

    let bad_media = multipart_body(
        "XBOUNDARY",
        &[("title", "Beach"), ("mediaType", "AUDIO")],
        Some(("beach.png", "image/png", b"png")),
    );
    let (status, body) = app.send(upload_request(&token, bad_media)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid title or media type");

    let bad_type = multipart_body(
        "XBOUNDARY",
        &[("title", "Notes"), ("mediaType", "IMAGE")],
        Some(("notes.txt", "text/plain", b"hello")),
    );
    let (status, _) = app.send(upload_request(&token, bad_type)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.get("/api/gallery", Auth::Cookie(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalItems"], 0);
    Ok(())
}

#[tokio::test]
async fn store_failures_do_not_leak_detail() -> Result<()> {
    let app = TestApp::with_store(Arc::new(BrokenStore));
    let token = app.token("u1", Role::User);

    let (status, body) = app.get("/api/gallery", Auth::Cookie(&token)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Internal server error");
    assert!(!body.to_string().contains("secret_internal_table"));
    Ok(())
}
