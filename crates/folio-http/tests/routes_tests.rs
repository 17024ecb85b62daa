mod common;

use axum::http::StatusCode;
use common::{get, image, json_body, json_request, multipart_request, stalled_multipart_request, Part, TestApp};
use folio_orm::Role;
use folio_storage::UploadConfig;
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn test_admin_route_requires_token() {
    let app = TestApp::new();

    let response = app.send(get("/api/users", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "MISSING_TOKEN");
}

#[tokio::test]
async fn test_admin_route_rejects_editor() {
    let app = TestApp::new();
    let token = app.token_for("editor1", Role::Editor).await;

    let response = app.send(get("/api/users", Some(&token))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let admin = app.token_for("admin1", Role::Admin).await;
    let response = app.send(get("/api/users", Some(&admin))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    assert!(body["data"][0].get("passwordHash").is_none());
}

#[tokio::test]
async fn test_login_flow() {
    let app = TestApp::new();
    app.create_user("alice", "secret123", Role::Admin, true).await;
    app.create_user("bob", "secret123", Role::Editor, false).await;

    let response = app
        .send(json_request("POST", "/api/users/login", None, &json!({"username": "alice"})))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .send(json_request(
            "POST",
            "/api/users/login",
            None,
            &json!({"username": "alice", "password": "wrong-password"}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .send(json_request(
            "POST",
            "/api/users/login",
            None,
            &json!({"username": "bob", "password": "secret123"}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .send(json_request(
            "POST",
            "/api/users/login",
            None,
            &json!({"username": "alice", "password": "secret123"}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let token = body["data"]["token"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["user"]["username"], "alice");

    let claims = app.state.jwt.verify(&token).unwrap();
    assert_eq!(claims.username, "alice");
    assert!(claims.is_admin());

    let response = app.send(get("/api/users/profile", Some(&token))).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_duplicate_user_is_rejected() {
    let app = TestApp::new();
    let admin = app.token_for("admin1", Role::Admin).await;
    let payload = json!({"username": "carol", "password": "secret123", "email": "carol@example.com"});

    let response = app.send(json_request("POST", "/api/users", Some(&admin), &payload)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    assert_eq!(body["data"]["role"], "editor");

    let response = app.send(json_request("POST", "/api/users", Some(&admin), &payload)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_cannot_delete_self() {
    let app = TestApp::new();
    let admin = app.create_user("root", "secret123", Role::Admin, true).await;
    let token = app.state.jwt.issue(&admin).unwrap();

    let request = axum::http::Request::builder()
        .method("DELETE")
        .uri(format!("/api/users/{}", admin.id))
        .header("authorization", format!("Bearer {}", token))
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_product_orders_gallery() {
    let app = TestApp::new();
    let token = app.token_for("editor1", Role::Editor).await;

    let request = multipart_request(
        "POST",
        "/api/products",
        Some(&token),
        &[
            Part::Text("title", "Banking app"),
            Part::Text("stars", "4"),
            Part::Text("tags", r#"["Figma","UI"]"#),
            Part::Text("date", "2024-05-01"),
            image("cover", "cover.png"),
            image("images", "img10.png"),
            image("images", "img2.png"),
            image("images", "img1.png"),
        ],
    );
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = json_body(response).await;
    let product = &body["data"];
    assert_eq!(product["title"], "Banking app");
    assert_eq!(product["tags"], json!(["Figma", "UI"]));

    let images = product["images"].as_array().unwrap();
    assert_eq!(images.len(), 3);
    let orders: Vec<u64> = images.iter().map(|i| i["order"].as_u64().unwrap()).collect();
    assert_eq!(orders, vec![0, 1, 2]);
    assert!(images[0]["url"].as_str().unwrap().ends_with("-img1.png"));
    assert!(images[2]["url"].as_str().unwrap().ends_with("-img10.png"));

    assert_eq!(app.upload_count(), 4);
}

#[tokio::test]
async fn test_failed_product_upload_leaves_no_files() {
    let app = TestApp::new();
    let token = app.token_for("editor1", Role::Editor).await;

    // no title: the handler fails after both files are written
    let request = multipart_request(
        "POST",
        "/api/products",
        Some(&token),
        &[image("cover", "cover.png"), image("images", "a.png")],
    );
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.upload_count(), 0);
}

#[tokio::test]
async fn test_unsupported_file_type_is_rejected() {
    let app = TestApp::new();
    let token = app.token_for("editor1", Role::Editor).await;

    let request = multipart_request(
        "POST",
        "/api/products",
        Some(&token),
        &[
            Part::Text("title", "Scripted"),
            image("cover", "cover.png"),
            Part::File {
                field: "images",
                file_name: "payload.exe",
                content_type: "application/octet-stream",
                data: b"MZ",
            },
        ],
    );
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.upload_count(), 0);
}

#[tokio::test]
async fn test_gallery_maintenance() {
    let app = TestApp::new();
    let token = app.token_for("editor1", Role::Editor).await;

    let request = multipart_request(
        "POST",
        "/api/products",
        Some(&token),
        &[
            Part::Text("title", "Gallery"),
            image("cover", "cover.png"),
            image("images", "1.png"),
            image("images", "2.png"),
            image("images", "3.png"),
        ],
    );
    let body = json_body(app.send(request).await).await;
    let id = body["data"]["id"].as_i64().unwrap();
    let second = body["data"]["images"][1]["url"].as_str().unwrap().to_string();

    let request = axum::http::Request::builder()
        .method("DELETE")
        .uri(format!("/api/products/{}/images/0", id))
        .header("authorization", format!("Bearer {}", token))
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let images = body["data"]["images"].as_array().unwrap();
    assert_eq!(images.len(), 2);
    assert_eq!(images[0]["url"], second.as_str());
    assert_eq!(images[0]["order"], 0);
    assert_eq!(app.upload_count(), 3);

    let response = app
        .send(json_request(
            "PUT",
            &format!("/api/products/{}/images/order", id),
            Some(&token),
            &json!({"imageOrder": [{"index": 0, "order": 5}]}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["images"][1]["url"], second.as_str());

    let response = app
        .send(json_request(
            "PUT",
            &format!("/api/products/{}/images/order", id),
            Some(&token),
            &json!({"imageOrder": [{"index": 9, "order": 0}]}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .send(json_request(
            "PUT",
            &format!("/api/products/{}/images/order", id),
            Some(&token),
            &json!({"imageOrder": [{"index": 0, "order": 3}, {"index": 0, "order": 1}]}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "UPLOAD_VALIDATION_ERROR");
}

async fn create_gallery_product(app: &TestApp, token: &str, images: &[&str]) -> serde_json::Value {
    let mut parts = vec![Part::Text("title", "Gallery"), image("cover", "cover.png")];
    parts.extend(images.iter().map(|name| image("images", name)));
    let response = app.send(multipart_request("POST", "/api/products", Some(token), &parts)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    json_body(response).await["data"].clone()
}

#[tokio::test]
async fn test_append_images_numbers_after_highest_order() {
    let app = TestApp::new();
    let token = app.token_for("editor1", Role::Editor).await;
    let product = create_gallery_product(&app, &token, &["1.png", "2.png"]).await;
    let id = product["id"].as_i64().unwrap();

    let response = app
        .send(json_request(
            "PUT",
            &format!("/api/products/{}/images/order", id),
            Some(&token),
            &json!({"imageOrder": [{"index": 1, "order": 7}]}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let request = multipart_request(
        "POST",
        &format!("/api/products/{}/images", id),
        Some(&token),
        &[image("images", "n2.png"), image("images", "n1.png")],
    );
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    let images = body["data"]["images"].as_array().unwrap();
    let orders: Vec<u64> = images.iter().map(|i| i["order"].as_u64().unwrap()).collect();
    assert_eq!(orders, vec![0, 7, 8, 9]);
    assert_eq!(images[0]["url"], product["images"][0]["url"]);
    assert_eq!(images[1]["url"], product["images"][1]["url"]);
    assert!(images[2]["url"].as_str().unwrap().ends_with("-n1.png"));
    assert!(images[3]["url"].as_str().unwrap().ends_with("-n2.png"));
    assert_eq!(app.upload_count(), 5);

    let response = app
        .send(multipart_request(
            "POST",
            "/api/products/999/images",
            Some(&token),
            &[image("images", "n3.png")],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.upload_count(), 5);
}

#[tokio::test]
async fn test_reorder_images_from_url_list() {
    let app = TestApp::new();
    let token = app.token_for("editor1", Role::Editor).await;
    let product = create_gallery_product(&app, &token, &["1.png", "2.png"]).await;
    let id = product["id"].as_i64().unwrap();
    let first = product["images"][0]["url"].as_str().unwrap().to_string();
    let second = product["images"][1]["url"].as_str().unwrap().to_string();

    let response = app
        .send(json_request(
            "PUT",
            &format!("/api/products/{}/images/reorder", id),
            Some(&token),
            &json!({"images": [second, {"url": first, "order": 0}]}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["images"][0]["url"], second.as_str());
    assert_eq!(body["data"]["images"][0]["order"], 0);
    assert_eq!(body["data"]["images"][1]["url"], first.as_str());
    assert_eq!(body["data"]["images"][1]["order"], 1);

    let response = app
        .send(json_request(
            "PUT",
            &format!("/api/products/{}/images/reorder", id),
            Some(&token),
            &json!({"images": []}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // unknown product wins over a bad body
    let response = app
        .send(json_request(
            "PUT",
            "/api/products/999/images/reorder",
            Some(&token),
            &json!({"images": "nope"}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upload_rejected_while_gate_is_full() {
    let app = TestApp::with_uploads(|config| UploadConfig {
        max_concurrent: 1,
        ..config
    });
    let token = app.token_for("editor1", Role::Editor).await;
    let parts = [Part::Text("title", "Busy"), image("cover", "cover.png")];

    let held = app.state.gate.try_acquire().unwrap();
    let response = app
        .send(multipart_request("POST", "/api/products", Some(&token), &parts))
        .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "TOO_MANY_UPLOADS");
    assert_eq!(app.upload_count(), 0);

    drop(held);
    let response = app
        .send(multipart_request("POST", "/api/products", Some(&token), &parts))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_stalled_upload_times_out_and_removes_files() {
    let app = TestApp::with_uploads(|config| UploadConfig {
        processing_timeout: Duration::from_millis(200),
        ..config
    });
    let token = app.token_for("editor1", Role::Editor).await;

    let request = stalled_multipart_request(
        "POST",
        "/api/products",
        Some(&token),
        &[
            Part::Text("title", "Slow"),
            image("cover", "cover.png"),
            image("images", "1.png"),
        ],
    );
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    assert_eq!(app.upload_count(), 0);
    assert_eq!(app.state.gate.active(), 0);
    assert_eq!(app.state.gate.stats().failed, 1);
}

#[tokio::test]
async fn test_public_list_hides_drafts() {
    let app = TestApp::new();
    let token = app.token_for("editor1", Role::Editor).await;

    for (title, status) in [("Published", "true"), ("Draft", "false")] {
        let request = multipart_request(
            "POST",
            "/api/products",
            Some(&token),
            &[
                Part::Text("title", title),
                Part::Text("status", status),
                image("cover", "cover.png"),
            ],
        );
        assert_eq!(app.send(request).await.status(), StatusCode::CREATED);
    }

    let body = json_body(app.send(get("/api/products", None)).await).await;
    assert_eq!(body["data"]["products"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["pagination"]["total"], 1);
    assert_eq!(body["data"]["pagination"]["limit"], 12);

    let body = json_body(app.send(get("/api/products/admin/list?keyword=draft", Some(&token))).await).await;
    assert_eq!(body["data"]["products"][0]["title"], "Draft");
}

#[tokio::test]
async fn test_product_view_count_and_delete() {
    let app = TestApp::new();
    let token = app.token_for("editor1", Role::Editor).await;

    let request = multipart_request(
        "POST",
        "/api/products",
        Some(&token),
        &[Part::Text("title", "Viewed"), image("cover", "cover.png")],
    );
    let body = json_body(app.send(request).await).await;
    let id = body["data"]["id"].as_i64().unwrap();

    app.send(get(&format!("/api/products/{}", id), None)).await;
    let body = json_body(app.send(get(&format!("/api/products/{}", id), None)).await).await;
    assert_eq!(body["data"]["viewCount"], 2);

    let request = axum::http::Request::builder()
        .method("DELETE")
        .uri(format!("/api/products/{}", id))
        .header("authorization", format!("Bearer {}", token))
        .body(axum::body::Body::empty())
        .unwrap();
    assert_eq!(app.send(request).await.status(), StatusCode::OK);
    assert_eq!(app.upload_count(), 0);

    let response = app.send(get(&format!("/api/products/{}", id), None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_article_lifecycle() {
    let app = TestApp::new();
    let token = app.token_for("writer", Role::Editor).await;

    let request = multipart_request(
        "POST",
        "/api/articles",
        Some(&token),
        &[
            Part::Text("title", "Design notes"),
            Part::Text("content", "<p>Tokens</p>"),
            Part::Text("isFeatured", "true"),
            image("cover", "cover.webp"),
        ],
    );
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    let id = body["data"]["id"].as_i64().unwrap();
    assert_eq!(body["data"]["isFeatured"], true);

    let request = multipart_request(
        "PUT",
        &format!("/api/articles/{}/cover", id),
        Some(&token),
        &[image("cover", "new.png")],
    );
    assert_eq!(app.send(request).await.status(), StatusCode::OK);
    assert_eq!(app.upload_count(), 1);

    let body = json_body(app.send(get("/api/articles/admin/list?search=tokens", Some(&token))).await).await;
    assert_eq!(body["data"]["total"], 1);

    let body = json_body(app.send(get("/api/articles?featured=true", None)).await).await;
    assert_eq!(body["data"]["articles"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_editor_upload_returns_location() {
    let app = TestApp::new();
    let token = app.token_for("writer", Role::Editor).await;

    let request = multipart_request("POST", "/api/editor/upload", Some(&token), &[image("file", "inline.png")]);
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert!(body["location"].as_str().unwrap().starts_with("/uploads/"));
}

#[tokio::test]
async fn test_unknown_api_path_is_json_404() {
    let app = TestApp::new();

    let response = app.send(get("/api/nothing-here", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "RESOURCE_NOT_FOUND");
}

#[tokio::test]
async fn test_health_and_connectivity() {
    let app = TestApp::new();

    let body = json_body(app.send(get("/health", None)).await).await;
    assert_eq!(body["status"], "OK");
    assert_eq!(body["database"]["backend"], "memory");
    assert_eq!(body["database"]["healthy"], true);

    let response = app.send(get("/health/database", None)).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let response = app
        .send(json_request("POST", "/api/test-post", None, &json!({"ping": 1})))
        .await;
    let body = json_body(response).await;
    assert_eq!(body["data"]["received"]["ping"], 1);

    let body = json_body(app.send(get("/health/monitoring", None)).await).await;
    assert!(body["data"]["recentAlerts"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_stress_test_validates_parameters() {
    let app = TestApp::new();
    let response = app.send(get("/health/stress-test?requests=5000", None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.send(get("/health/stress-test?endpoint=health", None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_frontend_fallback() {
    let app = TestApp::new();

    let response = app.send(get("/", None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.send(get("/missing.html", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
