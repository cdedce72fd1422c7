use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use futures_util::StreamExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use foodshare::{app::build_app, state::AppState};

async fn call(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
    };
    (status, value)
}

async fn register(app: &Router, email: &str, name: &str) -> (String, String) {
    let (status, body) = call(
        app,
        "POST",
        "/api/v1/auth/register",
        None,
        Some(json!({ "email": email, "password": "correct-horse", "name": name })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    (
        body["access_token"].as_str().unwrap().to_string(),
        body["user"]["id"].as_str().unwrap().to_string(),
    )
}

fn carrots(quantity: i64) -> Value {
    json!({
        "title": "Carrots",
        "description": "A bag of fresh carrots",
        "category": "vegetables",
        "quantity": quantity,
        "unit": "kg",
        "location": { "lat": 52.52, "lng": 13.405, "address": "Alexanderplatz" },
        "expire_date": "2099-01-31",
        "expire_time": "18:30"
    })
}

#[tokio::test]
async fn health_is_ok() {
    let app = build_app(AppState::fake());
    let (status, body) = call(&app, "GET", "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("ok".into()));
}

#[tokio::test]
async fn posting_requires_login() {
    let app = build_app(AppState::fake());
    let (status, body) = call(&app, "POST", "/api/v1/items", None, Some(carrots(3))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Please log in to share food");

    let (status, _) = call(&app, "GET", "/api/v1/items/mine", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn zero_quantity_is_rejected() {
    let app = build_app(AppState::fake());
    let (token, _) = register(&app, "ana@example.com", "Ana").await;

    let (status, body) = call(&app, "POST", "/api/v1/items", Some(&token), Some(carrots(0))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Please set a valid quantity");

    let mut fractional = carrots(1);
    fractional["quantity"] = json!(2.5);
    let (status, body) = call(&app, "POST", "/api/v1/items", Some(&token), Some(fractional)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Please set a valid quantity");

    let (_, mine) = call(&app, "GET", "/api/v1/items/mine", Some(&token), None).await;
    assert_eq!(mine.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn share_request_and_notify_flow() {
    let app = build_app(AppState::fake());
    let (ben, _) = register(&app, "ben@example.com", "Ben").await;
    let (ana, ana_id) = register(&app, "ana@example.com", "Ana").await;

    let (status, posted) = call(&app, "POST", "/api/v1/items", Some(&ben), Some(carrots(3))).await;
    assert_eq!(status, StatusCode::CREATED, "{posted}");
    assert_eq!(posted["item"]["quantity"], 3);
    assert_eq!(posted["item"]["unit"], "kg");
    assert_eq!(posted["item"]["poster"]["name"], "Ben");
    assert!(posted["notice"]["message"].is_string());
    let item_id = posted["item"]["id"].as_str().unwrap().to_string();

    let (_, mine) = call(&app, "GET", "/api/v1/items/mine", Some(&ben), None).await;
    assert_eq!(mine.as_array().unwrap().len(), 1);

    let (_, nearby) = call(&app, "GET", "/api/v1/items/nearby", Some(&ana), None).await;
    let nearby = nearby.as_array().unwrap();
    assert_eq!(nearby.len(), 1);
    assert_eq!(nearby[0]["poster"]["name"], "Ben");

    let (_, feed) = call(&app, "GET", "/api/v1/items", Some(&ana), None).await;
    assert_eq!(feed["mine"].as_array().unwrap().len(), 0);
    assert_eq!(feed["nearby"].as_array().unwrap().len(), 1);
    assert_eq!(feed["notices"].as_array().unwrap().len(), 0);

    let uri = format!("/api/v1/items/{}/requests", item_id);
    let (status, own) = call(&app, "POST", &uri, Some(&ben), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{own}");
    let (status, request) = call(&app, "POST", &uri, Some(&ana), None).await;
    assert_eq!(status, StatusCode::CREATED, "{request}");
    assert_eq!(request["status"], "pending");

    let (_, sent) = call(&app, "GET", "/api/v1/requests/sent", Some(&ana), None).await;
    assert_eq!(sent[0]["title"], "Carrots");

    let (_, inbox) = call(&app, "GET", "/api/v1/notifications", Some(&ben), None).await;
    assert_eq!(inbox["unread"], 1);
    assert_eq!(inbox["items"][0]["message"], "Ana requested your Carrots");
    let notification_id = inbox["items"][0]["id"].as_str().unwrap().to_string();

    let read_uri = format!("/api/v1/notifications/{}/read", notification_id);
    let (status, _) = call(&app, "POST", &read_uri, Some(&ana), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = call(&app, "POST", &read_uri, Some(&ben), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, inbox) = call(&app, "GET", "/api/v1/notifications", Some(&ben), None).await;
    assert_eq!(inbox["unread"], 0);

    let (_, board) = call(&app, "GET", "/api/v1/leaderboard", None, None).await;
    assert_eq!(board["entries"][0]["id"], ana_id.as_str());
    assert_eq!(board["entries"][0]["score"], 1);

    let (_, stats) = call(&app, "GET", "/api/v1/me/stats", Some(&ana), None).await;
    assert_eq!(stats["score"], 1);

    let like_uri = format!("/api/v1/items/{}/like", item_id);
    let (_, like) = call(&app, "POST", &like_uri, Some(&ana), None).await;
    assert_eq!(like, json!({ "likes": 1, "liked": true }));
}

#[tokio::test]
async fn map_scene_places_markers_and_route() {
    let app = build_app(AppState::fake());
    let (ben, _) = register(&app, "ben@example.com", "Ben").await;
    let (ana, _) = register(&app, "ana@example.com", "Ana").await;
    let (_, posted) = call(&app, "POST", "/api/v1/items", Some(&ben), Some(carrots(2))).await;
    let item_id = posted["item"]["id"].as_str().unwrap().to_string();

    let (status, scene) = call(&app, "GET", "/api/v1/map/scene", Some(&ana), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(scene["placeholder"], true);
    assert_eq!(scene["scene"]["markers"].as_array().unwrap().len(), 0);

    let (status, _) = call(
        &app,
        "PUT",
        "/api/v1/me/location",
        Some(&ana),
        Some(json!({ "lat": 52.5, "lng": 13.4 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let uri = format!("/api/v1/map/scene?selected={}&directions=true", item_id);
    let (_, scene) = call(&app, "GET", &uri, Some(&ana), None).await;
    assert_eq!(scene["placeholder"], false);
    assert_eq!(scene["scene"]["markers"].as_array().unwrap().len(), 2);
    assert_eq!(scene["scene"]["routes"].as_array().unwrap().len(), 1);
    assert_eq!(scene["selected"]["id"], item_id.as_str());
}

#[tokio::test]
async fn profile_update_and_me() {
    let app = build_app(AppState::fake());
    let (token, _) = register(&app, "ana@example.com", "Ana Lima").await;

    let (_, me) = call(&app, "GET", "/api/v1/me", Some(&token), None).await;
    assert_eq!(me["name"], "Ana Lima");
    assert!(me["avatar"].as_str().unwrap().contains("name=Ana%20Lima"));

    let (status, profile) = call(
        &app,
        "PUT",
        "/api/v1/me/profile",
        Some(&token),
        Some(json!({ "bio": "Soup enthusiast" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["bio"], "Soup enthusiast");
    assert_eq!(profile["full_name"], "Ana Lima");
}

fn item_markers(scene: &Value) -> usize {
    scene["scene"]["markers"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|m| m["kind"]["type"] == "item")
        .count()
}

#[tokio::test]
async fn map_scene_plots_own_and_nearby_items() {
    let app = build_app(AppState::fake());
    let (ben, _) = register(&app, "ben@example.com", "Ben").await;
    let (ana, _) = register(&app, "ana@example.com", "Ana").await;
    let (_, bens) = call(&app, "POST", "/api/v1/items", Some(&ben), Some(carrots(2))).await;
    let (_, anas) = call(&app, "POST", "/api/v1/items", Some(&ana), Some(carrots(1))).await;

    let (status, scene) = call(&app, "GET", "/api/v1/map/scene?lat=52.5&lng=13.4", Some(&ana), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(item_markers(&scene), 2);

    let ids: Vec<&str> = scene["scene"]["markers"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|m| m["kind"]["item_id"].as_str())
        .collect();
    assert!(ids.contains(&anas["item"]["id"].as_str().unwrap()));
    assert!(ids.contains(&bens["item"]["id"].as_str().unwrap()));
}

#[tokio::test]
async fn notification_stream_carries_only_own_rows_and_releases_on_drop() {
    let state = AppState::fake();
    let app = build_app(state.clone());
    let (ben, _) = register(&app, "ben@example.com", "Ben").await;
    let (ana, _) = register(&app, "ana@example.com", "Ana").await;
    let (_, bens) = call(&app, "POST", "/api/v1/items", Some(&ben), Some(carrots(2))).await;
    let (_, anas) = call(&app, "POST", "/api/v1/items", Some(&ana), Some(carrots(1))).await;
    assert_eq!(state.feed.active_subscriptions(), 0);

    let request = Request::builder()
        .uri("/api/v1/notifications/stream")
        .header(header::AUTHORIZATION, format!("Bearer {}", ben))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(state.feed.active_subscriptions(), 1);
    let mut frames = response.into_body().into_data_stream();

    // Ana's inbox first, then Ben's.
    let uri = format!("/api/v1/items/{}/requests", anas["item"]["id"].as_str().unwrap());
    let (status, _) = call(&app, "POST", &uri, Some(&ben), None).await;
    assert_eq!(status, StatusCode::CREATED);
    let uri = format!("/api/v1/items/{}/requests", bens["item"]["id"].as_str().unwrap());
    let (status, _) = call(&app, "POST", &uri, Some(&ana), None).await;
    assert_eq!(status, StatusCode::CREATED);

    let frame = tokio::time::timeout(Duration::from_secs(5), frames.next())
        .await
        .expect("frame before timeout")
        .expect("stream still open")
        .unwrap();
    let text = String::from_utf8(frame.to_vec()).unwrap();
    assert!(text.contains("event: notification"), "{text}");
    assert!(text.contains("Ana requested your Carrots"), "{text}");
    assert!(!text.contains("Ben requested"), "{text}");

    drop(frames);
    assert_eq!(state.feed.active_subscriptions(), 0);
}
