//! The HTTP front end, driven through the router service and over a socket.

use std::time::Duration;

use axum::http::{header, Request, StatusCode};
use axum::body::Body;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use segment_router::HttpServer;

mod common;

use common::{body_string, get, get_with_bearer, ADMIN_KEY, EDITOR_TOKEN};

#[tokio::test]
async fn test_dispatch_over_http() {
    let router = HttpServer::new(common::sample_config()).unwrap().router();

    let response = router.clone().oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let id = response.headers()["x-request-id"].to_str().unwrap().to_string();
    assert!(Uuid::parse_str(&id).is_ok());
    assert_eq!(body_string(response).await, "Welcome");

    let response = router.clone().oneshot(get("/blog/posts/42")).await.unwrap();
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html");
    assert_eq!(body_string(response).await, "<h1>Post 42</h1>");
}

#[tokio::test]
async fn test_incoming_request_id_is_kept() {
    let router = HttpServer::new(common::sample_config()).unwrap().router();
    let request = Request::builder()
        .uri("/about")
        .header("x-request-id", "trace-me")
        .body(Body::empty())
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "trace-me");
}

#[tokio::test]
async fn test_error_statuses() {
    let router = HttpServer::new(common::sample_config()).unwrap().router();

    let response = router.clone().oneshot(get("/blog/edit/42")).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = router
        .clone()
        .oneshot(get_with_bearer("/blog/edit/42", EDITOR_TOKEN))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "Editing post 42");

    let response = router.clone().oneshot(get("/blog/posts/42/edit")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body_string(response).await,
        "blog can't handle sub-URLs: 'edit' was not parsed"
    );
}

#[tokio::test]
async fn test_unhandled_is_not_found() {
    let config = common::config(
        r#"
        [[handlers]]
        name = "app"
        default_rule = false
        rules = [{ pattern = "ping", action = "pong" }]
        allowed_actions = { pong = true }
        actions.pong = { body = "pong" }
        "#,
    );
    let router = HttpServer::new(config).unwrap().router();

    let response = router.clone().oneshot(get("/ping")).await.unwrap();
    assert_eq!(body_string(response).await, "pong");

    let response = router.oneshot(get("/elsewhere")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body_string(response).await,
        "No rule on app matched 'elsewhere'"
    );
}

#[tokio::test]
async fn test_admin_api() {
    let server = HttpServer::new(common::sample_config()).unwrap();
    let router = server.router();

    let response = router.clone().oneshot(get("/admin/status")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = router
        .clone()
        .oneshot(get_with_bearer("/admin/status", ADMIN_KEY))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let status: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(status["root"], "app");
    assert_eq!(status["handlers"], 3);
    assert_eq!(status["principals"], 1);

    let response = router
        .clone()
        .oneshot(get_with_bearer("/admin/handlers", ADMIN_KEY))
        .await
        .unwrap();
    let handlers: Value = serde_json::from_str(&body_string(response).await).unwrap();
    let blog = handlers
        .as_array()
        .unwrap()
        .iter()
        .find(|h| h["name"] == "blog")
        .unwrap();
    assert_eq!(blog["rules"][0]["pattern"], "GET feed");
    assert_eq!(blog["rules"][2]["pattern"], "$Action//$ID/$OtherID");
    assert_eq!(blog["allowed_actions"]["edit"], "EDIT_POSTS");

    router.clone().oneshot(get("/blog/posts/1")).await.unwrap();
    router.clone().oneshot(get("/blog/edit/1")).await.unwrap();
    let response = router
        .oneshot(get_with_bearer("/admin/stats", ADMIN_KEY))
        .await
        .unwrap();
    let stats: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(stats["total"], 2);
    assert_eq!(stats["handlers"]["blog"]["handled"], 1);
    assert_eq!(stats["handlers"]["blog"]["errors"], 1);
}

#[tokio::test]
async fn test_apply_config_swaps_tree() {
    let server = HttpServer::new(common::sample_config()).unwrap();
    let state = server.state();
    let router = server.router();

    let mut next = common::sample_config();
    next.handlers[0].actions.get_mut("index").unwrap().body = "Welcome back".into();
    state.apply_config(next).unwrap();

    let response = router.clone().oneshot(get("/")).await.unwrap();
    assert_eq!(body_string(response).await, "Welcome back");

    let mut broken = common::sample_config();
    broken.dispatch.root = "missing".into();
    assert!(state.apply_config(broken).is_err());

    let response = router.oneshot(get("/")).await.unwrap();
    assert_eq!(body_string(response).await, "Welcome back");
}

#[tokio::test]
async fn test_server_over_socket_with_reload() {
    let server = common::start_server(common::sample_config()).await;
    let client = reqwest::Client::new();
    let url = format!("http://{}/about", server.addr);

    let body = client.get(&url).send().await.unwrap().text().await.unwrap();
    assert_eq!(body, "About us");

    let mut next = common::sample_config();
    next.handlers[0].actions.get_mut("about").unwrap().body = "About v2".into();
    server.updates.send(next).unwrap();

    let mut body = String::new();
    for _ in 0..50 {
        body = client.get(&url).send().await.unwrap().text().await.unwrap();
        if body == "About v2" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(body, "About v2");

    server.shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), server.handle)
        .await
        .unwrap()
        .unwrap();
}
