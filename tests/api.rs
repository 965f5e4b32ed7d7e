mod common;

use axum::body::Body;
use axum::http::{ Request, StatusCode };
use axum::Router;
use common::{ agent_with, FakeChat, Scripted };
use serde_json::{ json, Value };
use std::sync::Arc;
use tower::ServiceExt;

use youniq_agent::server::api::{ router, AppState };

fn app(script: Vec<Scripted>, api_key: Option<&str>) -> Router {
    router(AppState {
        agent: Arc::new(agent_with(FakeChat::new(script), 5)),
        api_key: api_key.map(str::to_string),
    })
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, body)
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn conversation_lifecycle() {
    let app = app(vec![Scripted::Reply("You can do it!")], None);

    let (status, created) = send(&app, post("/api/conversations", json!({ "persona": "coach" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["title"], "New Conversation");

    let (status, turn) = send(
        &app,
        post(&format!("/api/conversations/{}/messages", id), json!({ "text": "Motivate me" }))
    ).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(turn["reply"]["text"], "You can do it!");
    assert_eq!(turn["reply"]["isUser"], false);
    assert_eq!(turn["conversation"]["messages"].as_array().unwrap().len(), 3);

    let (status, list) = send(&app, get("/api/conversations")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let delete = Request::delete(format!("/api/conversations/{}", id)).body(Body::empty()).unwrap();
    let (status, _) = send(&app, delete).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, get(&format!("/api/conversations/{}", id))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn create_without_body_uses_default_persona() {
    let app = app(vec![], None);
    let req = Request::post("/api/conversations").body(Body::empty()).unwrap();
    let (status, created) = send(&app, req).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["persona"], "coach");
}

#[tokio::test]
async fn roadmap_endpoint_returns_graph() {
    let app = app(vec![Scripted::Reply("| Basics\n|| Variables\n| Advanced")], None);
    let (status, body) = send(
        &app,
        post("/api/roadmap", json!({ "topic": "Python", "time": 2, "unit": "weeks" }))
    ).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Python");
    assert_eq!(body["graph"]["nodes"].as_array().unwrap().len(), 3);
    // One chain edge between the main topics, one child edge.
    assert_eq!(body["graph"]["edges"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn invalid_roadmap_request_is_bad_request() {
    let app = app(vec![], None);
    let (status, body) = send(
        &app,
        post("/api/roadmap", json!({ "topic": " ", "time": 2, "unit": "days" }))
    ).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("topic"));
}

#[tokio::test]
async fn provider_failure_is_bad_gateway() {
    let app = app(vec![Scripted::Fail], None);
    let (status, _) = send(
        &app,
        post("/api/roadmap/details", json!({ "label": "Loops", "topic": "Python" }))
    ).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn quiz_check_falls_back_to_local_grading() {
    let app = app(vec![Scripted::Reply("well done")], None);
    let (status, body) = send(
        &app,
        post(
            "/api/quiz/check",
            json!({
                "question": { "question": "2 + 2?", "options": ["3", "4"], "correctAnswer": "4" },
                "answer": "4"
            })
        )
    ).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["correct"], true);
    assert_eq!(body["correctAnswer"], "4");
}

#[tokio::test]
async fn doubts_endpoint_returns_extended_history() {
    let app = app(vec![Scripted::Reply("Recursion is a function calling itself.")], None);
    let (status, body) = send(
        &app,
        post("/api/doubts", json!({ "messages": [], "question": "What is recursion?" }))
    ).await;
    assert_eq!(status, StatusCode::OK);
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1]["text"], "Recursion is a function calling itself.");
}

#[tokio::test]
async fn videos_without_key_is_unavailable() {
    let app = app(vec![], None);
    let (status, _) = send(&app, get("/api/videos?q=rust")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn api_key_guards_everything_but_health() {
    let app = app(vec![], Some("s3cret"));

    let (status, body) = send(&app, get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, _) = send(&app, get("/api/conversations")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = Request::get("/api/conversations").header("X-API-Key", "s3cret").body(Body::empty()).unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn reload_without_prompts_file_is_unchanged() {
    let app = app(vec![], None);
    let (status, body) = send(&app, get("/api/reload-prompts")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Prompts unchanged");
}

#[tokio::test]
async fn https_config_loads_once_provider_is_installed() {
    youniq_agent::server::install_crypto_provider();
    // A second install is a no-op.
    youniq_agent::server::install_crypto_provider();

    let dir = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data");
    let config = axum_server::tls_rustls::RustlsConfig
        ::from_pem_file(format!("{}/cert.pem", dir), format!("{}/key.pem", dir)).await;
    assert!(config.is_ok());
}
