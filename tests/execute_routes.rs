//! Execution Endpoint Tests
//!
//! Full HTTP surface over a real listener: name source priority (query
//! parameter, body field, path segment), verb enforcement at the engine
//! level, GET query-string isolation, and the health probe.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use nimbus::config::{DatabaseConfig, HttpConfig, WorkerConfig};
use nimbus::db::Database;
use nimbus::definitions::{
    DefinitionStore, FunctionDefinition, HttpMethod, Language, MemoryDefinitionStore,
};
use nimbus::engine::Engine;
use nimbus::http_server::HttpServer;
use nimbus::runtime::EmbeddedRuntime;
use nimbus::worker::WorkerClient;

struct ServerUnderTest {
    addr: SocketAddr,
    store: Arc<MemoryDefinitionStore>,
    _dir: tempfile::TempDir,
}

async fn spawn_server() -> ServerUnderTest {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("server.db");
    let db = Database::connect(&DatabaseConfig {
        backend: "sqlite".to_string(),
        url: format!("sqlite://{}?mode=rwc", path.display()),
        max_connections: 1,
    })
    .await
    .unwrap();

    let store = Arc::new(MemoryDefinitionStore::new());
    let engine = Engine::new(
        Arc::clone(&store) as Arc<dyn DefinitionStore>,
        db,
        EmbeddedRuntime::new(Duration::from_secs(5)),
        WorkerClient::new(
            WorkerConfig {
                port: 1,
                autostart: false,
                request_timeout_ms: 300,
                ..Default::default()
            },
            5_000,
            None,
        ),
    );

    let router = HttpServer::new(engine, HttpConfig::default()).router();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    ServerUnderTest {
        addr,
        store,
        _dir: dir,
    }
}

fn register_hello(store: &MemoryDefinitionStore) {
    store
        .register_function(FunctionDefinition::new(
            "hello",
            r#"response.success = true; response.data = #{ msg: "hi" };"#,
            Language::Rhai,
            HttpMethod::Get,
        ))
        .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_health_probe() {
    let server = spawn_server().await;
    let response = reqwest::get(format!("http://{}/health", server.addr))
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], json!("ok"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_name_from_query_parameter() {
    let server = spawn_server().await;
    register_hello(&server.store);

    let response = reqwest::get(format!(
        "http://{}/cloud-functions/execute?function=hello",
        server.addr
    ))
    .await
    .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"], json!({"msg": "hi"}));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_name_from_body_field() {
    let server = spawn_server().await;
    server
        .store
        .register_function(FunctionDefinition::new(
            "by-body",
            "response.success = true;",
            Language::Rhai,
            HttpMethod::Post,
        ))
        .unwrap();

    let response = reqwest::Client::new()
        .post(format!("http://{}/cloud-functions/execute", server.addr))
        .json(&json!({"function": "by-body"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], json!(true));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_name_from_path_segment() {
    let server = spawn_server().await;
    register_hello(&server.store);

    let response = reqwest::get(format!(
        "http://{}/cloud-functions/execute/hello",
        server.addr
    ))
    .await
    .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["data"], json!({"msg": "hi"}));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_missing_name_400() {
    let server = spawn_server().await;
    let response = reqwest::get(format!("http://{}/cloud-functions/execute", server.addr))
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unknown_function_404() {
    let server = spawn_server().await;
    let response = reqwest::get(format!(
        "http://{}/cloud-functions/execute?function=ghost",
        server.addr
    ))
    .await
    .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_wrong_verb_405() {
    let server = spawn_server().await;
    server
        .store
        .register_function(FunctionDefinition::new(
            "post-only",
            "response.success = true;",
            Language::Rhai,
            HttpMethod::Post,
        ))
        .unwrap();

    let response = reqwest::get(format!(
        "http://{}/cloud-functions/execute?function=post-only",
        server.addr
    ))
    .await
    .unwrap();
    assert_eq!(response.status().as_u16(), 405);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_get_query_string_not_merged_into_request() {
    let server = spawn_server().await;
    server
        .store
        .register_function(FunctionDefinition::new(
            "inspect-request",
            r#"response.success = true; response.data = request.len();"#,
            Language::Rhai,
            HttpMethod::Get,
        ))
        .unwrap();

    let response = reqwest::get(format!(
        "http://{}/cloud-functions/execute?function=inspect-request&extra=1&more=2",
        server.addr
    ))
    .await
    .unwrap();

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["data"], json!(0));
}
