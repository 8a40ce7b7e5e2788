use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use kbsearch_core::persist::{save_snapshot, IndexPaths, SnapshotFormat};
use kbsearch_core::{RawDocument, Snapshot};
use serde_json::Value;
use server::{build_app, ServerConfig};
use std::fs;
use tempfile::tempdir;
use tower::ServiceExt;

fn tiny_corpus() -> Snapshot {
    Snapshot::build(vec![
        RawDocument::new("guides/docker.md", Some("Docker basics".into()), Some(vec!["ops".into()]), Some("docker container image docker".into())),
        RawDocument::new("guides/python.md", Some("Python basics".into()), None, Some("python list dict".into())),
        RawDocument::new("guides/compose.md", Some("Compose".into()), None, Some("docker compose services".into())),
    ])
}

fn config(dir: &std::path::Path) -> ServerConfig {
    ServerConfig { admin_token: Some("secret".into()), ..ServerConfig::new(dir) }
}

async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Bytes) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    (status, body)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Bytes) {
    call(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn reload(app: &Router, token: &str) -> StatusCode {
    let req = Request::post("/index/reload").header("X-ADMIN-TOKEN", token).body(Body::empty()).unwrap();
    call(app, req).await.0
}

#[tokio::test]
async fn search_returns_ranked_results() {
    let dir = tempdir().unwrap();
    save_snapshot(&IndexPaths::new(dir.path()), &tiny_corpus(), SnapshotFormat::Json).unwrap();
    let app = build_app(config(dir.path()));

    let (status, body) = get(&app, "/search?q=docker&k=5").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    let arr = json["results"].as_array().unwrap();
    assert_eq!(arr.len(), 2);
    assert_eq!(arr[0]["path"], "guides/docker.md");
    assert_eq!(arr[0]["title"], "Docker basics");
    assert_eq!(arr[1]["path"], "guides/compose.md");
    assert!(arr[0]["score"].as_f64().unwrap() > arr[1]["score"].as_f64().unwrap());
    assert_eq!(json["total_hits"], 2);
}

#[tokio::test]
async fn limit_is_validated_and_applied() {
    let dir = tempdir().unwrap();
    save_snapshot(&IndexPaths::new(dir.path()), &tiny_corpus(), SnapshotFormat::Bincode).unwrap();
    let app = build_app(config(dir.path()));

    let (status, _) = get(&app, "/search?q=docker&k=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = get(&app, "/search?q=docker&k=-3").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = get(&app, "/search?q=docker&k=1").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["results"].as_array().unwrap().len(), 1);
    assert_eq!(json["total_hits"], 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn reload_publishes_rebuilt_index() {
    let dir = tempdir().unwrap();
    let paths = IndexPaths::new(dir.path());
    save_snapshot(&paths, &tiny_corpus(), SnapshotFormat::Json).unwrap();
    let app = build_app(config(dir.path()));

    let rebuilt = Snapshot::build(vec![RawDocument::new("guides/rust.md", Some("Rust".into()), None, Some("cargo crates".into()))]);
    save_snapshot(&paths, &rebuilt, SnapshotFormat::Bincode).unwrap();
    let req = Request::post("/index/reload").header("X-ADMIN-TOKEN", "secret").body(Body::empty()).unwrap();
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["num_docs"], 1);

    let (_, body) = get(&app, "/search?q=docker").await;
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["total_hits"], 0);
    let (status, _) = get(&app, "/doc?path=guides%2Frust.md").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn not_ready_until_reload() {
    let dir = tempdir().unwrap();
    let app = build_app(config(dir.path()));

    let (status, _) = get(&app, "/search?q=docker").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let (status, _) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(reload(&app, "wrong").await, StatusCode::UNAUTHORIZED);
    assert_eq!(reload(&app, "secret").await, StatusCode::UNPROCESSABLE_ENTITY);

    save_snapshot(&IndexPaths::new(dir.path()), &tiny_corpus(), SnapshotFormat::Json).unwrap();
    assert_eq!(reload(&app, "secret").await, StatusCode::OK);
    let (status, _) = get(&app, "/search?q=docker").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn corrupt_reload_keeps_previous_snapshot() {
    let dir = tempdir().unwrap();
    save_snapshot(&IndexPaths::new(dir.path()), &tiny_corpus(), SnapshotFormat::Json).unwrap();
    let app = build_app(config(dir.path()));

    fs::write(dir.path().join("index.json"), br#"{"documents": {}, "index": {}}"#).unwrap();
    assert_eq!(reload(&app, "secret").await, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = get(&app, "/search?q=python").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["results"][0]["path"], "guides/python.md");
}

#[tokio::test]
async fn doc_lookup_by_path() {
    let dir = tempdir().unwrap();
    save_snapshot(&IndexPaths::new(dir.path()), &tiny_corpus(), SnapshotFormat::Json).unwrap();
    let app = build_app(config(dir.path()));

    let (status, body) = get(&app, "/doc?path=guides%2Fdocker.md").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["title"], "Docker basics");
    assert_eq!(json["tags"][0], "ops");
    assert_eq!(json["word_count"], 11);

    let (status, _) = get(&app, "/doc?path=missing.md").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
