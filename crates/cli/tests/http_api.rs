use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use filemap_cli::http_api;
use filemap_indexer::{Document, MapConfig, MapIndexer};
use futures::StreamExt;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

async fn indexer_with(files: &[(&str, &str)]) -> (TempDir, Arc<MapIndexer>) {
    let temp = TempDir::new().expect("tempdir");
    let root = temp.path().join("data");
    tokio::fs::create_dir_all(&root).await.expect("create root");
    for (name, body) in files {
        tokio::fs::write(root.join(name), body).await.expect("write");
    }
    let indexer = MapIndexer::new(
        MapConfig::new(&root).with_snapshot_path(temp.path().join("data.json")),
    )
    .await
    .expect("indexer");
    indexer.index_existing().await.expect("index");
    (temp, Arc::new(indexer))
}

async fn get(app: axum::Router, uri: &str) -> axum::response::Response {
    app.oneshot(Request::get(uri).body(Body::empty()).expect("request"))
        .await
        .expect("response")
}

#[tokio::test]
async fn banner_names_the_port() {
    let (_temp, indexer) = indexer_with(&[]).await;
    let response = get(http_api::router(indexer, 5000), "/").await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"File Mapping Backend @ 5000");
}

#[tokio::test]
async fn data_returns_the_current_snapshot() {
    let (_temp, indexer) =
        indexer_with(&[("a.txt", "quick heron"), ("b.txt", "slow ibis")]).await;
    let response = get(http_api::router(indexer.clone(), 5000), "/data").await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let docs: Vec<Document> = serde_json::from_slice(&body).expect("document array");
    assert_eq!(docs, indexer.snapshot().to_vec());
    assert!(docs.iter().all(|d| d.coordinates().is_some()));
}

#[tokio::test]
async fn empty_corpus_is_an_empty_array() {
    let (_temp, indexer) = indexer_with(&[]).await;
    let response = get(http_api::router(indexer, 5000), "/data").await;
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"[]");
}

#[tokio::test]
async fn raw_file_is_served_with_a_guessed_type() {
    let (_temp, indexer) = indexer_with(&[("notes.txt", "grey heron")]).await;
    let response = get(http_api::router(indexer, 5000), "/data/notes.txt").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE].to_str().unwrap(),
        "text/plain"
    );
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"grey heron");
}

#[tokio::test]
async fn raw_file_missing_or_escaping() {
    let (temp, indexer) = indexer_with(&[]).await;
    tokio::fs::write(temp.path().join("secret.txt"), "hidden")
        .await
        .unwrap();
    let app = http_api::router(indexer, 5000);

    let missing = get(app.clone(), "/data/missing.txt").await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let escaping = get(app, "/data/..%2Fsecret.txt").await;
    assert_eq!(escaping.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn cors_allows_any_origin() {
    let (_temp, indexer) = indexer_with(&[]).await;
    let response = http_api::router(indexer, 5000)
        .oneshot(
            Request::get("/data")
                .header(header::ORIGIN, "http://localhost:3000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}

#[tokio::test]
async fn events_push_the_snapshot_then_each_update() {
    let (temp, indexer) = indexer_with(&[("a.txt", "quick heron")]).await;
    let response = get(http_api::router(indexer.clone(), 5000), "/events").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let mut body = response.into_body().into_data_stream();
    let first = next_event(&mut body).await;
    assert!(first.starts_with("event: update\n"), "{first}");
    assert!(first.contains("\"a.txt\""));

    let path = temp.path().join("data").join("b.txt");
    tokio::fs::write(&path, "slow ibis").await.unwrap();
    indexer.update(&path).await.unwrap();

    let second = next_event(&mut body).await;
    assert!(second.starts_with("event: update\n"), "{second}");
    assert!(second.contains("\"b.txt\""));
}

async fn next_event(body: &mut axum::body::BodyDataStream) -> String {
    let mut text = String::new();
    while !text.ends_with("\n\n") {
        let chunk = tokio::time::timeout(Duration::from_secs(10), body.next())
            .await
            .expect("event before timeout")
            .expect("stream open")
            .expect("chunk");
        text.push_str(std::str::from_utf8(&chunk).expect("utf-8"));
    }
    text
}
