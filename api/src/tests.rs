//! Router-level tests over an in-memory RAG core.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use rag_store::{
    BackendKind, ChatModel, Embedder, MemoryBackend, NOT_FOUND_ANSWER, RagConfig, RagError,
    RagResult, RagStore,
};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use super::*;

struct LengthEmbedder;

#[async_trait]
impl Embedder for LengthEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| vec![t.len() as f32, 1.0, 0.5, 0.25])
            .collect())
    }
}

struct FixedChat;

#[async_trait]
impl ChatModel for FixedChat {
    async fn complete(&self, _prompt: &str) -> RagResult<String> {
        Ok("the answer".into())
    }
}

fn memory_core() -> RagCore {
    RagCore::new(Arc::new(|| -> CoreFuture {
        Box::pin(async {
            let cfg = RagConfig {
                backend: BackendKind::Memory,
                ..RagConfig::default()
            };
            RagStore::new(
                cfg,
                Arc::new(MemoryBackend::new()),
                Arc::new(LengthEmbedder),
                Arc::new(FixedChat),
            )
            .await
        })
    }))
}

fn failing_core() -> RagCore {
    RagCore::new(Arc::new(|| -> CoreFuture {
        Box::pin(async { Err(RagError::Config("QDRANT_URL is empty".into())) })
    }))
}

fn app(core: RagCore, uploads: &TempDir) -> Router {
    let settings = ApiSettings {
        upload_dir: uploads.path().to_path_buf(),
        max_file_size_mb: 1,
        ..ApiSettings::default()
    };
    router(Arc::new(AppState::new(settings, core)))
}

async fn body_json(res: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn file<'a>(name: &'a str, content: &'a [u8]) -> Option<(&'a str, &'a [u8])> {
    Some((name, content))
}

const BOUNDARY: &str = "X-TEST-BOUNDARY";

fn multipart(fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((filename, content)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::post("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn index_lists_endpoints() {
    let dir = tempfile::tempdir().unwrap();
    let res = app(memory_core(), &dir)
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["endpoints"]["upload"], "/upload");
}

#[tokio::test]
async fn health_is_degraded_until_core_is_built() {
    let dir = tempfile::tempdir().unwrap();
    let state = Arc::new(AppState::new(
        ApiSettings {
            upload_dir: dir.path().to_path_buf(),
            ..ApiSettings::default()
        },
        failing_core(),
    ));
    assert!(state.core.get().await.is_err());

    let res = router(state)
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = body_json(res).await;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["rag_indexer"], "not initialized");
    assert_eq!(body["error"], "config error: QDRANT_URL is empty");
}

#[tokio::test]
async fn unavailable_core_yields_503_and_status_body() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(failing_core(), &dir);

    let res = app
        .clone()
        .oneshot(post_json("/query", json!({"question": "q", "chat_id": "c1"})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

    let res = app
        .oneshot(Request::get("/status?chat_id=c1").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["ready"], false);
    assert!(body["message"].as_str().unwrap().contains("QDRANT_URL is empty"));
}

#[tokio::test]
async fn query_validates_input() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(memory_core(), &dir);

    let res = app
        .clone()
        .oneshot(post_json("/query", json!({"question": "  ", "chat_id": "c1"})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(res).await["message"], "Question cannot be empty");

    let res = app
        .oneshot(post_json("/chat", json!({"question": "hi", "chat_id": ""})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(res).await["message"], "chat_id is required");
}

#[tokio::test]
async fn upload_then_query_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(memory_core(), &dir);

    let res = app
        .clone()
        .oneshot(multipart(
            &[("chat_id", "c1")],
            file("notes.txt", b"Axum routes requests to handlers."),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["filename"], "notes.txt");
    assert_eq!(body["chunks"], 1);
    assert_eq!(body["has_documents"], true);
    assert!(dir.path().join("c1").is_dir());

    let res = app
        .clone()
        .oneshot(post_json(
            "/query",
            json!({"question": "What routes requests?", "chat_id": "c1"}),
        ))
        .await
        .unwrap();
    let body = body_json(res).await;
    assert_eq!(body["answer"], "the answer");
    assert_eq!(body["sources"][0]["source"], "notes.txt");

    let res = app
        .oneshot(post_json(
            "/query",
            json!({"question": "What routes requests?", "chat_id": "other"}),
        ))
        .await
        .unwrap();
    assert_eq!(body_json(res).await["answer"], NOT_FOUND_ANSWER);
}

#[tokio::test]
async fn upload_rejects_bad_input() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(memory_core(), &dir);

    let res = app
        .clone()
        .oneshot(multipart(&[("chat_id", " ")], file("a.txt", b"x")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(res).await["message"], "chat_id is required");

    let res = app
        .clone()
        .oneshot(multipart(&[("chat_id", "c1")], None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(res).await["message"], "No file provided");

    let res = app
        .clone()
        .oneshot(multipart(&[("chat_id", "c1")], file("sheet.xlsx", b"x")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(res).await["message"],
        "Unsupported type. Allowed: .pdf, .docx, .txt"
    );

    let res = app
        .oneshot(multipart(&[("chat_id", "c1")], file("empty.txt", b"   ")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(res).await["message"],
        "No text could be extracted from the file"
    );
}

#[tokio::test]
async fn oversized_upload_is_413() {
    let dir = tempfile::tempdir().unwrap();
    let big = vec![b'a'; 1024 * 1024 + 10];
    let res = app(memory_core(), &dir)
        .oneshot(multipart(&[("chat_id", "c1")], file("big.txt", &big)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body_json(res).await["message"], "File too large. Limit: 1MB");
}

#[tokio::test]
async fn reset_clears_uploads_and_validates() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(memory_core(), &dir);

    let res = app
        .clone()
        .oneshot(post_json("/reset", json!({"chat_id": ""})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    app.clone()
        .oneshot(multipart(&[("chat_id", "c1")], file("a.txt", b"some text")))
        .await
        .unwrap();
    assert!(dir.path().join("c1").exists());

    let res = app
        .oneshot(post_json("/reset", json!({"chat_id": "c1"})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Chat c1 reset. Removed 0 indexed chunks.");
    assert!(!dir.path().join("c1").exists());
}
