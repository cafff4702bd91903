//! End-to-end tests of the HTTP transport against an in-process axum server.
//!
//! Run with: `cargo test --test http_flow`

use axum::extract::{Multipart, Query, State};
use axum::http::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use gonogo_client::{
    ClientConfig, DecodingError, ExportArtifact, ExportError, ExportOutcome, GonogoError, Session,
    Submission, TransportError, WorkflowStatus,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const ZIP: &[u8] = b"PK\x03\x04fake-archive-body";
const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
const SESSION_COOKIE: &str = "gonogo_session=abc123";

// ── Test server ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct UploadedPart {
    field: String,
    file_name: Option<String>,
    content_type: Option<String>,
    len: usize,
}

struct ServerState {
    reply: Value,
    submit_status: StatusCode,
    submit_delay: Option<Duration>,
    uploads: Vec<UploadedPart>,
    downloads: Vec<(String, Option<String>)>,
}

type Shared = Arc<Mutex<ServerState>>;

fn state_replying(reply: Value) -> Shared {
    Arc::new(Mutex::new(ServerState {
        reply,
        submit_status: StatusCode::OK,
        submit_delay: None,
        uploads: Vec::new(),
        downloads: Vec::new(),
    }))
}

async fn read_file(State(state): State<Shared>, mut multipart: Multipart) -> Response {
    let mut parts = Vec::new();
    while let Ok(Some(field)) = multipart.next_field().await {
        let field_name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let len = field.bytes().await.map(|b| b.len()).unwrap_or(0);
        parts.push(UploadedPart {
            field: field_name,
            file_name,
            content_type,
            len,
        });
    }

    let delay = state.lock().unwrap().submit_delay;
    if let Some(d) = delay {
        tokio::time::sleep(d).await;
    }

    let (status, reply) = {
        let mut s = state.lock().unwrap();
        s.uploads.extend(parts);
        (s.submit_status, s.reply.clone())
    };
    (
        status,
        [(SET_COOKIE, format!("{SESSION_COOKIE}; Path=/"))],
        Json(reply),
    )
        .into_response()
}

async fn download_document(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let cookie = headers
        .get(COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let reference = query.get("file_path").cloned().unwrap_or_default();
    state
        .lock()
        .unwrap()
        .downloads
        .push((reference.clone(), cookie));

    if reference.ends_with(".docx") {
        ([(CONTENT_TYPE, DOCX_MIME)], b"PK\x03\x04docx".to_vec()).into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

/// Start the server and return its base URL.
async fn spawn_server(state: Shared) -> String {
    let app = Router::new()
        .route("/read-file", post(read_file))
        .route("/download-document", get(download_document))
        .with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/")
}

fn session_for(base_url: &str, out: &Path) -> Session {
    let config = ClientConfig::builder()
        .base_url(base_url)
        .output_dir(out)
        .request_timeout_secs(10)
        .build()
        .unwrap();
    Session::new(config).unwrap()
}

fn bundle() -> Option<Submission> {
    Some(Submission::new("dce.zip", ZIP.to_vec()))
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn narrative_is_submitted_and_exported_locally() {
    let state = state_replying(json!({
        "results": [{ "filename": "a.txt", "info": "ok" }],
        "final_results": "Résumé"
    }));
    let base = spawn_server(state.clone()).await;
    let out = tempfile::tempdir().unwrap();
    let mut session = session_for(&base, out.path());

    assert_eq!(session.analyze(bundle()).await, WorkflowStatus::Succeeded);
    assert!(session.controller().download_available());

    {
        let s = state.lock().unwrap();
        assert_eq!(s.uploads.len(), 1);
        let part = &s.uploads[0];
        assert_eq!(part.field, "zip_file");
        assert_eq!(part.file_name.as_deref(), Some("dce.zip"));
        assert_eq!(part.content_type.as_deref(), Some("application/zip"));
        assert_eq!(part.len, ZIP.len());
    }

    match session.export().await {
        ExportOutcome::Saved(ExportArtifact::LocalPdf { path, pages }) => {
            assert_eq!(path, out.path().join("resultfinal.pdf"));
            assert_eq!(pages, 1);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(state.lock().unwrap().downloads.is_empty());
}

#[tokio::test]
async fn structured_document_is_downloaded_with_session_cookie() {
    let state = state_replying(json!({
        "message": "Analyse terminée",
        "fine_tune_id": "ft-42",
        "chatgpt_analysis": { "BU": "Accueil", "Lots": [1, 2] },
        "word_document": "/tmp/out/report_123.docx"
    }));
    let base = spawn_server(state.clone()).await;
    let out = tempfile::tempdir().unwrap();
    let mut session = session_for(&base, out.path());

    assert_eq!(session.analyze(bundle()).await, WorkflowStatus::Succeeded);

    match session.export().await {
        ExportOutcome::Saved(ExportArtifact::RemoteDocument {
            path,
            content_type,
            bytes,
        }) => {
            assert_eq!(path, out.path().join("report_123.docx"));
            assert_eq!(content_type.as_deref(), Some(DOCX_MIME));
            assert_eq!(bytes, 8);
            assert_eq!(std::fs::read(&path).unwrap(), b"PK\x03\x04docx");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    let s = state.lock().unwrap();
    assert_eq!(s.downloads.len(), 1);
    let (reference, cookie) = &s.downloads[0];
    assert_eq!(reference, "/tmp/out/report_123.docx");
    assert!(
        cookie.as_deref().unwrap_or_default().contains(SESSION_COOKIE),
        "cookie not forwarded: {cookie:?}"
    );
}

#[tokio::test]
async fn failed_download_keeps_analysis() {
    let state = state_replying(json!({
        "chatgpt_analysis": { "BU": "Accueil" },
        "word_document": "/tmp/out/missing.pdf"
    }));
    let base = spawn_server(state).await;
    let out = tempfile::tempdir().unwrap();
    let mut session = session_for(&base, out.path());
    session.analyze(bundle()).await;

    let outcome = session.export().await;

    assert!(matches!(
        outcome,
        ExportOutcome::Failed(ExportError::Transport(TransportError::Status { status: 404, .. }))
    ));
    assert_eq!(session.controller().status(), WorkflowStatus::Succeeded);
    assert!(session.controller().result().is_some());
    assert!(!session.controller().is_exporting());
    assert!(!out.path().join("missing.pdf").exists());
}

#[tokio::test]
async fn server_error_status_fails_submission() {
    let state = state_replying(json!({ "error": "boom" }));
    state.lock().unwrap().submit_status = StatusCode::INTERNAL_SERVER_ERROR;
    let base = spawn_server(state).await;
    let out = tempfile::tempdir().unwrap();
    let mut session = session_for(&base, out.path());

    assert_eq!(session.analyze(bundle()).await, WorkflowStatus::Failed);
    assert!(matches!(
        session.controller().error(),
        Some(GonogoError::Transport(TransportError::Status { status: 500, .. }))
    ));
    assert!(!session.controller().download_available());
}

#[tokio::test]
async fn error_envelope_with_ok_status_is_a_decoding_error() {
    let state = state_replying(json!({ "error": "Aucun fichier exploitable" }));
    let base = spawn_server(state).await;
    let out = tempfile::tempdir().unwrap();
    let mut session = session_for(&base, out.path());

    assert_eq!(session.analyze(bundle()).await, WorkflowStatus::Failed);
    match session.controller().error() {
        Some(GonogoError::Decoding(DecodingError::ServiceReported { message })) => {
            assert_eq!(message, "Aucun fichier exploitable")
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn missing_file_sends_nothing() {
    let state = state_replying(json!({ "results": [] }));
    let base = spawn_server(state.clone()).await;
    let out = tempfile::tempdir().unwrap();
    let mut session = session_for(&base, out.path());

    assert_eq!(session.analyze(None).await, WorkflowStatus::Failed);
    assert!(state.lock().unwrap().uploads.is_empty());
}

#[tokio::test]
async fn slow_server_times_out() {
    let state = state_replying(json!({ "results": [] }));
    state.lock().unwrap().submit_delay = Some(Duration::from_secs(5));
    let base = spawn_server(state).await;
    let out = tempfile::tempdir().unwrap();
    let config = ClientConfig::builder()
        .base_url(base)
        .output_dir(out.path())
        .request_timeout_secs(1)
        .build()
        .unwrap();
    let mut session = Session::new(config).unwrap();

    assert_eq!(session.analyze(bundle()).await, WorkflowStatus::Failed);
    assert!(matches!(
        session.controller().error(),
        Some(GonogoError::Transport(TransportError::Timeout { secs: 1, .. }))
    ));
}

#[tokio::test]
async fn unreachable_service_is_a_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let out = tempfile::tempdir().unwrap();
    let mut session = session_for(&format!("http://{addr}/"), out.path());

    assert_eq!(session.analyze(bundle()).await, WorkflowStatus::Failed);
    assert!(matches!(
        session.controller().error(),
        Some(GonogoError::Transport(TransportError::Network { .. }))
    ));
}
