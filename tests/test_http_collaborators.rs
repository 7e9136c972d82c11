use axum::extract::Multipart;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;
use std::time::Duration;
use trackmix::convert::{ConversionClient, ConversionError, HttpConversionClient};
use trackmix::merge::{HttpMergeClient, MergeClient, MergeError, MergeMode};
use trackmix::models::SourceFile;

const TIMEOUT: Duration = Duration::from_secs(5);

fn tracing_init() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Serve `app` on an ephemeral local port and return its base URL
async fn spawn_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Collect (part name, file name, body) for every multipart field
async fn read_parts(mut multipart: Multipart) -> Vec<(String, Option<String>, Vec<u8>)> {
    let mut parts = Vec::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let bytes = field.bytes().await.unwrap().to_vec();
        parts.push((name, file_name, bytes));
    }
    parts
}

#[tokio::test]
async fn test_conversion_posts_file_part_and_returns_text() {
    tracing_init();
    let app = Router::new().route(
        "/convert-fit",
        post(|multipart: Multipart| async move {
            let parts = read_parts(multipart).await;
            assert_eq!(parts.len(), 1);
            let (name, file_name, bytes) = &parts[0];
            assert_eq!(name, "file");
            assert_eq!(file_name.as_deref(), Some("ride.fit"));
            format!("<gpx><!-- {} bytes --></gpx>", bytes.len())
        }),
    );
    let base = spawn_server(app).await;

    let client = HttpConversionClient::new(base, TIMEOUT).unwrap();
    let text = client
        .convert(&SourceFile::new("ride.fit", vec![1u8; 12]))
        .await
        .unwrap();

    assert_eq!(text, "<gpx><!-- 12 bytes --></gpx>");
}

#[tokio::test]
async fn test_conversion_failure_status_is_reported() {
    tracing_init();
    let app = Router::new().route(
        "/convert-fit",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "conversion crashed") }),
    );
    let base = spawn_server(app).await;

    let client = HttpConversionClient::new(format!("{}/", base), TIMEOUT).unwrap();
    let err = client
        .convert(&SourceFile::new("ride.fit", vec![1u8; 12]))
        .await
        .unwrap_err();

    assert!(matches!(err, ConversionError::Status(500)));
}

#[tokio::test]
async fn test_merge_returns_body_bytes_as_artifact() {
    tracing_init();
    let app = Router::new().route(
        "/upload",
        post(|multipart: Multipart| async move {
            let parts = read_parts(multipart).await;
            let files: Vec<String> = parts
                .iter()
                .filter(|(name, _, _)| name == "files")
                .filter_map(|(_, file_name, _)| file_name.clone())
                .collect();
            let merge = parts
                .iter()
                .find(|(name, _, _)| name == "merge")
                .map(|(_, _, bytes)| String::from_utf8_lossy(bytes).into_owned())
                .unwrap_or_default();
            (
                [("content-type", "application/gpx+xml")],
                format!("{} merge={}", files.join(","), merge),
            )
        }),
    );
    let base = spawn_server(app).await;

    let client = HttpMergeClient::new(base, TIMEOUT).unwrap();
    let files = vec![
        SourceFile::new("a.gpx", b"<gpx/>".to_vec()),
        SourceFile::new("b.fit", vec![0u8; 8]),
    ];

    let artifact = client.merge(&files, MergeMode::Merged).await.unwrap();
    assert_eq!(artifact.file_name, "combined.gpx");
    assert_eq!(artifact.bytes, b"a.gpx,b.fit merge=true".to_vec());

    let artifact = client.merge(&files, MergeMode::Separate).await.unwrap();
    assert_eq!(artifact.bytes, b"a.gpx,b.fit merge=false".to_vec());
}

#[tokio::test]
async fn test_merge_error_body_is_shown_verbatim() {
    tracing_init();
    let app = Router::new().route(
        "/upload",
        post(|| async {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "No valid GPX data found" })),
            )
        }),
    );
    let base = spawn_server(app).await;

    let client = HttpMergeClient::new(base, TIMEOUT).unwrap();
    let err = client
        .merge(
            &[SourceFile::new("a.gpx", b"<gpx/>".to_vec())],
            MergeMode::Separate,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, MergeError::Rejected(_)));
    assert_eq!(err.user_message(), "No valid GPX data found");
}

#[tokio::test]
async fn test_merge_json_error_with_success_status_is_a_failure() {
    tracing_init();
    let app = Router::new().route(
        "/upload",
        post(|| async { Json(json!({ "error": "Too many files" })).into_response() }),
    );
    let base = spawn_server(app).await;

    let client = HttpMergeClient::new(base, TIMEOUT).unwrap();
    let err = client
        .merge(
            &[SourceFile::new("a.gpx", b"<gpx/>".to_vec())],
            MergeMode::Separate,
        )
        .await
        .unwrap_err();

    assert_eq!(err.user_message(), "Too many files");
}

#[tokio::test]
async fn test_merge_failure_without_message_uses_fallback() {
    tracing_init();
    let app = Router::new().route(
        "/upload",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "Traceback (most recent call last)") }),
    );
    let base = spawn_server(app).await;

    let client = HttpMergeClient::new(base, TIMEOUT).unwrap();
    let err = client
        .merge(
            &[SourceFile::new("a.gpx", b"<gpx/>".to_vec())],
            MergeMode::Separate,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, MergeError::Status(500)));
    assert_eq!(err.user_message(), "Failed to combine GPX files.");
}
