// Integration tests for the JSON request logger middleware
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    routing::get,
    Extension, Router,
};
use serde_json::{json, Value};
use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use loggate::{json_logger, HandlerError, JsonLogger, LoggerConfig, RequestId, Target};

#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<u8>>>);

impl Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Capture {
    fn target(&self) -> Target {
        let sink = self.clone();
        Target::Writer(BoxMakeWriter::new(move || sink.clone()))
    }

    fn records(&self) -> Vec<Value> {
        let text = String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned();
        text.lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }
}

struct TestApp {
    app: Router,
    info: Capture,
    errors: Capture,
    observed: Arc<AtomicUsize>,
}

fn build_app(config: LoggerConfig) -> TestApp {
    let info = Capture::default();
    let errors = Capture::default();
    let observed = Arc::new(AtomicUsize::new(0));
    let counter = observed.clone();

    let logger = JsonLogger::builder(config)
        .info_target(info.target())
        .error_target(errors.target())
        .on_error(move |_: &HandlerError, _: &loggate::RequestContext| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .build();

    let app = Router::new()
        .route("/ok", get(|| async { "hello" }))
        .route(
            "/whoami",
            get(|Extension(id): Extension<RequestId>| async move { id.to_string() }),
        )
        .route(
            "/teapot",
            get(|| async { (StatusCode::IM_A_TEAPOT, "short and stout") }),
        )
        .route(
            "/missing",
            get(|| async {
                Err::<String, _>(HandlerError::new("widget 9 not found").with_status_code(404))
            }),
        )
        .route(
            "/gone",
            get(|| async { Err::<String, _>(HandlerError::new("expired").with_status(410)) }),
        )
        .route(
            "/boom",
            get(|| async { Err::<String, _>(HandlerError::new("db password is hunter2")) }),
        )
        .route(
            "/disk",
            get(|| async {
                Err::<String, _>(HandlerError::new("write failed").with_error("disk full"))
            }),
        )
        .route(
            "/panic",
            get(|| async {
                if true {
                    panic!("handler exploded");
                }
                "unreachable"
            }),
        )
        .layer(axum::middleware::from_fn_with_state(logger, json_logger));

    TestApp {
        app,
        info,
        errors,
        observed,
    }
}

async fn send(app: &Router, uri: &str) -> (StatusCode, header::HeaderMap, String) {
    let request = Request::builder()
        .uri(uri)
        .header("authorization", "Bearer X")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, String::from_utf8(bytes.to_vec()).unwrap())
}

#[tokio::test]
async fn test_success_emits_one_info_record() {
    let t = build_app(LoggerConfig::default());
    let (status, headers, body) = send(&t.app, "/ok?x=1").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "hello");
    assert_eq!(headers[header::CONTENT_TYPE], "application/json; charset=utf-8");

    let records = t.info.records();
    assert_eq!(records.len(), 1);
    assert!(t.errors.records().is_empty());

    let record = &records[0];
    assert_eq!(record["level"], 30);
    assert!(uuid::Uuid::parse_str(record["uid"].as_str().unwrap()).is_ok());
    assert!(record["res"]["responseTime"].as_u64().is_some());
    assert_eq!(record["res"]["statusCode"], 200);
    assert_eq!(
        record["res"]["header"]["content-type"],
        "application/json; charset=utf-8"
    );
    assert_eq!(record["req"]["url"], "/ok?x=1");
    assert_eq!(record["req"]["query"], json!({"x": "1"}));
    assert_eq!(t.observed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_correlation_id_reaches_handler_and_log() {
    let t = build_app(LoggerConfig::default());
    let (_, _, body) = send(&t.app, "/whoami").await;

    let records = t.info.records();
    assert_eq!(records[0]["uid"], body.as_str());
}

#[tokio::test]
async fn test_each_request_gets_a_fresh_id() {
    let t = build_app(LoggerConfig::default());
    send(&t.app, "/ok").await;
    send(&t.app, "/ok").await;

    let records = t.info.records();
    assert_eq!(records.len(), 2);
    assert_ne!(records[0]["uid"], records[1]["uid"]);
}

#[tokio::test]
async fn test_error_status_without_failure_is_informational() {
    let t = build_app(LoggerConfig::default());
    let (status, _, body) = send(&t.app, "/teapot").await;

    assert_eq!(status, StatusCode::IM_A_TEAPOT);
    assert_eq!(body, "short and stout");
    assert_eq!(t.info.records().len(), 1);
    assert!(t.errors.records().is_empty());
}

#[tokio::test]
async fn test_not_found_error_exposes_message() {
    let t = build_app(LoggerConfig::default());
    let (status, headers, body) = send(&t.app, "/missing").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(headers[header::CONTENT_TYPE], "application/json; charset=utf-8");
    assert_eq!(
        serde_json::from_str::<Value>(&body).unwrap(),
        json!({"message": "widget 9 not found"})
    );

    assert!(t.info.records().is_empty());
    let errors = t.errors.records();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["level"], 50);
    assert_eq!(errors[0]["res"]["statusCode"], 404);
    assert_eq!(errors[0]["err"]["message"], "widget 9 not found");
    assert_eq!(errors[0]["err"]["name"], "Error");
    assert_eq!(t.observed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_status_field_used_when_no_status_code() {
    let t = build_app(LoggerConfig::default());
    let (status, _, body) = send(&t.app, "/gone").await;

    assert_eq!(status, StatusCode::GONE);
    assert_eq!(
        serde_json::from_str::<Value>(&body).unwrap(),
        json!({"message": "expired"})
    );
}

#[tokio::test]
async fn test_internal_error_does_not_leak_message() {
    let t = build_app(LoggerConfig::default());
    let (status, _, body) = send(&t.app, "/boom").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        serde_json::from_str::<Value>(&body).unwrap(),
        json!({"status": 500, "error": "Internal Server Error"})
    );
    assert!(!body.contains("hunter2"));

    let errors = t.errors.records();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["err"]["message"], "db password is hunter2");
}

#[tokio::test]
async fn test_text_mode_bodies() {
    let t = build_app(LoggerConfig {
        json: false,
        ..Default::default()
    });

    let (status, headers, body) = send(&t.app, "/boom").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "Internal Server Error");
    assert_eq!(headers[header::CONTENT_TYPE], "text/plain; charset=utf-8");

    let (status, _, body) = send(&t.app, "/missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, "widget 9 not found");

    let (_, headers, _) = send(&t.app, "/ok").await;
    assert_eq!(headers[header::CONTENT_TYPE], "text/plain; charset=utf-8");
}

#[tokio::test]
async fn test_surface_errors_overrides_generic_body() {
    let t = build_app(LoggerConfig {
        surface_errors: true,
        ..Default::default()
    });

    let (status, _, body) = send(&t.app, "/disk").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        serde_json::from_str::<Value>(&body).unwrap(),
        json!({"error": "disk full"})
    );

    let (_, _, body) = send(&t.app, "/boom").await;
    assert_eq!(
        serde_json::from_str::<Value>(&body).unwrap(),
        json!({"error": "db password is hunter2"})
    );
    assert_eq!(t.observed.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_panic_is_logged_as_failure() {
    let t = build_app(LoggerConfig::default());
    let (status, _, body) = send(&t.app, "/panic").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        serde_json::from_str::<Value>(&body).unwrap(),
        json!({"status": 500, "error": "Internal Server Error"})
    );
    let errors = t.errors.records();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["err"]["name"], "Panic");
    assert_eq!(errors[0]["err"]["message"], "handler exploded");
    assert!(t.info.records().is_empty());
}

#[tokio::test]
async fn test_header_redaction_in_records() {
    let t = build_app(LoggerConfig {
        obfuscate: true,
        ..Default::default()
    });
    send(&t.app, "/ok").await;
    assert_eq!(t.info.records()[0]["req"]["header"]["authorization"], "obfuscated");

    let t = build_app(LoggerConfig::default());
    send(&t.app, "/ok").await;
    assert_eq!(t.info.records()[0]["req"]["header"]["authorization"], "Bearer X");
}

#[tokio::test]
async fn test_json_predicate_overrides_config() {
    let info = Capture::default();
    let logger = JsonLogger::builder(LoggerConfig::default())
        .json_predicate(|| false)
        .info_target(info.target())
        .error_target(Capture::default().target())
        .build();
    assert!(!logger.is_json());

    let app = Router::new()
        .route("/boom", get(|| async { Err::<String, _>(HandlerError::new("x")) }))
        .layer(axum::middleware::from_fn_with_state(logger, json_logger));

    let (_, _, body) = send(&app, "/boom").await;
    assert_eq!(body, "Internal Server Error");
}

#[tokio::test]
async fn test_file_mode_writes_named_logs() {
    let dir = tempfile::tempdir().unwrap();
    let logger = JsonLogger::new(LoggerConfig {
        name: "shop".to_string(),
        path: Some(dir.path().to_path_buf()),
        ..Default::default()
    });
    let app = Router::new()
        .route("/ok", get(|| async { "fine" }))
        .route("/boom", get(|| async { Err::<String, _>(HandlerError::new("nope")) }))
        .layer(axum::middleware::from_fn_with_state(logger, json_logger));

    send(&app, "/ok").await;
    send(&app, "/boom").await;

    let info = std::fs::read_to_string(dir.path().join("shop.log")).unwrap();
    let errors = std::fs::read_to_string(dir.path().join("shop_error.log")).unwrap();
    assert_eq!(info.lines().count(), 1);
    assert_eq!(errors.lines().count(), 1);

    let record: Value = serde_json::from_str(errors.lines().next().unwrap()).unwrap();
    assert_eq!(record["name"], "shop");
    assert_eq!(record["err"]["message"], "nope");
}

#[tokio::test]
async fn test_unwritable_log_dir_leaves_responses_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let log_dir = dir.path().join("missing").join("nested");
    let logger = JsonLogger::new(LoggerConfig {
        path: Some(log_dir.clone()),
        ..Default::default()
    });
    let app = Router::new()
        .route("/ok", get(|| async { "hello" }))
        .route(
            "/boom",
            get(|| async { Err::<String, _>(HandlerError::new("db password is hunter2")) }),
        )
        .layer(axum::middleware::from_fn_with_state(logger, json_logger));

    let (status, _, body) = send(&app, "/ok").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "hello");

    let (status, headers, body) = send(&app, "/boom").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(headers[header::CONTENT_TYPE], "application/json; charset=utf-8");
    assert_eq!(
        serde_json::from_str::<Value>(&body).unwrap(),
        json!({"status": 500, "error": "Internal Server Error"})
    );
    assert!(!log_dir.exists());
}
