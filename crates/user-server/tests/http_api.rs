//! End-to-end tests of the user API against an in-memory SQLite store

use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::io;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;
use user_server::cors::{ALLOW_HEADERS, ALLOW_METHODS};
use user_server::storage::{self, RetryPolicy};
use user_server::{router, AppState};

struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Value,
}

async fn test_app() -> Router {
    let store = storage::connect("sqlite::memory:", &RetryPolicy::immediate(1))
        .await
        .expect("Failed to open in-memory store");
    router(AppState::new(store))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<&str>) -> TestResponse {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
        .unwrap();
    into_test_response(app.clone().oneshot(request).await.unwrap()).await
}

async fn into_test_response(response: axum::response::Response) -> TestResponse {
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("response body should be JSON")
    };
    TestResponse {
        status,
        headers,
        body,
    }
}

fn assert_cors(headers: &HeaderMap) {
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], ALLOW_HEADERS);
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], ALLOW_METHODS);
}

fn preflight_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::OPTIONS)
        .uri(uri)
        .header(header::ORIGIN, "https://app.example.com")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap()
}

/// Log sink shared between the subscriber and the test
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn error_message(res: &TestResponse) -> &str {
    res.body["Error"]
        .as_str()
        .expect("error responses carry an Error envelope")
}

#[tokio::test]
async fn test_user_lifecycle() {
    let app = test_app().await;

    let res = send(&app, Method::POST, "/user", Some(r#"{"sub":"abc123"}"#)).await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body, json!("abc123"));

    let res = send(&app, Method::GET, "/user/abc123", None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body, json!({ "sub": "abc123" }));

    let res = send(&app, Method::DELETE, "/user/abc123", None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body, json!({ "sub": "abc123" }));

    let res = send(&app, Method::GET, "/user/abc123", None).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(error_message(&res), "user not found");
}

#[tokio::test]
async fn test_duplicate_create_fails() {
    let app = test_app().await;

    let res = send(&app, Method::POST, "/user", Some(r#"{"sub":"dup"}"#)).await;
    assert_eq!(res.status, StatusCode::CREATED);

    let res = send(&app, Method::POST, "/user", Some(r#"{"sub":"dup"}"#)).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(!error_message(&res).is_empty());
}

#[tokio::test]
async fn test_get_unknown_user_is_404() {
    let app = test_app().await;

    let res = send(&app, Method::GET, "/user/never-created", None).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(error_message(&res), "user not found");
}

#[tokio::test]
async fn test_delete_unknown_user_is_404() {
    let app = test_app().await;

    let res = send(&app, Method::DELETE, "/user/never-created", None).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_users() {
    let app = test_app().await;

    let res = send(&app, Method::GET, "/user", None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body, json!([]));

    let subs = ["alice", "bob", "carol", "dave"];
    for sub in subs {
        let body = json!({ "sub": sub }).to_string();
        let res = send(&app, Method::POST, "/user", Some(&body)).await;
        assert_eq!(res.status, StatusCode::CREATED);
    }

    let res = send(&app, Method::GET, "/user", None).await;
    assert_eq!(res.status, StatusCode::OK);
    let users = res.body.as_array().expect("list returns an array");
    assert_eq!(users.len(), subs.len());

    let listed: HashSet<&str> = users.iter().filter_map(|u| u["sub"].as_str()).collect();
    let expected: HashSet<&str> = subs.into_iter().collect();
    assert_eq!(listed, expected);
}

#[tokio::test]
async fn test_malformed_body_is_400() {
    let app = test_app().await;

    for body in [r#"{"sub":"#, "not json", r#"{"name":"x"}"#, ""] {
        let res = send(&app, Method::POST, "/user", Some(body)).await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST, "body {:?}", body);
        assert!(!error_message(&res).is_empty());
    }
}

#[tokio::test]
async fn test_create_accepts_json_content_type() {
    let app = test_app().await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/user")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"sub":"typed"}"#))
        .unwrap();
    let res = into_test_response(app.clone().oneshot(request).await.unwrap()).await;

    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body, json!("typed"));
}

#[tokio::test]
async fn test_update_is_not_implemented() {
    let app = test_app().await;
    send(&app, Method::POST, "/user", Some(r#"{"sub":"abc"}"#)).await;

    let res = send(&app, Method::POST, "/user/abc", Some(r#"[{"sub":"xyz"}]"#)).await;
    assert_eq!(res.status, StatusCode::NOT_IMPLEMENTED);
    assert_eq!(error_message(&res), "update user is not implemented");

    // The record is untouched
    let res = send(&app, Method::GET, "/user/abc", None).await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn test_unsupported_methods() {
    let app = test_app().await;

    for (method, uri) in [
        (Method::PATCH, "/user"),
        (Method::DELETE, "/user"),
        (Method::PUT, "/user/abc"),
        (Method::PATCH, "/user/abc"),
    ] {
        let res = send(&app, method.clone(), uri, None).await;
        assert_eq!(res.status, StatusCode::METHOD_NOT_ALLOWED, "{} {}", method, uri);
        assert_eq!(error_message(&res), format!("method not allowed: {}", method));
        assert_cors(&res.headers);
    }
}

#[tokio::test]
async fn test_unknown_path_is_404_envelope() {
    let app = test_app().await;

    let res = send(&app, Method::GET, "/users", None).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(error_message(&res), "no route for /users");
    assert_cors(&res.headers);
}

#[tokio::test]
async fn test_every_response_has_cors_headers() {
    let app = test_app().await;

    let requests: [(Method, &str, Option<&str>); 7] = [
        (Method::POST, "/user", Some(r#"{"sub":"c"}"#)),
        (Method::POST, "/user", Some(r#"{"sub":"c"}"#)),
        (Method::POST, "/user", Some("garbage")),
        (Method::GET, "/user", None),
        (Method::GET, "/user/c", None),
        (Method::DELETE, "/user/c", None),
        (Method::GET, "/user/c", None),
    ];

    for (method, uri, body) in requests {
        let res = send(&app, method, uri, body).await;
        assert_cors(&res.headers);
    }
}

#[tokio::test]
async fn test_preflight_is_answered() {
    let app = test_app().await;

    for uri in ["/user", "/user/abc", "/health"] {
        let response = app.clone().oneshot(preflight_request(uri)).await.unwrap();
        let res = into_test_response(response).await;
        assert_eq!(res.status, StatusCode::NO_CONTENT, "{}", uri);
        assert_cors(&res.headers);
    }
}

#[tokio::test]
async fn test_preflight_to_unknown_path_is_404() {
    let app = test_app().await;

    let response = app.clone().oneshot(preflight_request("/nope")).await.unwrap();
    let res = into_test_response(response).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(error_message(&res), "no route for /nope");
    assert_cors(&res.headers);
}

#[tokio::test]
async fn test_bare_options_is_not_allowed() {
    let app = test_app().await;

    let res = send(&app, Method::OPTIONS, "/user", None).await;
    assert_eq!(res.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(error_message(&res), "method not allowed: OPTIONS");
    assert_cors(&res.headers);
}

#[tokio::test]
async fn test_health() {
    let app = test_app().await;

    let res = send(&app, Method::GET, "/health", None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "ok");
    assert_cors(&res.headers);
}

#[tokio::test]
async fn test_unsupported_method_on_health_is_405_envelope() {
    let app = test_app().await;

    for method in [Method::POST, Method::DELETE] {
        let res = send(&app, method.clone(), "/health", None).await;
        assert_eq!(res.status, StatusCode::METHOD_NOT_ALLOWED, "{}", method);
        assert_eq!(error_message(&res), format!("method not allowed: {}", method));
        assert_cors(&res.headers);
    }
}

#[tokio::test]
async fn test_requests_are_logged_at_info() {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("info"))
        .with_writer(logs.clone())
        .with_ansi(false)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let app = test_app().await;
    let res = send(&app, Method::GET, "/user", None).await;
    assert_eq!(res.status, StatusCode::OK);

    let output = logs.contents();
    let line = output
        .lines()
        .find(|l| l.contains("finished processing request"))
        .unwrap_or_else(|| panic!("no response event in:\n{}", output));
    assert!(line.contains("INFO"), "{}", line);
    assert!(line.contains("uri=/user"), "{}", line);
    assert!(line.contains("status=200"), "{}", line);
}
