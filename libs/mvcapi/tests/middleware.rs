#![allow(clippy::unwrap_used, clippy::expect_used, clippy::unused_async)]

//! The global layer on its own: panics, buffering and started responses.

use axum::Router;
use axum::body::Body;
use axum::response::Response;
use axum::routing::get;
use bytes::Bytes;
use http::{HeaderValue, Request, StatusCode, header};
use mvcapi::prelude::*;
use mvcapi::{MiddlewareConfig, ProblemDetailsLayer};
use std::sync::Arc;
use tower::ServiceExt;
use tracing_test::traced_test;

async fn panics() -> &'static str {
    panic!("handler exploded")
}

async fn streamed_failure() -> Response {
    let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
        Ok(Bytes::from_static(b"partial")),
        Err(std::io::Error::other("disk gone")),
    ];
    let mut resp = Response::new(Body::from_stream(futures::stream::iter(chunks)));
    resp.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain"),
    );
    resp
}

async fn error_with_body() -> Response {
    let mut resp = Response::new(Body::from("oops"));
    *resp.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    resp
}

async fn started(ctx: RequestContext) -> StatusCode {
    ctx.mark_response_started();
    StatusCode::INTERNAL_SERVER_ERROR
}

/// Routes without endpoint layers, so only the middleware acts.
fn app(options: ProblemDetailsOptions) -> Router {
    let mvcapi = MvcAsApi::new(options);
    let browser_only = Router::new()
        .route("/home/panic", get(panics))
        .route_layer(mvcapi.mvc_endpoints());

    Router::new()
        .route("/api/panic", get(panics))
        .route("/api/stream", get(streamed_failure))
        .route("/api/error-body", get(error_with_body))
        .route("/api/started", get(started))
        .route(
            "/api/problem",
            get(|| async {
                let mut resp = Response::new(Body::from(r#"{"status":409}"#));
                *resp.status_mut() = StatusCode::CONFLICT;
                resp.headers_mut().insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/problem+json"),
                );
                resp
            }),
        )
        .merge(browser_only)
        .layer(mvcapi.middleware())
}

fn request(uri: &str, accept: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::ACCEPT, accept)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(resp: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn streaming_options() -> ProblemDetailsOptions {
    ProblemDetailsOptions::default().with_middleware_config(MiddlewareConfig {
        intercept_response_stream: false,
        ..MiddlewareConfig::default()
    })
}

#[tokio::test]
#[traced_test]
async fn panic_becomes_internal_error_problem() {
    let resp = app(ProblemDetailsOptions::default())
        .oneshot(request("/api/panic", "application/json"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/problem+json");
    let body = body_json(resp).await;
    assert_eq!(body["title"], "An error has occurred.");
    assert!(body.get("detail").is_none());
    assert!(logs_contain("Handler panicked"));
}

#[tokio::test]
async fn panic_detail_is_shown_when_enabled() {
    let options = ProblemDetailsOptions::default().with_show_exception_details(true);
    let resp = app(options)
        .oneshot(request("/api/panic", "application/json"))
        .await
        .unwrap();

    let body = body_json(resp).await;
    assert_eq!(body["detail"], "handler panicked: handler exploded");
}

#[tokio::test]
async fn browser_panic_is_a_plain_500() {
    let resp = app(ProblemDetailsOptions::default())
        .oneshot(request("/home/panic", "text/html"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(resp.headers().get(header::CONTENT_TYPE).is_none());
}

#[tokio::test]
async fn buffered_body_failure_becomes_problem() {
    let resp = app(ProblemDetailsOptions::default())
        .oneshot(request("/api/stream", "application/json"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/problem+json");
}

#[tokio::test]
async fn buffered_error_status_is_rewritten() {
    let resp = app(ProblemDetailsOptions::default())
        .oneshot(request("/api/error-body", "application/json"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/problem+json");
}

#[tokio::test]
#[traced_test]
async fn unbuffered_error_with_body_is_left_alone() {
    let resp = app(streaming_options())
        .oneshot(request("/api/error-body", "application/json"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(resp.headers().get(header::CONTENT_TYPE).is_none());
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"oops");
    assert!(logs_contain("The response has already started"));
}

#[tokio::test]
#[traced_test]
async fn unbuffered_mid_stream_failure_is_logged() {
    let resp = app(streaming_options())
        .oneshot(request("/api/stream", "application/json"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(axum::body::to_bytes(resp.into_body(), usize::MAX).await.is_err());
    assert!(logs_contain("The response has already started"));
}

#[tokio::test]
#[traced_test]
async fn started_response_is_never_rewritten() {
    let resp = app(ProblemDetailsOptions::default())
        .oneshot(request("/api/started", "application/json"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(resp.headers().get(header::CONTENT_TYPE).is_none());
    assert!(logs_contain(
        "The response has already started, the error handler will not be executed."
    ));
}

#[tokio::test]
async fn existing_problem_responses_are_kept() {
    let resp = app(ProblemDetailsOptions::default())
        .oneshot(request("/api/problem", "application/json"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert!(resp.headers().get(header::CACHE_CONTROL).is_none());
    assert_eq!(body_json(resp).await, serde_json::json!({"status": 409}));
}

#[tokio::test]
async fn trace_header_is_echoed_in_problem() {
    let req = Request::builder()
        .uri("/api/missing")
        .header(header::ACCEPT, "application/json")
        .header("x-request-id", "req-42")
        .body(Body::empty())
        .unwrap();
    let resp = app(ProblemDetailsOptions::default()).oneshot(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(resp).await["traceId"], "req-42");
}

#[tokio::test]
async fn layer_wraps_plain_tower_services() {
    let options = Arc::new(ProblemDetailsOptions::default());
    let svc = tower::service_fn(|_req: Request<Body>| async {
        let mut resp = Response::new(http_body_util::Empty::<Bytes>::new());
        *resp.status_mut() = StatusCode::SERVICE_UNAVAILABLE;
        Ok::<_, std::convert::Infallible>(resp)
    });
    let svc = tower::ServiceBuilder::new()
        .layer(ProblemDetailsLayer::new(options))
        .service(svc);

    let resp = svc
        .oneshot(request("/api/health", "application/json"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/problem+json");
    assert_eq!(body_json(resp).await["title"], "Service Unavailable");
}
