#![allow(clippy::unwrap_used, clippy::expect_used, clippy::unused_async)]

//! Accept-driven behaviour: formatter selection, XML problems, views.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::response::Response;
use axum::routing::get;
use http::{Request, StatusCode, header};
use mvcapi::negotiation::{
    FormatterRegistry, XmlFormatter, parse_accept_header, select_formatter,
};
use mvcapi::prelude::*;
use serde_json::json;
use tower::ServiceExt;

struct TitleEngine;

impl ViewEngine for TitleEngine {
    fn render(&self, view: &View) -> anyhow::Result<String> {
        Ok(format!(
            "<html><title>{}</title><p>{}</p></html>",
            view.template, view.model
        ))
    }
}

async fn contact() -> View {
    View::new("Home/Contact").with_model(json!({"email": "support@example.com"}))
}

async fn register() -> View {
    View::new("Home/Register")
        .with_status(StatusCode::OK)
        .with_model_state(ModelState::new(1).with_bound("form").with_error("Password", "minlength|Too short"))
}

fn app(options: ProblemDetailsOptions) -> Router {
    let mvcapi = MvcAsApi::new(options);
    let api = Router::new()
        .route("/api/contact", get(contact))
        .route(
            "/api/values/timeout",
            get(|| async { Err::<(), _>(ActionError::Timeout) }),
        )
        .route_layer(mvcapi.api_endpoints());
    let mvc = Router::new()
        .route("/home/contact", get(contact))
        .route("/home/register", get(register))
        .route_layer(mvcapi.mvc_endpoints());
    Router::new().merge(api).merge(mvc).layer(mvcapi.middleware())
}

fn request(uri: &str, accept: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::ACCEPT, accept)
        .body(Body::empty())
        .unwrap()
}

async fn body_string(resp: Response) -> String {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn xml_options() -> ProblemDetailsOptions {
    let cfg = ProblemDetailsConfig {
        xml_formatter: true,
        ..ProblemDetailsConfig::default()
    };
    ProblemDetailsOptions::from_config(&cfg).unwrap()
}

#[test]
fn unknown_type_falls_back_to_lower_quality_json() {
    let accepted = parse_accept_header(Some("application/xyz, application/json;q=0.5"));
    let selection =
        select_formatter(&json!({"a": 1}), &accepted, &FormatterRegistry::with_defaults()).unwrap();
    assert_eq!(selection.formatter.name(), "json");
    assert_eq!(selection.content_type.to_string(), "application/json");
}

#[tokio::test]
async fn api_view_is_served_as_negotiated_json() {
    let resp = app(ProblemDetailsOptions::default())
        .oneshot(request("/api/contact", "application/xyz, application/json;q=0.5"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/json");
    assert_eq!(body_string(resp).await, r#"{"email":"support@example.com"}"#);
}

#[tokio::test]
async fn mvc_view_is_rendered_for_browsers() {
    let options = ProblemDetailsOptions::default().with_view_engine(Arc::new(TitleEngine));
    let resp = app(options)
        .oneshot(request("/home/contact", "text/html,application/xhtml+xml,*/*;q=0.8"))
        .await
        .unwrap();

    assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/html; charset=utf-8");
    assert!(body_string(resp).await.contains("<title>Home/Contact</title>"));
}

#[tokio::test]
async fn catch_all_accept_is_ignored_for_views_by_default() {
    let options = ProblemDetailsOptions::default().with_view_engine(Arc::new(TitleEngine));
    let resp = app(options)
        .oneshot(request("/api/contact", "*/*"))
        .await
        .unwrap();

    assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/html; charset=utf-8");
}

#[tokio::test]
async fn catch_all_accept_is_honoured_when_configured() {
    let cfg = ProblemDetailsConfig {
        respect_browser_accept_header: true,
        ..ProblemDetailsConfig::default()
    };
    let options = ProblemDetailsOptions::from_config(&cfg)
        .unwrap()
        .with_view_engine(Arc::new(TitleEngine));
    let resp = app(options)
        .oneshot(request("/api/contact", "*/*"))
        .await
        .unwrap();

    assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/json");
}

#[tokio::test]
async fn invalid_view_model_state_is_a_validation_problem() {
    let cfg = ProblemDetailsConfig {
        angular_errors: true,
        ..ProblemDetailsConfig::default()
    };
    let resp = app(ProblemDetailsOptions::from_config(&cfg).unwrap())
        .oneshot(request("/home/register", "application/json"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: serde_json::Value = serde_json::from_str(&body_string(resp).await).unwrap();
    assert_eq!(body["title"], "One or more validation errors occurred.");
    assert_eq!(body["type"], "https://tools.ietf.org/html/rfc4918#section-11.2");
    assert_eq!(body["errors"]["Password"][0], "minlength|Too short");
    assert_eq!(
        body["angularErrors"]["Password"][0],
        json!({"validatorKey": "minlength", "message": "Too short"})
    );
}

#[tokio::test]
async fn xml_problem_for_xml_clients() {
    let resp = app(xml_options())
        .oneshot(request("/api/values/timeout", "application/xml"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/problem+xml");
    let xml = body_string(resp).await;
    assert!(xml.starts_with("<?xml"));
    assert!(xml.contains(r#"<problem xmlns="urn:ietf:rfc:7807">"#));
    assert!(xml.contains("<title>The request timed out.</title>"));
    assert!(xml.contains("<status>504</status>"));
    assert!(xml.contains("<traceId>"));
}

#[tokio::test]
async fn json_problem_preferred_when_ranked_higher() {
    let resp = app(xml_options())
        .oneshot(request(
            "/api/values/timeout",
            "application/xml;q=0.5, application/json",
        ))
        .await
        .unwrap();

    assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/problem+json");
}

#[tokio::test]
async fn xml_view_model_when_formatter_registered() {
    let options = ProblemDetailsOptions::default().with_formatter(Arc::new(XmlFormatter::default()));
    let resp = app(options)
        .oneshot(request("/api/contact", "text/xml"))
        .await
        .unwrap();

    assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/xml");
    let xml = body_string(resp).await;
    assert!(xml.contains("<model>"));
    assert!(xml.contains("<email>support@example.com</email>"));
}
