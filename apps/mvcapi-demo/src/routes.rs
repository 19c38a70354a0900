//! Demo handlers: an MVC "home" area and an API "values" area.

use std::collections::HashMap;
use std::time::Duration;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Form, Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use http::StatusCode;
use mvcapi::prelude::*;
use serde_json::{Value, json};

/// Values known to the demo API.
const VALUES: [&str; 2] = ["value1", "value2"];

#[derive(Clone, Debug)]
pub struct DemoState {
    pub slow_timeout: Duration,
}

/// Routes of the MVC area.
pub fn home_routes() -> Router<DemoState> {
    Router::new()
        .route("/", get(index))
        .route("/home", get(index))
        .route("/home/contact", get(contact))
        .route("/home/missing", get(missing_page))
        .route("/home/register", get(register_form).post(register))
}

/// Routes of the API area.
pub fn values_routes() -> Router<DemoState> {
    Router::new()
        .route("/api/values", get(list_values).post(create_value))
        .route("/api/values/{id}", get(get_value))
        .route("/api/values/slow", get(slow))
        .route("/api/values/cancelled", get(cancelled))
        .route("/api/values/conflict", get(conflict))
        .route("/api/values/fail", get(fail))
        .route("/api/values/panic", get(explode))
}

#[allow(clippy::unused_async)]
async fn index() -> View {
    View::new("Home/Index").with_model(json!({"message": "Welcome to the MvcAsApi demo"}))
}

#[allow(clippy::unused_async)]
async fn contact() -> View {
    View::new("Home/Contact").with_model(json!({
        "email": "support@example.com",
        "phone": "+1 555 0100",
    }))
}

#[allow(clippy::unused_async)]
async fn missing_page() -> StatusCode {
    StatusCode::NOT_FOUND
}

#[allow(clippy::unused_async)]
async fn register_form() -> View {
    View::new("Home/Register").with_model(json!({"status": "Please register"}))
}

#[allow(clippy::unused_async)]
async fn register(Form(form): Form<HashMap<String, String>>) -> View {
    let mut state = ModelState::new(1);
    state.mark_bound("form");

    let email = form.get("email").map(|e| e.trim()).unwrap_or_default();
    if email.is_empty() {
        state.add_error("Email", "required|The Email field is required.");
    } else if !email.contains('@') {
        state.add_error("Email", "email|The Email field is not a valid e-mail address.");
    }

    let status = if state.is_valid() { "Registered" } else { "Please fix the errors" };
    View::new("Home/Register")
        .with_model(json!({"status": status, "email": email}))
        .with_model_state(state)
}

#[allow(clippy::unused_async)]
async fn list_values() -> Json<Value> {
    Json(json!(VALUES))
}

#[allow(clippy::unused_async)]
async fn get_value(id: Result<Path<usize>, PathRejection>) -> Result<Response, ActionError> {
    let Path(id) = id?;
    // a bare 404 is turned into a problem by the endpoint layer
    Ok(id
        .checked_sub(1)
        .and_then(|idx| VALUES.get(idx))
        .map_or_else(
            || StatusCode::NOT_FOUND.into_response(),
            |value| Json(json!({"id": id, "value": value})).into_response(),
        ))
}

#[allow(clippy::unused_async)]
async fn create_value(
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ActionError> {
    let Json(body) = body?;
    let mut state = ModelState::new(1);
    state.mark_bound("body");

    match body.get("value").and_then(Value::as_str).map(str::trim) {
        None | Some("") => state.add_error("value", "required|The value field is required."),
        Some(v) if v.len() > 32 => {
            state.add_error("value", "maxlength|The value must be at most 32 characters.");
        }
        Some(_) => {}
    }
    if !state.is_valid() {
        return Err(state.into());
    }
    Ok((StatusCode::CREATED, Json(body)))
}

async fn slow(State(state): State<DemoState>) -> Result<Json<Value>, ActionError> {
    tokio::time::timeout(state.slow_timeout, tokio::time::sleep(state.slow_timeout * 20)).await?;
    Ok(Json(json!("finally")))
}

#[allow(clippy::unused_async)]
async fn cancelled() -> Result<(), ActionError> {
    Err(ActionError::Cancelled)
}

#[allow(clippy::unused_async)]
async fn conflict() -> Result<(), ActionError> {
    Err(ProblemDetails::new(StatusCode::CONFLICT)
        .with_detail("A value with this name already exists")
        .into())
}

#[allow(clippy::unused_async)]
async fn fail() -> Result<(), ActionError> {
    Err(anyhow::anyhow!("storage backend unavailable")
        .context("failed to load values")
        .into())
}

#[allow(clippy::unused_async)]
async fn explode() -> &'static str {
    panic!("values store is corrupted")
}
