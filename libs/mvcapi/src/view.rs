//! Views returned by MVC handlers.
//!
//! A handler returns a [`View`]; the endpoint layer later decides whether to
//! render it as HTML or to serve its model to an API client.

use std::sync::Arc;

use axum::response::{IntoResponse, Response};
use http::StatusCode;
use serde::Serialize;
use serde_json::Value;

use crate::validation::ModelState;

/// Template name plus the serialized model it renders.
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    pub template: String,
    pub model: Value,
    pub status: StatusCode,
    pub model_state: Option<ModelState>,
}

impl View {
    #[must_use]
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            model: Value::Null,
            status: StatusCode::OK,
            model_state: None,
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<Value>) -> Self {
        self.model = model.into();
        self
    }

    /// Serialize `model` into the view.
    ///
    /// # Errors
    /// Returns the serialization error when `model` cannot be represented as JSON.
    pub fn try_with_model<T: Serialize>(mut self, model: &T) -> Result<Self, serde_json::Error> {
        self.model = serde_json::to_value(model)?;
        Ok(self)
    }

    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with_model_state(mut self, state: ModelState) -> Self {
        self.model_state = Some(state);
        self
    }

    #[must_use]
    pub fn has_invalid_model_state(&self) -> bool {
        self.model_state.as_ref().is_some_and(|s| !s.is_valid())
    }
}

/// Response extension holding a view that has not been rendered yet.
#[derive(Debug, Clone)]
pub struct PendingView(pub Arc<View>);

impl IntoResponse for View {
    fn into_response(self) -> Response {
        let mut resp = self.status.into_response();
        resp.extensions_mut().insert(PendingView(Arc::new(self)));
        resp
    }
}

/// Renders views to HTML. Provided by the host application.
pub trait ViewEngine: Send + Sync {
    /// Render `view`.
    ///
    /// # Errors
    /// Returns an error when the template is missing or fails to render.
    fn render(&self, view: &View) -> anyhow::Result<String>;
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct Contact {
        name: &'static str,
    }

    #[test]
    fn view_response_is_a_placeholder() {
        let resp = View::new("Home/Index")
            .with_model(json!({"title": "Home"}))
            .with_status(StatusCode::ACCEPTED)
            .into_response();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        assert!(resp.headers().get(http::header::CONTENT_TYPE).is_none());
        let pending = resp.extensions().get::<PendingView>().unwrap();
        assert_eq!(pending.0.template, "Home/Index");
    }

    #[test]
    fn serializes_typed_models() {
        let view = View::new("Home/Contact")
            .try_with_model(&Contact { name: "Ada" })
            .unwrap();
        assert_eq!(view.model, json!({"name": "Ada"}));
        assert!(!view.has_invalid_model_state());
        let view = view.with_model_state(ModelState::new(1).with_error("Name", "required"));
        assert!(view.has_invalid_model_state());
    }
}
