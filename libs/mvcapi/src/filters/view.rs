//! Serves views to API clients as data, and renders them for browsers.

use axum::body::Body;
use axum::response::{IntoResponse, Response};
use http::header::{self, HeaderValue};

use crate::context::{HandledBy, RequestContext};
use crate::error::ActionError;
use crate::negotiation::{acceptable_media_types, select_formatter};
use crate::options::ProblemDetailsOptions;
use crate::validation::validation_problem;
use crate::view::{PendingView, View};
use crate::writer::problem_response;

/// Resolve a [`PendingView`] on `response`.
///
/// API clients get the serialized model (or the validation problem for an
/// invalid model state). Otherwise the configured view engine renders HTML; with
/// no engine the placeholder response is returned unchanged.
#[must_use]
pub fn apply(ctx: &RequestContext, options: &ProblemDetailsOptions, response: Response) -> Response {
    let Some(PendingView(view)) = response.extensions().get::<PendingView>().cloned() else {
        return response;
    };

    if !ctx.classify(options).is_browser() {
        if let Some(converted) = convert_for_api(ctx, options, &view) {
            return converted;
        }
    }

    match options.view_engine() {
        Some(engine) => match engine.render(&view) {
            Ok(html) => {
                let mut resp = Response::new(Body::from(html));
                *resp.status_mut() = view.status;
                resp.headers_mut().insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("text/html; charset=utf-8"),
                );
                resp
            }
            Err(e) => ActionError::Internal(e.context(format!(
                "failed to render view '{}'",
                view.template
            )))
            .into_response(),
        },
        None => response,
    }
}

fn convert_for_api(
    ctx: &RequestContext,
    options: &ProblemDetailsOptions,
    view: &View,
) -> Option<Response> {
    let accepted = acceptable_media_types(ctx.accept(), options.respect_browser_accept_header());
    if accepted.is_empty() {
        return None;
    }

    let Some(selection) = select_formatter(&view.model, &accepted, options.formatters()) else {
        tracing::info!(
            path = %ctx.path(),
            template = %view.template,
            accept = ctx.accept().unwrap_or_default(),
            "No output formatter can satisfy the request, keeping the view"
        );
        return None;
    };

    // only a convertible view turns into a validation problem
    if let Some(state) = view.model_state.as_ref().filter(|s| !s.is_valid()) {
        if !ctx.try_mark_handled(HandledBy::ResultFilter) {
            return None;
        }
        let problem = validation_problem(state, options.mapping(), options.angular_errors());
        return Some(problem_response(ctx, options, problem));
    }

    let body = match selection.write(&view.model, "model", None) {
        Ok(body) => body,
        Err(e) => {
            tracing::error!(error = %e, template = %view.template, "Failed to write view model");
            return None;
        }
    };
    let content_type = HeaderValue::from_str(&selection.content_type.to_string()).ok()?;

    tracing::debug!(
        path = %ctx.path(),
        template = %view.template,
        content_type = %selection.content_type,
        "Serving view model to API client"
    );
    let mut resp = Response::new(Body::from(body));
    *resp.status_mut() = view.status;
    resp.headers_mut().insert(header::CONTENT_TYPE, content_type);
    Some(resp)
}
