//! Writes a [`ProblemDetails`] as the HTTP response.

use axum::body::Body;
use axum::response::Response;
use bytes::Bytes;
use http::header::{self, HeaderMap, HeaderValue};
use mvcapi_problem::{APPLICATION_PROBLEM_JSON, PROBLEM_XML_NAMESPACE, ProblemDetails};

use crate::context::RequestContext;
use crate::factory::enrich;
use crate::negotiation::{parse_accept_header, select_formatter_for_server_types};
use crate::options::ProblemDetailsOptions;

/// Replace caching headers so problem responses are never cached.
pub fn apply_no_cache(headers: &mut HeaderMap) {
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("-1"));
    headers.remove(header::ETAG);
}

/// Build the response for `problem`.
///
/// Missing title and type are taken from the mapping table, and instance,
/// trace id and timestamp are filled in. The body is negotiated between
/// `application/problem+json` and (when enabled) `application/problem+xml`;
/// JSON is used whenever negotiation or serialization fails.
#[must_use]
pub fn problem_response(
    ctx: &RequestContext,
    options: &ProblemDetailsOptions,
    mut problem: ProblemDetails,
) -> Response {
    options.mapping().apply_defaults(&mut problem);
    let problem = enrich(ctx, problem);

    let (content_type, body) = negotiate(ctx, options, &problem).unwrap_or_else(|| {
        (
            HeaderValue::from_static(APPLICATION_PROBLEM_JSON),
            Bytes::from(serde_json::to_vec(&problem).unwrap_or_default()),
        )
    });

    let mut resp = Response::new(Body::from(body));
    *resp.status_mut() = problem.status;
    resp.headers_mut().insert(header::CONTENT_TYPE, content_type);
    apply_no_cache(resp.headers_mut());
    resp
}

fn negotiate(
    ctx: &RequestContext,
    options: &ProblemDetailsOptions,
    problem: &ProblemDetails,
) -> Option<(HeaderValue, Bytes)> {
    let value = match serde_json::to_value(problem) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize problem details");
            return None;
        }
    };

    let accepted = parse_accept_header(ctx.accept());
    let selection = select_formatter_for_server_types(
        &value,
        &accepted,
        options.problem_content_types(),
        options.formatters(),
    )?;

    match selection.write(&value, "problem", Some(PROBLEM_XML_NAMESPACE)) {
        Ok(body) => {
            let content_type = HeaderValue::from_str(&selection.content_type.to_string()).ok()?;
            Some((content_type, body))
        }
        Err(e) => {
            tracing::error!(
                error = %e,
                formatter = selection.formatter.name(),
                "Failed to write problem details, falling back to JSON"
            );
            None
        }
    }
}
