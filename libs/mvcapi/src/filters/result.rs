//! Converts bare error-status results into problem responses.

use axum::response::Response;
use http::header;

use crate::context::{HandledBy, RequestContext};
use crate::error::RaisedError;
use crate::options::ProblemDetailsOptions;
use crate::view::PendingView;
use crate::writer::problem_response;

/// An error status with no body type, no raised error and no pending view.
#[must_use]
pub fn is_bare_error_result(
    ctx: &RequestContext,
    options: &ProblemDetailsOptions,
    response: &Response,
) -> bool {
    options.should_handle_error(ctx, response.status())
        && !response.headers().contains_key(header::CONTENT_TYPE)
        && response.extensions().get::<RaisedError>().is_none()
        && response.extensions().get::<PendingView>().is_none()
}

/// Replace a bare error result with a problem for API requests.
#[must_use]
pub fn apply(ctx: &RequestContext, options: &ProblemDetailsOptions, response: Response) -> Response {
    if !is_bare_error_result(ctx, options, &response)
        || ctx.is_handled()
        || ctx.response_started()
        || !ctx.classify(options).is_api()
    {
        return response;
    }
    let Some(problem) = options.status_problem(ctx, response.status()) else {
        return response;
    };
    if !ctx.try_mark_handled(HandledBy::ResultFilter) {
        return response;
    }

    tracing::trace!(
        path = %ctx.path(),
        status = %response.status(),
        "Replacing result with problem details"
    );
    problem_response(ctx, options, problem)
}
