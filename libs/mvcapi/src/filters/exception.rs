//! Converts errors raised by handlers into problem responses.

use axum::response::Response;
use mvcapi_problem::ProblemDetails;

use crate::context::{HandledBy, RequestContext};
use crate::error::{ActionError, RaisedError};
use crate::options::ProblemDetailsOptions;
use crate::writer::problem_response;

/// Problem for `error`, or `None` when it should propagate untouched.
#[must_use]
pub fn problem_for_error(
    ctx: &RequestContext,
    options: &ProblemDetailsOptions,
    error: &ActionError,
) -> Option<ProblemDetails> {
    if !options.should_handle_exception(ctx, error) {
        return None;
    }
    options.exception_problem(ctx, error)
}

/// Handle a response carrying a [`RaisedError`] for an API request.
#[must_use]
pub fn apply(ctx: &RequestContext, options: &ProblemDetailsOptions, response: Response) -> Response {
    let Some(raised) = response.extensions().get::<RaisedError>().cloned() else {
        return response;
    };
    if ctx.is_handled() || ctx.response_started() || !ctx.classify(options).is_api() {
        return response;
    }
    let Some(problem) = problem_for_error(ctx, options, raised.error()) else {
        return response;
    };
    if !ctx.try_mark_handled(HandledBy::ExceptionFilter) {
        return response;
    }

    tracing::debug!(
        path = %ctx.path(),
        status = %problem.status,
        "Converted raised error into problem details"
    );
    problem_response(ctx, options, problem)
}
