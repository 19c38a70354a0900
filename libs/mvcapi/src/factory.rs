//! Problem construction with request correlation.

use chrono::{SecondsFormat, Utc};
use http::StatusCode;
use mvcapi_problem::{ErrorMappingTable, ProblemDetails, TIME_GENERATED_KEY, finalize};
use serde_json::Value;

use crate::context::RequestContext;

/// Problem for `status` with mapped title and type, tagged with the request.
pub fn create_problem(
    ctx: &RequestContext,
    mapping: &ErrorMappingTable,
    status: StatusCode,
    detail: Option<String>,
) -> ProblemDetails {
    let mut problem = mapping.as_problem(status);
    problem.detail = detail;
    enrich(ctx, problem)
}

/// Add `instance`, `traceId` and `timeGenerated` unless already present.
pub fn enrich(ctx: &RequestContext, problem: ProblemDetails) -> ProblemDetails {
    let mut problem = finalize(problem, ctx.path(), Some(ctx.trace_id()));
    problem.set_extension_if_absent(TIME_GENERATED_KEY, || {
        Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
    });
    problem
}
