//! Outermost layer: installs the [`RequestContext`], catches panics and converts
//! anything the route-level stages left unhandled.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::FutureExt;
use http::{Request, header};
use http_body::Body as HttpBody;
use http_body_util::BodyExt;
use tower::{BoxError, Layer, Service};

use crate::context::{HandledBy, RequestContext};
use crate::error::{ActionError, RaisedError};
use crate::filters::exception::problem_for_error;
use crate::options::ProblemDetailsOptions;
use crate::writer::problem_response;

const RESPONSE_STARTED: &str =
    "The response has already started, the error handler will not be executed.";

/// Global problem-details safety net. Install it outside the router with
/// `Router::layer`.
#[derive(Clone, Debug)]
pub struct ProblemDetailsLayer {
    options: Arc<ProblemDetailsOptions>,
}

impl ProblemDetailsLayer {
    #[must_use]
    pub fn new(options: Arc<ProblemDetailsOptions>) -> Self {
        Self { options }
    }
}

impl<S> Layer<S> for ProblemDetailsLayer {
    type Service = ProblemDetailsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ProblemDetailsService {
            inner,
            options: Arc::clone(&self.options),
        }
    }
}

/// Service produced by [`ProblemDetailsLayer`].
#[derive(Clone, Debug)]
pub struct ProblemDetailsService<S> {
    inner: S,
    options: Arc<ProblemDetailsOptions>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for ProblemDetailsService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    ReqBody: Send + 'static,
    ResBody: HttpBody<Data = Bytes> + Send + 'static,
    ResBody::Error: Into<BoxError>,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let ctx = RequestContext::from_head(req.uri(), req.headers());
        req.extensions_mut().insert(ctx.clone());

        let options = Arc::clone(&self.options);
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let outcome = AssertUnwindSafe(async move { inner.call(req).await })
                .catch_unwind()
                .await;

            let response = match outcome {
                Ok(Ok(resp)) => resp.map(Body::new),
                Ok(Err(e)) => return Err(e),
                Err(payload) => {
                    let message = panic_message(&*payload);
                    tracing::error!(
                        path = %ctx.path(),
                        trace_id = %ctx.trace_id(),
                        panic = %message,
                        "Handler panicked"
                    );
                    ActionError::Panic(message).into_response()
                }
            };

            let response = process(&ctx, &options, response).await;
            log_escaped(&ctx, &response);
            Ok(response)
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_owned())
}

/// Log an error that leaves the pipeline without being converted.
fn log_escaped(ctx: &RequestContext, response: &Response) {
    let Some(raised) = response.extensions().get::<RaisedError>() else {
        return;
    };
    let error = raised.error();
    match error {
        // already logged where the panic was caught
        ActionError::Panic(_) => {}
        ActionError::Internal(_) => tracing::error!(
            path = %ctx.path(),
            trace_id = %ctx.trace_id(),
            error = %error.error_chain(),
            "An unhandled error has occurred while executing the request"
        ),
        _ => tracing::info!(
            path = %ctx.path(),
            status = %response.status(),
            operational = error.is_operational(),
            error = %error,
            "Request failed without a problem response"
        ),
    }
}

fn is_problem_response(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/problem+"))
}

fn needs_rewrite(ctx: &RequestContext, options: &ProblemDetailsOptions, response: &Response) -> bool {
    response.extensions().get::<RaisedError>().is_some()
        || (options.should_handle_error(ctx, response.status())
            && !response.headers().contains_key(header::CONTENT_TYPE))
}

async fn process(ctx: &RequestContext, options: &ProblemDetailsOptions, response: Response) -> Response {
    let cfg = options.middleware();

    if !ctx.classify(options).is_api() {
        return response;
    }
    if ctx.is_handled() && !cfg.handle_mvc_handled_responses {
        return response;
    }
    if is_problem_response(&response) && !cfg.handle_problem_detail_responses {
        return response;
    }
    if ctx.response_started() {
        tracing::warn!(path = %ctx.path(), status = %response.status(), "{}", RESPONSE_STARTED);
        return response;
    }

    let response = if cfg.intercept_response_stream {
        buffer(ctx, response).await
    } else if !needs_rewrite(ctx, options, &response) {
        return watch_stream(ctx, response);
    } else if response.body().size_hint().exact() != Some(0) {
        tracing::warn!(path = %ctx.path(), status = %response.status(), "{}", RESPONSE_STARTED);
        return response;
    } else {
        response
    };

    rewrite(ctx, options, response)
}

/// Drain the body so the decision can still replace the whole response.
async fn buffer(ctx: &RequestContext, response: Response) -> Response {
    let (parts, body) = response.into_parts();
    match body.collect().await {
        Ok(collected) => Response::from_parts(parts, Body::from(collected.to_bytes())),
        Err(e) => {
            tracing::error!(path = %ctx.path(), error = %e, "Failed to buffer response body");
            ActionError::Internal(anyhow::Error::new(e).context("failed to read response body"))
                .into_response()
        }
    }
}

/// Pass an unbuffered body through, reporting errors that surface mid-stream.
fn watch_stream(ctx: &RequestContext, response: Response) -> Response {
    let path = ctx.path().to_owned();
    response.map(|body| {
        Body::new(body.map_err(move |e| {
            tracing::warn!(path = %path, error = %e, "{}", RESPONSE_STARTED);
            e
        }))
    })
}

fn claim(ctx: &RequestContext, options: &ProblemDetailsOptions) -> bool {
    ctx.try_mark_handled(HandledBy::Middleware) || options.middleware().handle_mvc_handled_responses
}

fn rewrite(ctx: &RequestContext, options: &ProblemDetailsOptions, response: Response) -> Response {
    if let Some(raised) = response.extensions().get::<RaisedError>().cloned() {
        let Some(problem) = problem_for_error(ctx, options, raised.error()) else {
            return response;
        };
        if !claim(ctx, options) {
            return response;
        }
        tracing::debug!(path = %ctx.path(), status = %problem.status, "Middleware converted raised error");
        return problem_response(ctx, options, problem);
    }

    let status = response.status();
    if !options.should_handle_error(ctx, status) || response.headers().contains_key(header::CONTENT_TYPE) {
        return response;
    }
    let Some(problem) = options.status_problem(ctx, status) else {
        return response;
    };
    if !claim(ctx, options) {
        return response;
    }
    tracing::debug!(path = %ctx.path(), status = %status, "Middleware converted error status");
    problem_response(ctx, options, problem)
}
