//! Request-scoped state shared by every pipeline stage.

use std::convert::Infallible;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use axum::extract::FromRequestParts;
use http::request::Parts;
use http::{HeaderMap, Uri, header};
use parking_lot::RwLock;

use crate::classify::{EndpointFlavor, RequestClass, RequestMeta, classify};
use crate::options::ProblemDetailsOptions;

/// Stage that turned an error into a problem response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandledBy {
    ResultFilter,
    ExceptionFilter,
    Middleware,
}

struct Inner {
    path: String,
    host: Option<String>,
    accept: Option<String>,
    trace_id: String,
    endpoint: RwLock<Option<EndpointFlavor>>,
    handled: OnceLock<HandledBy>,
    started: AtomicBool,
}

/// Per-request context. Cheap to clone; clones share state.
///
/// Installed into request extensions by [`crate::ProblemDetailsLayer`] and
/// available to handlers as an extractor.
#[derive(Clone)]
pub struct RequestContext {
    inner: Arc<Inner>,
}

impl RequestContext {
    /// Capture what the pipeline needs from the request head.
    #[must_use]
    pub fn from_head(uri: &Uri, headers: &HeaderMap) -> Self {
        let header_str = |name: header::HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(ToOwned::to_owned)
        };

        Self {
            inner: Arc::new(Inner {
                path: uri.path().to_owned(),
                host: header_str(header::HOST)
                    .or_else(|| uri.authority().map(|a| a.as_str().to_owned())),
                accept: header_str(header::ACCEPT),
                trace_id: extract_trace_id(headers),
                endpoint: RwLock::new(None),
                handled: OnceLock::new(),
                started: AtomicBool::new(false),
            }),
        }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.inner.path
    }

    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.inner.host.as_deref()
    }

    #[must_use]
    pub fn accept(&self) -> Option<&str> {
        self.inner.accept.as_deref()
    }

    #[must_use]
    pub fn trace_id(&self) -> &str {
        &self.inner.trace_id
    }

    /// Record the flavor of the matched endpoint. The innermost layer wins.
    pub fn set_endpoint(&self, flavor: EndpointFlavor) {
        *self.inner.endpoint.write() = Some(flavor);
    }

    #[must_use]
    pub fn endpoint(&self) -> Option<EndpointFlavor> {
        *self.inner.endpoint.read()
    }

    /// Claim the request for `by`. Returns `false` if another stage already did.
    pub fn try_mark_handled(&self, by: HandledBy) -> bool {
        self.inner.handled.set(by).is_ok()
    }

    #[must_use]
    pub fn handled_by(&self) -> Option<HandledBy> {
        self.inner.handled.get().copied()
    }

    #[must_use]
    pub fn is_handled(&self) -> bool {
        self.inner.handled.get().is_some()
    }

    /// Tell the pipeline the response is being streamed and must not be replaced.
    pub fn mark_response_started(&self) {
        self.inner.started.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn response_started(&self) -> bool {
        self.inner.started.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn meta(&self) -> RequestMeta<'_> {
        RequestMeta {
            endpoint: self.endpoint(),
            accept: self.accept(),
            path: self.path(),
            host: self.host(),
        }
    }

    #[must_use]
    pub fn classify(&self, options: &ProblemDetailsOptions) -> RequestClass {
        classify(&self.meta(), options.formatters(), options.api_path_markers())
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("path", &self.inner.path)
            .field("trace_id", &self.inner.trace_id)
            .field("endpoint", &self.endpoint())
            .field("handled_by", &self.handled_by())
            .field("started", &self.response_started())
            .finish_non_exhaustive()
    }
}

/// Correlation id from `x-trace-id`, `x-request-id` or `traceparent`, else the
/// current span id, else a fresh UUIDv7.
#[must_use]
pub fn extract_trace_id(headers: &HeaderMap) -> String {
    headers
        .get("x-trace-id")
        .or_else(|| headers.get("x-request-id"))
        .or_else(|| headers.get("traceparent"))
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
        .or_else(|| {
            tracing::Span::current()
                .id()
                .map(|id| id.into_u64().to_string())
        })
        .unwrap_or_else(|| uuid::Uuid::now_v7().to_string())
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .unwrap_or_else(|| RequestContext::from_head(&parts.uri, &parts.headers)))
    }
}
