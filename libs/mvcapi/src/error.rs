//! Errors raised by handlers and the kind hierarchy used to dispatch them.

use std::sync::Arc;

use axum::response::{IntoResponse, Response};
use http::StatusCode;
use mvcapi_problem::ProblemDetails;

use crate::validation::ModelState;

/// Non-standard status used when the client went away before a response was produced.
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

/// `499 Client Closed Request`
#[must_use]
pub fn client_closed_request() -> StatusCode {
    StatusCode::from_u16(CLIENT_CLOSED_REQUEST).unwrap_or(StatusCode::BAD_REQUEST)
}

/// Error returned by handlers.
///
/// Returning `Err(ActionError)` produces an empty response carrying the error as a
/// [`RaisedError`] extension. [`crate::EndpointLayer`] and the middleware decide
/// what the client eventually sees.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("the request was cancelled")]
    Cancelled,

    #[error("the request timed out")]
    Timeout,

    #[error("{}", .0.title)]
    Problem(Box<ProblemDetails>),

    #[error("one or more validation errors occurred")]
    Validation(ModelState),

    #[error("handler panicked: {0}")]
    Panic(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Node of the error kind hierarchy, from most specific to [`ErrorKind::Any`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorKind {
    Cancelled,
    Timeout,
    /// Cancellations and timeouts: expected conditions, not bugs.
    Operational,
    Problem,
    Validation,
    Panic,
    Internal,
    Any,
}

impl ActionError {
    #[must_use]
    pub fn problem(problem: ProblemDetails) -> Self {
        Self::Problem(Box::new(problem))
    }

    /// Kinds this error belongs to, most specific first.
    #[must_use]
    pub fn kinds(&self) -> &'static [ErrorKind] {
        match self {
            Self::Cancelled => &[ErrorKind::Cancelled, ErrorKind::Operational, ErrorKind::Any],
            Self::Timeout => &[ErrorKind::Timeout, ErrorKind::Operational, ErrorKind::Any],
            Self::Problem(_) => &[ErrorKind::Problem, ErrorKind::Any],
            Self::Validation(_) => &[ErrorKind::Validation, ErrorKind::Any],
            Self::Panic(_) => &[ErrorKind::Panic, ErrorKind::Any],
            Self::Internal(_) => &[ErrorKind::Internal, ErrorKind::Any],
        }
    }

    #[must_use]
    pub fn is_operational(&self) -> bool {
        self.kinds().contains(&ErrorKind::Operational)
    }

    /// Status of the placeholder response produced before any stage handles the error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Cancelled => client_closed_request(),
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Problem(p) => p.status,
            Self::Validation(state) => state.status(),
            Self::Panic(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message followed by every source, joined with `": "`.
    #[must_use]
    pub fn error_chain(&self) -> String {
        match self {
            Self::Internal(e) => format!("{e:#}"),
            other => other.to_string(),
        }
    }
}

impl From<tokio::time::error::Elapsed> for ActionError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Self::Timeout
    }
}

impl From<ProblemDetails> for ActionError {
    fn from(problem: ProblemDetails) -> Self {
        Self::problem(problem)
    }
}

impl From<ModelState> for ActionError {
    fn from(state: ModelState) -> Self {
        Self::Validation(state)
    }
}

impl From<serde_json::Error> for ActionError {
    fn from(e: serde_json::Error) -> Self {
        Self::Internal(e.into())
    }
}

/// Extractor rejections become problems with the rejection's status and message,
/// so `Result<Json<T>, JsonRejection>` arguments can be propagated with `?`.
macro_rules! impl_from_rejection {
    ($($rejection:ty),+ $(,)?) => {
        $(
            impl From<$rejection> for ActionError {
                fn from(rejection: $rejection) -> Self {
                    Self::problem(
                        ProblemDetails::new(rejection.status()).with_detail(rejection.body_text()),
                    )
                }
            }
        )+
    };
}

impl_from_rejection!(
    axum::extract::rejection::JsonRejection,
    axum::extract::rejection::PathRejection,
    axum::extract::rejection::QueryRejection,
    axum::extract::rejection::FormRejection,
);

/// Response extension carrying an error that no stage has handled yet.
#[derive(Debug, Clone)]
pub struct RaisedError(pub Arc<ActionError>);

impl RaisedError {
    #[must_use]
    pub fn error(&self) -> &ActionError {
        &self.0
    }
}

impl IntoResponse for ActionError {
    fn into_response(self) -> Response {
        let mut resp = self.status().into_response();
        resp.extensions_mut().insert(RaisedError(Arc::new(self)));
        resp
    }
}
