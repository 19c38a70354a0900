//! Runtime options: status and exception handler tables, predicates, formatters.
//!
//! Options are assembled once at startup, either from [`ProblemDetailsConfig`]
//! or programmatically, and shared read-only behind an `Arc` afterwards.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use http::StatusCode;
use mvcapi_problem::{ErrorMappingTable, ProblemDetails};

use crate::config::{MiddlewareConfig, ProblemDetailsConfig};
use crate::context::RequestContext;
use crate::error::{ActionError, ErrorKind, client_closed_request};
use crate::factory::{create_problem, enrich};
use crate::negotiation::{FormatterRegistry, MediaType, OutputFormatter, XmlFormatter};
use crate::validation::validation_problem;
use crate::view::ViewEngine;

/// Errors raised while building options.
#[derive(Debug, thiserror::Error)]
pub enum OptionsError {
    #[error("invalid status code '{value}' in client error mapping")]
    InvalidStatus { value: String },
}

/// Input of a status handler.
pub struct StatusContext<'a> {
    pub request: &'a RequestContext,
    pub status: StatusCode,
    pub options: &'a ProblemDetailsOptions,
}

impl StatusContext<'_> {
    /// The default problem for this status.
    pub fn problem(&self) -> ProblemDetails {
        create_problem(self.request, self.options.mapping(), self.status, None)
    }
}

/// Input of an exception handler.
pub struct ExceptionContext<'a> {
    pub request: &'a RequestContext,
    pub error: &'a ActionError,
    pub options: &'a ProblemDetailsOptions,
}

impl ExceptionContext<'_> {
    /// Whether the client may see error messages for this request.
    #[must_use]
    pub fn show_details(&self) -> bool {
        self.options.show_details(self.request, self.error)
    }

    /// Problem for `status`, with the error chain as detail when details are shown.
    pub fn problem(&self, status: StatusCode) -> ProblemDetails {
        let detail = self.show_details().then(|| self.error.error_chain());
        create_problem(self.request, self.options.mapping(), status, detail)
    }
}

pub type StatusHandler = Arc<dyn Fn(&StatusContext<'_>) -> Option<ProblemDetails> + Send + Sync>;
pub type ExceptionHandler =
    Arc<dyn Fn(&ExceptionContext<'_>) -> Option<ProblemDetails> + Send + Sync>;
pub type StatusPredicate = Arc<dyn Fn(&RequestContext, StatusCode) -> bool + Send + Sync>;
pub type ErrorPredicate = Arc<dyn Fn(&RequestContext, &ActionError) -> bool + Send + Sync>;

/// Everything the pipeline stages consult at request time.
#[must_use]
pub struct ProblemDetailsOptions {
    mapping: ErrorMappingTable,
    formatters: FormatterRegistry,
    problem_content_types: Vec<MediaType>,
    api_path_markers: Vec<String>,
    show_exception_details: bool,
    respect_browser_accept_header: bool,
    angular_errors: bool,
    middleware: MiddlewareConfig,
    status_handlers: HashMap<StatusCode, StatusHandler>,
    default_status_handler: Option<StatusHandler>,
    exception_handlers: HashMap<ErrorKind, ExceptionHandler>,
    default_exception_handler: Option<ExceptionHandler>,
    show_details_when: Option<ErrorPredicate>,
    handle_error_when: StatusPredicate,
    handle_exception_when: Option<ErrorPredicate>,
    view_engine: Option<Arc<dyn ViewEngine>>,
}

impl Default for ProblemDetailsOptions {
    fn default() -> Self {
        let mut options = Self {
            mapping: ErrorMappingTable::default(),
            formatters: FormatterRegistry::with_defaults(),
            problem_content_types: problem_types(false),
            api_path_markers: vec!["api".to_owned()],
            show_exception_details: false,
            respect_browser_accept_header: false,
            angular_errors: false,
            middleware: MiddlewareConfig::default(),
            status_handlers: HashMap::new(),
            default_status_handler: Some(Arc::new(status_problem)),
            exception_handlers: HashMap::new(),
            default_exception_handler: Some(Arc::new(unhandled_error)),
            show_details_when: None,
            handle_error_when: Arc::new(is_error_status),
            handle_exception_when: None,
            view_engine: None,
        };
        options
            .exception_handlers
            .insert(ErrorKind::Operational, Arc::new(operational_error));
        options
            .exception_handlers
            .insert(ErrorKind::Problem, Arc::new(supplied_problem));
        options
            .exception_handlers
            .insert(ErrorKind::Validation, Arc::new(invalid_model_state));
        options
    }
}

fn problem_types(xml: bool) -> Vec<MediaType> {
    let mut types = vec![mvcapi_problem::APPLICATION_PROBLEM_JSON];
    if xml {
        types.push(mvcapi_problem::APPLICATION_PROBLEM_XML);
    }
    types.into_iter().filter_map(MediaType::parse).collect()
}

#[allow(clippy::unnecessary_wraps)] // must match the handler signature
fn status_problem(ctx: &StatusContext<'_>) -> Option<ProblemDetails> {
    Some(ctx.problem())
}

fn is_error_status(_: &RequestContext, status: StatusCode) -> bool {
    status.is_client_error() || status.is_server_error()
}

fn operational_error(ctx: &ExceptionContext<'_>) -> Option<ProblemDetails> {
    let status = match ctx.error {
        ActionError::Cancelled => {
            tracing::info!(path = %ctx.request.path(), "Request was cancelled");
            client_closed_request()
        }
        ActionError::Timeout => {
            tracing::info!(path = %ctx.request.path(), "Request timed out");
            StatusCode::GATEWAY_TIMEOUT
        }
        _ => return None,
    };
    Some(ctx.problem(status))
}

fn supplied_problem(ctx: &ExceptionContext<'_>) -> Option<ProblemDetails> {
    match ctx.error {
        ActionError::Problem(problem) => Some(enrich(ctx.request, (**problem).clone())),
        _ => None,
    }
}

fn invalid_model_state(ctx: &ExceptionContext<'_>) -> Option<ProblemDetails> {
    match ctx.error {
        ActionError::Validation(state) => {
            let problem = validation_problem(state, ctx.options.mapping(), ctx.options.angular_errors);
            Some(enrich(ctx.request, problem))
        }
        _ => None,
    }
}

#[allow(clippy::unnecessary_wraps)] // must match the handler signature
fn unhandled_error(ctx: &ExceptionContext<'_>) -> Option<ProblemDetails> {
    tracing::error!(
        path = %ctx.request.path(),
        trace_id = %ctx.request.trace_id(),
        error = %ctx.error.error_chain(),
        "An unhandled error has occurred while executing the request"
    );
    Some(ctx.problem(StatusCode::INTERNAL_SERVER_ERROR))
}

impl ProblemDetailsOptions {
    /// Build options from configuration.
    ///
    /// # Errors
    /// Returns [`OptionsError::InvalidStatus`] when a mapping key is not a valid status code.
    pub fn from_config(cfg: &ProblemDetailsConfig) -> Result<Self, OptionsError> {
        let mut overrides = ErrorMappingTable::empty();
        for (key, data) in &cfg.client_error_mapping {
            let status = key
                .trim()
                .parse::<u16>()
                .ok()
                .and_then(|code| StatusCode::from_u16(code).ok())
                .ok_or_else(|| OptionsError::InvalidStatus { value: key.clone() })?;
            overrides.insert(status, data.clone());
        }

        let mut options = Self {
            mapping: ErrorMappingTable::default().merged(&overrides),
            api_path_markers: cfg.api_path_markers.clone(),
            show_exception_details: cfg.show_exception_details,
            respect_browser_accept_header: cfg.respect_browser_accept_header,
            angular_errors: cfg.angular_errors,
            middleware: cfg.middleware,
            ..Self::default()
        };
        if cfg.xml_formatter {
            options = options.with_formatter(Arc::new(XmlFormatter::default()));
            options.problem_content_types = problem_types(true);
        }
        Ok(options)
    }

    /// Use `handler` for responses with `status`, replacing the default handler for it.
    pub fn with_status_handler<F>(mut self, status: StatusCode, handler: F) -> Self
    where
        F: Fn(&StatusContext<'_>) -> Option<ProblemDetails> + Send + Sync + 'static,
    {
        self.status_handlers.insert(status, Arc::new(handler));
        self
    }

    /// Use `handler` for statuses without a dedicated handler.
    pub fn with_default_status_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&StatusContext<'_>) -> Option<ProblemDetails> + Send + Sync + 'static,
    {
        self.default_status_handler = Some(Arc::new(handler));
        self
    }

    /// Use `handler` for errors of `kind`. More specific kinds are tried first.
    pub fn with_exception_handler<F>(mut self, kind: ErrorKind, handler: F) -> Self
    where
        F: Fn(&ExceptionContext<'_>) -> Option<ProblemDetails> + Send + Sync + 'static,
    {
        self.exception_handlers.insert(kind, Arc::new(handler));
        self
    }

    /// Use `handler` for errors no kind handler claims.
    pub fn with_default_exception_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ExceptionContext<'_>) -> Option<ProblemDetails> + Send + Sync + 'static,
    {
        self.default_exception_handler = Some(Arc::new(handler));
        self
    }

    /// Let unclaimed errors propagate instead of becoming 500 problems.
    pub fn without_default_exception_handler(mut self) -> Self {
        self.default_exception_handler = None;
        self
    }

    /// Decide per request whether error messages reach the client.
    pub fn show_exception_details_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&RequestContext, &ActionError) -> bool + Send + Sync + 'static,
    {
        self.show_details_when = Some(Arc::new(predicate));
        self
    }

    /// Decide which response statuses are turned into problems. Defaults to 4xx and 5xx.
    pub fn handle_error_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&RequestContext, StatusCode) -> bool + Send + Sync + 'static,
    {
        self.handle_error_when = Arc::new(predicate);
        self
    }

    /// Decide which raised errors are turned into problems. Defaults to all.
    pub fn handle_exception_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&RequestContext, &ActionError) -> bool + Send + Sync + 'static,
    {
        self.handle_exception_when = Some(Arc::new(predicate));
        self
    }

    pub fn with_view_engine(mut self, engine: Arc<dyn ViewEngine>) -> Self {
        self.view_engine = Some(engine);
        self
    }

    /// Register an additional output formatter after the existing ones.
    pub fn with_formatter(mut self, formatter: Arc<dyn OutputFormatter>) -> Self {
        self.formatters.register(formatter);
        self
    }

    pub fn with_show_exception_details(mut self, show: bool) -> Self {
        self.show_exception_details = show;
        self
    }

    pub fn with_middleware_config(mut self, middleware: MiddlewareConfig) -> Self {
        self.middleware = middleware;
        self
    }

    #[must_use]
    pub fn mapping(&self) -> &ErrorMappingTable {
        &self.mapping
    }

    #[must_use]
    pub fn formatters(&self) -> &FormatterRegistry {
        &self.formatters
    }

    /// `application/problem+json`, plus `application/problem+xml` when XML is enabled.
    #[must_use]
    pub fn problem_content_types(&self) -> &[MediaType] {
        &self.problem_content_types
    }

    #[must_use]
    pub fn api_path_markers(&self) -> &[String] {
        &self.api_path_markers
    }

    #[must_use]
    pub fn respect_browser_accept_header(&self) -> bool {
        self.respect_browser_accept_header
    }

    #[must_use]
    pub fn angular_errors(&self) -> bool {
        self.angular_errors
    }

    #[must_use]
    pub fn middleware(&self) -> MiddlewareConfig {
        self.middleware
    }

    #[must_use]
    pub fn view_engine(&self) -> Option<&Arc<dyn ViewEngine>> {
        self.view_engine.as_ref()
    }

    #[must_use]
    pub fn show_details(&self, ctx: &RequestContext, error: &ActionError) -> bool {
        self.show_details_when
            .as_ref()
            .map_or(self.show_exception_details, |p| p(ctx, error))
    }

    #[must_use]
    pub fn should_handle_error(&self, ctx: &RequestContext, status: StatusCode) -> bool {
        (self.handle_error_when)(ctx, status)
    }

    #[must_use]
    pub fn should_handle_exception(&self, ctx: &RequestContext, error: &ActionError) -> bool {
        self.handle_exception_when
            .as_ref()
            .is_none_or(|p| p(ctx, error))
    }

    /// Problem for an error status: the dedicated handler, else the default one.
    #[must_use]
    pub fn status_problem(&self, ctx: &RequestContext, status: StatusCode) -> Option<ProblemDetails> {
        let handler = self
            .status_handlers
            .get(&status)
            .or(self.default_status_handler.as_ref())?;
        handler(&StatusContext {
            request: ctx,
            status,
            options: self,
        })
    }

    /// Problem for a raised error: the first handler along `error.kinds()`, else the default.
    #[must_use]
    pub fn exception_problem(
        &self,
        ctx: &RequestContext,
        error: &ActionError,
    ) -> Option<ProblemDetails> {
        let handler = error
            .kinds()
            .iter()
            .find_map(|kind| self.exception_handlers.get(kind))
            .or(self.default_exception_handler.as_ref())?;
        handler(&ExceptionContext {
            request: ctx,
            error,
            options: self,
        })
    }
}

impl fmt::Debug for ProblemDetailsOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut statuses: Vec<u16> = self.status_handlers.keys().map(StatusCode::as_u16).collect();
        statuses.sort_unstable();
        let mut kinds: Vec<ErrorKind> = self.exception_handlers.keys().copied().collect();
        kinds.sort_unstable();
        f.debug_struct("ProblemDetailsOptions")
            .field("mapping", &self.mapping)
            .field("formatters", &self.formatters)
            .field("api_path_markers", &self.api_path_markers)
            .field("show_exception_details", &self.show_exception_details)
            .field("middleware", &self.middleware)
            .field("status_handlers", &statuses)
            .field("exception_handlers", &kinds)
            .field("view_engine", &self.view_engine.is_some())
            .finish_non_exhaustive()
    }
}
