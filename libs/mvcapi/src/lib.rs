#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Content negotiation and Problem Details normalization for axum
//!
//! One set of handlers serves both browsers (views, raw status pages) and API
//! clients (JSON/XML bodies, `application/problem+json` errors). Each request is
//! classified as *Browser* or *Api* from its `Accept` header and the flavor of
//! the matched endpoint; only Api requests have their errors rewritten.
//!
//! The pipeline has two layers:
//! - [`EndpointLayer`] (route layer) tags routes as API or MVC and runs the view,
//!   exception and result stages on the handler's response.
//! - [`ProblemDetailsLayer`] (router layer) installs the [`RequestContext`],
//!   catches panics and converts whatever the route stages left unhandled.
//!
//! Each request is converted at most once; the first stage to claim it wins.
//!
//! # Example
//!
//! ```ignore
//! use axum::{Router, routing::get};
//! use mvcapi::{MvcAsApi, ProblemDetailsConfig};
//!
//! let mvcapi = MvcAsApi::from_config(&ProblemDetailsConfig::default())?;
//! let api = Router::new()
//!     .route("/api/values", get(list_values))
//!     .route_layer(mvcapi.api_endpoints());
//! let app = Router::new().merge(api).layer(mvcapi.middleware());
//! ```

pub mod classify;
pub mod config;
pub mod context;
pub mod endpoint;
pub mod error;
pub mod factory;
pub mod filters;
pub mod middleware;
pub mod negotiation;
pub mod options;
pub mod validation;
pub mod view;
pub mod writer;

use std::sync::Arc;

pub use classify::{EndpointFlavor, RequestClass, classify};
pub use config::{MiddlewareConfig, ProblemDetailsConfig};
pub use context::{HandledBy, RequestContext};
pub use endpoint::{EndpointLayer, EndpointService};
pub use error::{ActionError, ErrorKind, RaisedError};
pub use middleware::{ProblemDetailsLayer, ProblemDetailsService};
pub use options::{ExceptionContext, OptionsError, ProblemDetailsOptions, StatusContext};
pub use validation::ModelState;
pub use view::{View, ViewEngine};
pub use writer::problem_response;

pub use mvcapi_problem::{ClientErrorData, ErrorMappingTable, ProblemDetails};

/// Shared options plus constructors for both layers.
#[derive(Clone, Debug, Default)]
pub struct MvcAsApi {
    options: Arc<ProblemDetailsOptions>,
}

impl MvcAsApi {
    #[must_use]
    pub fn new(options: ProblemDetailsOptions) -> Self {
        Self {
            options: Arc::new(options),
        }
    }

    /// # Errors
    /// Returns [`OptionsError`] when the configuration is invalid.
    pub fn from_config(cfg: &ProblemDetailsConfig) -> Result<Self, OptionsError> {
        ProblemDetailsOptions::from_config(cfg).map(Self::new)
    }

    #[must_use]
    pub fn options(&self) -> &Arc<ProblemDetailsOptions> {
        &self.options
    }

    /// Layer for the whole router.
    #[must_use]
    pub fn middleware(&self) -> ProblemDetailsLayer {
        ProblemDetailsLayer::new(Arc::clone(&self.options))
    }

    /// Route layer for API routes.
    #[must_use]
    pub fn api_endpoints(&self) -> EndpointLayer {
        EndpointLayer::api(Arc::clone(&self.options))
    }

    /// Route layer for MVC (view) routes.
    #[must_use]
    pub fn mvc_endpoints(&self) -> EndpointLayer {
        EndpointLayer::mvc(Arc::clone(&self.options))
    }
}

pub mod prelude {
    pub use crate::{
        ActionError, EndpointFlavor, ModelState, MvcAsApi, ProblemDetails, ProblemDetailsConfig,
        ProblemDetailsOptions, RequestContext, View, ViewEngine,
    };
}
