#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Sample server for the `mvcapi` layers.
//!
//! The same process serves an MVC area rendered as HTML for browsers and a
//! JSON API area; errors from either reach API clients as problem details.

pub mod config;
pub mod logging;
pub mod routes;
pub mod shutdown;
pub mod views;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use mvcapi::{MvcAsApi, ProblemDetailsOptions};

use crate::config::AppConfig;
use crate::routes::DemoState;
use crate::views::TemplateEngine;

/// Build the application router from configuration.
///
/// # Errors
/// Fails when the problem details configuration is invalid.
pub fn build_app(cfg: &AppConfig) -> anyhow::Result<Router> {
    let options = ProblemDetailsOptions::from_config(&cfg.problem_details)?
        .with_view_engine(Arc::new(TemplateEngine::default()));
    let mvcapi = MvcAsApi::new(options);

    let state = DemoState {
        slow_timeout: Duration::from_millis(cfg.server.slow_timeout_ms),
    };

    let home = routes::home_routes().route_layer(mvcapi.mvc_endpoints());
    let values = routes::values_routes().route_layer(mvcapi.api_endpoints());

    Ok(Router::new()
        .merge(home)
        .merge(values)
        .layer(mvcapi.middleware())
        .with_state(state))
}
