use std::collections::BTreeMap;

use mvcapi_problem::ClientErrorData;
use serde::{Deserialize, Serialize};

fn default_api_path_markers() -> Vec<String> {
    vec!["api".to_owned()]
}

fn default_true() -> bool {
    true
}

/// Problem details configuration, usually a section of the host's config file.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
#[allow(clippy::struct_excessive_bools)] // flat, serde-facing switches
pub struct ProblemDetailsConfig {
    /// Substrings of path or host marking a request as API-bound when no endpoint matched.
    #[serde(default = "default_api_path_markers")]
    pub api_path_markers: Vec<String>,

    /// Expose error messages and source chains in the `detail` member.
    #[serde(default)]
    pub show_exception_details: bool,

    /// Honour `*/*` when converting views for non-browser clients.
    #[serde(default)]
    pub respect_browser_accept_header: bool,

    /// Register the XML formatter and allow `application/problem+xml`.
    #[serde(default)]
    pub xml_formatter: bool,

    /// Add the `angularErrors` extension to validation problems.
    #[serde(default)]
    pub angular_errors: bool,

    /// Overrides merged onto the default status mapping, keyed by status code.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub client_error_mapping: BTreeMap<String, ClientErrorData>,

    #[serde(default)]
    pub middleware: MiddlewareConfig,
}

impl Default for ProblemDetailsConfig {
    fn default() -> Self {
        Self {
            api_path_markers: default_api_path_markers(),
            show_exception_details: false,
            respect_browser_accept_header: false,
            xml_formatter: false,
            angular_errors: false,
            client_error_mapping: BTreeMap::new(),
            middleware: MiddlewareConfig::default(),
        }
    }
}

/// Behaviour of the global problem details middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MiddlewareConfig {
    /// Buffer response bodies so errors raised while producing them can still be rewritten.
    #[serde(default = "default_true")]
    pub intercept_response_stream: bool,

    /// Re-examine responses already converted by the result or exception stage.
    #[serde(default)]
    pub handle_mvc_handled_responses: bool,

    /// Re-examine responses that already carry a problem content type.
    #[serde(default)]
    pub handle_problem_detail_responses: bool,
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            intercept_response_stream: true,
            handle_mvc_handled_responses: false,
            handle_problem_detail_responses: false,
        }
    }
}
