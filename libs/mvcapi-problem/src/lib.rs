//! Problem Details data types for MvcAsApi
//!
//! This crate provides pure data types for error payloads, with no dependencies
//! on HTTP frameworks. It includes:
//! - RFC 9457 Problem Details (`ProblemDetails`)
//! - The status code to title/type mapping table (`ErrorMappingTable`)
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod mapping;
pub mod problem;

// Re-export commonly used types
pub use mapping::{ClientErrorData, ErrorMappingTable};
pub use problem::{
    ABOUT_BLANK, APPLICATION_PROBLEM_JSON, APPLICATION_PROBLEM_XML, ERRORS_KEY,
    PROBLEM_XML_NAMESPACE, ProblemDetails, TIME_GENERATED_KEY, TRACE_ID_KEY,
};

/// Helper to attach instance and `trace_id` to a problem
///
/// Existing members are kept; only missing ones are filled in.
pub fn finalize(mut p: ProblemDetails, instance: &str, trace_id: Option<&str>) -> ProblemDetails {
    if p.instance.is_none() {
        p = p.with_instance(instance);
    }
    if let Some(tid) = trace_id {
        p.set_extension_if_absent(TRACE_ID_KEY, || serde_json::Value::String(tid.to_owned()));
    }
    p
}
