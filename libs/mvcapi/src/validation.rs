//! Model state and validation problems.
//!
//! A handler that binds and validates its inputs records the outcome in a
//! [`ModelState`]. When a request turns out invalid the handler returns
//! `ActionError::Validation(state)` and the pipeline turns it into a problem:
//! 422 when every declared parameter was bound (the input was well-formed but
//! semantically wrong), 400 when something could not be bound at all.

use std::collections::BTreeSet;

use http::StatusCode;
use indexmap::IndexMap;
use mvcapi_problem::{ERRORS_KEY, ErrorMappingTable, ProblemDetails};
use serde::Serialize;
use serde_json::Value;

pub const VALIDATION_DETAIL: &str = "Please refer to the errors property for additional details.";
pub const ANGULAR_ERRORS_KEY: &str = "angularErrors";

/// Binding and validation outcome of one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelState {
    declared_parameters: usize,
    bound_parameters: BTreeSet<String>,
    errors: IndexMap<String, Vec<String>>,
}

impl ModelState {
    /// State for an action declaring `declared_parameters` inputs.
    #[must_use]
    pub fn new(declared_parameters: usize) -> Self {
        Self {
            declared_parameters,
            ..Self::default()
        }
    }

    pub fn mark_bound(&mut self, parameter: impl Into<String>) {
        self.bound_parameters.insert(parameter.into());
    }

    #[must_use]
    pub fn with_bound(mut self, parameter: impl Into<String>) -> Self {
        self.mark_bound(parameter);
        self
    }

    /// Record an error message for `key`. Messages may be `"validatorKey|message"`.
    pub fn add_error(&mut self, key: impl Into<String>, message: impl Into<String>) {
        self.errors.entry(key.into()).or_default().push(message.into());
    }

    #[must_use]
    pub fn with_error(mut self, key: impl Into<String>, message: impl Into<String>) -> Self {
        self.add_error(key, message);
        self
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn errors(&self) -> &IndexMap<String, Vec<String>> {
        &self.errors
    }

    #[must_use]
    pub fn all_parameters_bound(&self) -> bool {
        self.bound_parameters.len() >= self.declared_parameters
    }

    /// 422 for semantic failures, 400 for structurally bad input.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        if !self.is_valid() && self.all_parameters_bound() {
            StatusCode::UNPROCESSABLE_ENTITY
        } else {
            StatusCode::BAD_REQUEST
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AngularError<'a> {
    validator_key: &'a str,
    message: &'a str,
}

fn angular_error(raw: &str) -> AngularError<'_> {
    match raw.split_once('|') {
        Some((validator_key, rest)) => AngularError {
            validator_key,
            // only the segment after the first separator is the message
            message: rest.split('|').next().unwrap_or(rest),
        },
        None => AngularError {
            validator_key: "",
            message: raw,
        },
    }
}

/// Build the validation problem for `state`.
///
/// Title and type come from `mapping` for the chosen status. Instance, trace id
/// and timestamp are added later by the problem writer.
pub fn validation_problem(
    state: &ModelState,
    mapping: &ErrorMappingTable,
    angular_errors: bool,
) -> ProblemDetails {
    let mut problem = ProblemDetails::new(state.status()).with_detail(VALIDATION_DETAIL);
    mapping.apply_defaults(&mut problem);

    let errors: serde_json::Map<String, Value> = state
        .errors()
        .iter()
        .map(|(key, messages)| (key.clone(), Value::from(messages.clone())))
        .collect();
    problem.set_extension(ERRORS_KEY, Value::Object(errors));

    if angular_errors {
        let angular: serde_json::Map<String, Value> = state
            .errors()
            .iter()
            .map(|(key, messages)| {
                let entries: Vec<AngularError<'_>> =
                    messages.iter().map(|m| angular_error(m)).collect();
                (
                    key.clone(),
                    serde_json::to_value(entries).unwrap_or(Value::Null),
                )
            })
            .collect();
        problem.set_extension(ANGULAR_ERRORS_KEY, Value::Object(angular));
    }

    problem
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn all_bound_with_errors_is_unprocessable() {
        let state = ModelState::new(2)
            .with_bound("id")
            .with_bound("body")
            .with_error("Name", "The Name field is required.");
        assert_eq!(state.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn missing_binding_is_bad_request() {
        let state = ModelState::new(3)
            .with_bound("id")
            .with_bound("body")
            .with_error("page", "The value 'abc' is not valid.");
        assert_eq!(state.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn problem_uses_mapping_and_errors_extension() {
        let state = ModelState::new(1)
            .with_bound("body")
            .with_error("Email", "The Email field is required.")
            .with_error("Email", "The Email field is not a valid e-mail address.");
        let problem = validation_problem(&state, &ErrorMappingTable::default(), false);

        assert_eq!(problem.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(problem.title, "One or more validation errors occurred.");
        assert_eq!(
            problem.type_url,
            "https://tools.ietf.org/html/rfc4918#section-11.2"
        );
        assert_eq!(problem.detail.as_deref(), Some(VALIDATION_DETAIL));
        assert_eq!(
            problem.extension(ERRORS_KEY),
            Some(&json!({"Email": [
                "The Email field is required.",
                "The Email field is not a valid e-mail address."
            ]}))
        );
        assert!(problem.extension(ANGULAR_ERRORS_KEY).is_none());
    }

    #[test]
    fn bad_request_problem_links_rfc7231() {
        let state = ModelState::new(2).with_error("id", "The value 'x' is not valid.");
        let problem = validation_problem(&state, &ErrorMappingTable::default(), false);
        assert_eq!(problem.status, StatusCode::BAD_REQUEST);
        assert_eq!(
            problem.type_url,
            "https://tools.ietf.org/html/rfc7231#section-6.5.1"
        );
    }

    #[test]
    fn angular_errors_split_validator_keys() {
        let state = ModelState::new(0)
            .with_error("Name", "required|Name is required")
            .with_error("Name", "Too short");
        let problem = validation_problem(&state, &ErrorMappingTable::default(), true);
        assert_eq!(
            problem.extension(ANGULAR_ERRORS_KEY),
            Some(&json!({"Name": [
                {"validatorKey": "required", "message": "Name is required"},
                {"validatorKey": "", "message": "Too short"}
            ]}))
        );
    }
}
