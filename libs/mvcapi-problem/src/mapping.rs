//! Client error mapping: status code -> problem title and type link

use std::collections::BTreeMap;

use http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::problem::{ABOUT_BLANK, ProblemDetails};

/// Title and type link used for problems with a given status code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientErrorData {
    pub title: String,
    #[serde(default = "default_link")]
    pub link: String,
}

fn default_link() -> String {
    ABOUT_BLANK.to_owned()
}

impl ClientErrorData {
    #[must_use]
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
        }
    }
}

const RFC7231: &str = "https://tools.ietf.org/html/rfc7231";

const DEFAULTS: &[(u16, &str, &str)] = &[
    (400, "Bad Request", "#section-6.5.1"),
    (403, "Forbidden", "#section-6.5.3"),
    (404, "Not Found", "#section-6.5.4"),
    (406, "Not Acceptable", "#section-6.5.6"),
    (409, "Conflict", "#section-6.5.8"),
    (415, "Unsupported Media Type", "#section-6.5.13"),
];

/// Status code to [`ClientErrorData`] table.
///
/// Built once while configuring the application and shared read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorMappingTable {
    entries: BTreeMap<u16, ClientErrorData>,
}

impl Default for ErrorMappingTable {
    fn default() -> Self {
        let mut entries: BTreeMap<u16, ClientErrorData> = DEFAULTS
            .iter()
            .map(|(code, title, anchor)| {
                (*code, ClientErrorData::new(*title, format!("{RFC7231}{anchor}")))
            })
            .collect();
        entries.insert(
            401,
            ClientErrorData::new("Unauthorized", "https://tools.ietf.org/html/rfc7235#section-3.1"),
        );
        entries.insert(
            422,
            ClientErrorData::new(
                "One or more validation errors occurred.",
                "https://tools.ietf.org/html/rfc4918#section-11.2",
            ),
        );
        entries.insert(499, ClientErrorData::new("The request was cancelled.", ABOUT_BLANK));
        entries.insert(500, ClientErrorData::new("An error has occurred.", ABOUT_BLANK));
        entries.insert(504, ClientErrorData::new("The request timed out.", ABOUT_BLANK));
        Self { entries }
    }
}

impl ErrorMappingTable {
    /// Table without any entries.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn get(&self, status: StatusCode) -> Option<&ClientErrorData> {
        self.entries.get(&status.as_u16())
    }

    pub fn insert(&mut self, status: StatusCode, data: ClientErrorData) {
        self.entries.insert(status.as_u16(), data);
    }

    /// Overlay `overrides` on top of this table, replacing entries with the same code.
    #[must_use]
    pub fn merged(mut self, overrides: &ErrorMappingTable) -> Self {
        for (code, data) in &overrides.entries {
            self.entries.insert(*code, data.clone());
        }
        self
    }

    /// Title for `status`: the mapped title or the canonical reason phrase.
    #[must_use]
    pub fn title_for(&self, status: StatusCode) -> String {
        self.get(status).map_or_else(
            || status.canonical_reason().unwrap_or("Error").to_owned(),
            |data| data.title.clone(),
        )
    }

    /// Fill in a missing title and a default type from the table.
    pub fn apply_defaults(&self, problem: &mut ProblemDetails) {
        if problem.title.is_empty() {
            problem.title = self.title_for(problem.status);
        }
        if problem.has_default_type() {
            problem.type_url = self
                .get(problem.status)
                .map_or_else(|| ABOUT_BLANK.to_owned(), |data| data.link.clone());
        }
    }

    /// Convert the entry for `status` into a problem.
    #[inline]
    pub fn as_problem(&self, status: StatusCode) -> ProblemDetails {
        let mut problem = ProblemDetails::new(status);
        self.apply_defaults(&mut problem);
        problem
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_operational_statuses() {
        let table = ErrorMappingTable::default();

        let timeout = table.as_problem(StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(timeout.title, "The request timed out.");
        assert_eq!(timeout.type_url, ABOUT_BLANK);

        let cancelled = table.as_problem(StatusCode::from_u16(499).unwrap());
        assert_eq!(cancelled.title, "The request was cancelled.");

        let not_found = table.as_problem(StatusCode::NOT_FOUND);
        assert_eq!(not_found.title, "Not Found");
        assert_eq!(
            not_found.type_url,
            "https://tools.ietf.org/html/rfc7231#section-6.5.4"
        );
    }

    #[test]
    fn unmapped_status_uses_reason_phrase() {
        let table = ErrorMappingTable::empty();
        let problem = table.as_problem(StatusCode::IM_A_TEAPOT);
        assert_eq!(problem.title, "I'm a teapot");
        assert_eq!(problem.type_url, ABOUT_BLANK);
    }

    #[test]
    fn apply_defaults_keeps_explicit_members() {
        let table = ErrorMappingTable::default();
        let mut problem = ProblemDetails::new(StatusCode::NOT_FOUND)
            .with_title("No such user")
            .with_type("https://errors.example.com/USER_NOT_FOUND");
        table.apply_defaults(&mut problem);
        assert_eq!(problem.title, "No such user");
        assert_eq!(problem.type_url, "https://errors.example.com/USER_NOT_FOUND");
    }

    #[test]
    fn overrides_replace_defaults() {
        let mut overrides = ErrorMappingTable::empty();
        overrides.insert(
            StatusCode::NOT_FOUND,
            ClientErrorData::new("Nothing here", "https://errors.example.com/404"),
        );
        let table = ErrorMappingTable::default().merged(&overrides);
        assert_eq!(table.title_for(StatusCode::NOT_FOUND), "Nothing here");
        assert_eq!(table.title_for(StatusCode::CONFLICT), "Conflict");
    }

    #[test]
    fn deserializes_from_status_keyed_map() {
        let table: ErrorMappingTable =
            serde_json::from_str(r#"{"418":{"title":"Short and stout"}}"#).unwrap();
        let data = table.get(StatusCode::IM_A_TEAPOT).unwrap();
        assert_eq!(data.title, "Short and stout");
        assert_eq!(data.link, ABOUT_BLANK);
    }
}
