//! RFC 9457 Problem Details for HTTP APIs (pure data model, no HTTP framework dependencies)

use http::StatusCode;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Content type for JSON Problem Details as per RFC 9457.
pub const APPLICATION_PROBLEM_JSON: &str = "application/problem+json";

/// Content type for XML Problem Details as per RFC 9457.
pub const APPLICATION_PROBLEM_XML: &str = "application/problem+xml";

/// XML namespace of the `<problem>` root element.
pub const PROBLEM_XML_NAMESPACE: &str = "urn:ietf:rfc:7807";

/// Problem type used when no more specific type is known.
pub const ABOUT_BLANK: &str = "about:blank";

/// Extension key holding the correlation identifier.
pub const TRACE_ID_KEY: &str = "traceId";

/// Extension key holding the UTC generation timestamp.
pub const TIME_GENERATED_KEY: &str = "timeGenerated";

/// Extension key holding validation errors (`field -> [messages]`).
pub const ERRORS_KEY: &str = "errors";

/// Custom serializer for `StatusCode` to u16
#[allow(clippy::trivially_copy_pass_by_ref)] // serde requires &T signature
fn serialize_status_code<S>(status: &StatusCode, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u16(status.as_u16())
}

/// Custom deserializer for `StatusCode` from u16
fn deserialize_status_code<'de, D>(deserializer: D) -> Result<StatusCode, D::Error>
where
    D: Deserializer<'de>,
{
    let code = u16::deserialize(deserializer)?;
    StatusCode::from_u16(code).map_err(serde::de::Error::custom)
}

fn about_blank() -> String {
    ABOUT_BLANK.to_owned()
}

/// RFC 9457 Problem Details for HTTP APIs.
///
/// Members other than `type`, `title`, `status`, `detail` and `instance` are
/// extensions and serialize at the top level of the payload, in insertion order.
/// Extensions can be added or replaced but never removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[must_use]
pub struct ProblemDetails {
    /// A URI reference that identifies the problem type.
    #[serde(rename = "type", default = "about_blank")]
    pub type_url: String,
    /// A short, human-readable summary of the problem type.
    #[serde(default)]
    pub title: String,
    /// The HTTP status code for this occurrence of the problem.
    /// Serializes as u16 for RFC 9457 compatibility.
    #[serde(
        serialize_with = "serialize_status_code",
        deserialize_with = "deserialize_status_code"
    )]
    pub status: StatusCode,
    /// A human-readable explanation specific to this occurrence of the problem.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// A URI reference that identifies the specific occurrence of the problem.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    #[serde(flatten)]
    extensions: IndexMap<String, Value>,
}

impl ProblemDetails {
    /// Create a new problem for `status` with an `about:blank` type and no title.
    pub fn new(status: StatusCode) -> Self {
        Self {
            type_url: about_blank(),
            title: String::new(),
            status,
            detail: None,
            instance: None,
            extensions: IndexMap::new(),
        }
    }

    pub fn with_type(mut self, type_url: impl Into<String>) -> Self {
        self.type_url = type_url.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_instance(mut self, uri: impl Into<String>) -> Self {
        self.instance = Some(uri.into());
        self
    }

    pub fn with_trace_id(self, id: impl Into<String>) -> Self {
        self.with_extension(TRACE_ID_KEY, Value::String(id.into()))
    }

    /// Add or replace an extension member.
    pub fn with_extension(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_extension(key, value);
        self
    }

    /// Add or replace an extension member in place.
    pub fn set_extension(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.extensions.insert(key.into(), value.into());
    }

    /// Add an extension member unless one with the same key already exists.
    ///
    /// Returns `true` when the value was inserted.
    pub fn set_extension_if_absent(
        &mut self,
        key: impl Into<String>,
        value: impl FnOnce() -> Value,
    ) -> bool {
        match self.extensions.entry(key.into()) {
            indexmap::map::Entry::Occupied(_) => false,
            indexmap::map::Entry::Vacant(slot) => {
                slot.insert(value());
                true
            }
        }
    }

    #[must_use]
    pub fn extension(&self, key: &str) -> Option<&Value> {
        self.extensions.get(key)
    }

    #[must_use]
    pub fn extensions(&self) -> &IndexMap<String, Value> {
        &self.extensions
    }

    #[must_use]
    pub fn trace_id(&self) -> Option<&str> {
        self.extension(TRACE_ID_KEY).and_then(Value::as_str)
    }

    #[must_use]
    pub fn time_generated(&self) -> Option<&str> {
        self.extension(TIME_GENERATED_KEY).and_then(Value::as_str)
    }

    /// `true` when the type member still carries the `about:blank` default.
    #[must_use]
    pub fn has_default_type(&self) -> bool {
        self.type_url.is_empty() || self.type_url == ABOUT_BLANK
    }
}

/// Axum integration: make `ProblemDetails` directly usable as a JSON response
#[cfg(feature = "axum")]
impl axum::response::IntoResponse for ProblemDetails {
    fn into_response(self) -> axum::response::Response {
        use axum::http::HeaderValue;

        let status = self.status;
        let mut resp = axum::Json(self).into_response();
        *resp.status_mut() = status;
        resp.headers_mut().insert(
            axum::http::header::CONTENT_TYPE,
            HeaderValue::from_static(APPLICATION_PROBLEM_JSON),
        );
        resp
    }
}
