//! Output formatters and formatter selection.
//!
//! A formatter turns a serialized value into response bytes for one family of
//! media types. Selection walks the client's accepted media types in order and
//! picks the first registered formatter that can write the value in one of them.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value;

use super::accept::MediaTypeSegment;
use super::media_type::MediaType;

/// Errors produced while writing a response body.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML serialization failed: {0}")]
    Xml(String),

    #[error("formatter '{formatter}' cannot write this value")]
    Unsupported { formatter: &'static str },
}

/// What is being written and how.
#[derive(Debug, Clone, Copy)]
pub struct WriteContext<'a> {
    pub value: &'a Value,
    pub content_type: &'a MediaType,
    /// Root element for formats that need one (XML).
    pub root_element: &'a str,
    pub namespace: Option<&'a str>,
}

impl<'a> WriteContext<'a> {
    #[must_use]
    pub fn new(value: &'a Value, content_type: &'a MediaType) -> Self {
        Self {
            value,
            content_type,
            root_element: "root",
            namespace: None,
        }
    }

    #[must_use]
    pub fn with_root(mut self, root_element: &'a str, namespace: Option<&'a str>) -> Self {
        self.root_element = root_element;
        self.namespace = namespace;
        self
    }
}

/// Serializes values into one family of media types.
pub trait OutputFormatter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Media types this formatter produces. Entries may be wildcards such as
    /// `application/*+json`.
    fn supported_media_types(&self) -> &[MediaType];

    fn can_write_value(&self, value: &Value) -> bool;

    /// Write the value.
    ///
    /// # Errors
    /// Returns [`FormatError`] when the value cannot be encoded.
    fn write(&self, ctx: &WriteContext<'_>) -> Result<Bytes, FormatError>;
}

fn media_types(raw: &[&str]) -> Vec<MediaType> {
    raw.iter().filter_map(|r| MediaType::parse(r)).collect()
}

/// `application/json`, `text/json` and `application/*+json`.
pub struct JsonFormatter {
    supported: Vec<MediaType>,
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self {
            supported: media_types(&["application/json", "text/json", "application/*+json"]),
        }
    }
}

impl OutputFormatter for JsonFormatter {
    fn name(&self) -> &'static str {
        "json"
    }

    fn supported_media_types(&self) -> &[MediaType] {
        &self.supported
    }

    fn can_write_value(&self, _value: &Value) -> bool {
        true
    }

    fn write(&self, ctx: &WriteContext<'_>) -> Result<Bytes, FormatError> {
        Ok(Bytes::from(serde_json::to_vec(ctx.value)?))
    }
}

/// `text/plain` for string values only.
pub struct PlainTextFormatter {
    supported: Vec<MediaType>,
}

impl Default for PlainTextFormatter {
    fn default() -> Self {
        Self {
            supported: vec![MediaType::from(mime::TEXT_PLAIN_UTF_8)],
        }
    }
}

impl OutputFormatter for PlainTextFormatter {
    fn name(&self) -> &'static str {
        "text"
    }

    fn supported_media_types(&self) -> &[MediaType] {
        &self.supported
    }

    fn can_write_value(&self, value: &Value) -> bool {
        value.is_string()
    }

    fn write(&self, ctx: &WriteContext<'_>) -> Result<Bytes, FormatError> {
        match ctx.value {
            Value::String(s) => Ok(Bytes::from(s.clone())),
            _ => Err(FormatError::Unsupported {
                formatter: self.name(),
            }),
        }
    }
}

/// Ordered set of formatters. Registration order breaks ties during selection.
#[derive(Clone, Default)]
pub struct FormatterRegistry {
    formatters: Vec<Arc<dyn OutputFormatter>>,
}

impl FormatterRegistry {
    /// Plain text and JSON, in that order.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::default();
        registry.register(Arc::new(PlainTextFormatter::default()));
        registry.register(Arc::new(JsonFormatter::default()));
        registry
    }

    pub fn register(&mut self, formatter: Arc<dyn OutputFormatter>) {
        self.formatters.push(formatter);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn OutputFormatter>> {
        self.formatters.iter()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.formatters.is_empty()
    }

    /// `true` when some formatter can write `value` as a subset of `requested`.
    #[must_use]
    pub fn can_satisfy(&self, value: &Value, requested: &MediaType) -> bool {
        self.iter()
            .any(|f| f.can_write_value(value) && resolve(&**f, requested).is_some())
    }
}

impl fmt::Debug for FormatterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.formatters.iter().map(|x| x.name()))
            .finish()
    }
}

/// Formatter chosen by negotiation together with the response content type.
#[derive(Clone)]
pub struct FormatterSelection {
    pub formatter: Arc<dyn OutputFormatter>,
    pub content_type: MediaType,
}

impl FormatterSelection {
    /// Write `value` with the selected formatter and content type.
    ///
    /// # Errors
    /// Propagates the formatter's [`FormatError`].
    pub fn write(
        &self,
        value: &Value,
        root_element: &str,
        namespace: Option<&str>,
    ) -> Result<Bytes, FormatError> {
        let ctx = WriteContext::new(value, &self.content_type).with_root(root_element, namespace);
        self.formatter.write(&ctx)
    }
}

impl fmt::Debug for FormatterSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatterSelection")
            .field("formatter", &self.formatter.name())
            .field("content_type", &self.content_type)
            .finish()
    }
}

/// Content type the formatter would produce for `requested`, if any.
///
/// A concrete supported type matches when it is a subset of the request and is
/// produced as-is. A wildcard supported type only matches a concrete request,
/// which is then produced.
fn resolve(formatter: &dyn OutputFormatter, requested: &MediaType) -> Option<MediaType> {
    formatter
        .supported_media_types()
        .iter()
        .find_map(|supported| {
            if supported.has_wildcard() {
                (!requested.has_wildcard() && requested.is_subset_of(supported))
                    .then(|| requested.clone())
            } else {
                supported.is_subset_of(requested).then(|| supported.clone())
            }
        })
}

/// Pick a formatter for `value` from the client's sorted accepted media types.
///
/// Returns `None` when no accepted media type can be satisfied.
#[must_use]
pub fn select_formatter(
    value: &Value,
    sorted_accepted: &[MediaTypeSegment],
    formatters: &FormatterRegistry,
) -> Option<FormatterSelection> {
    sorted_accepted.iter().find_map(|segment| {
        formatters
            .iter()
            .filter(|f| f.can_write_value(value))
            .find_map(|f| {
                resolve(&**f, &segment.media_type).map(|content_type| FormatterSelection {
                    formatter: Arc::clone(f),
                    content_type,
                })
            })
    })
}

/// Negotiate among a fixed list of server-defined content types.
///
/// The first accepted media type that one of `server_types` is a subset of (or a
/// suffix flavour of, so `application/xml` picks `application/problem+xml`) wins.
/// Without any match (or without an `Accept` header) the first server type a
/// formatter can write is used.
#[must_use]
pub fn select_formatter_for_server_types(
    value: &Value,
    sorted_accepted: &[MediaTypeSegment],
    server_types: &[MediaType],
    formatters: &FormatterRegistry,
) -> Option<FormatterSelection> {
    let writer_for = |content_type: &MediaType| {
        formatters
            .iter()
            .filter(|f| f.can_write_value(value))
            .find(|f| resolve(&***f, content_type).is_some())
            .map(|f| FormatterSelection {
                formatter: Arc::clone(f),
                content_type: content_type.clone(),
            })
    };

    sorted_accepted
        .iter()
        .find_map(|segment| {
            server_types
                .iter()
                .filter(|server| {
                    server.is_subset_of(&segment.media_type)
                        || server.has_suffix_of(&segment.media_type)
                })
                .find_map(&writer_for)
        })
        .or_else(|| server_types.iter().find_map(&writer_for))
}
