//! Browser vs API request classification.

use serde_json::Value;

use crate::negotiation::{FormatterRegistry, parse_accept_header};

/// How the matched endpoint was registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointFlavor {
    /// Returns data for programmatic clients.
    Api,
    /// Returns views for browsers.
    Mvc,
}

/// Who the response is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    Browser,
    Api,
}

impl RequestClass {
    #[must_use]
    pub fn is_api(self) -> bool {
        self == Self::Api
    }

    #[must_use]
    pub fn is_browser(self) -> bool {
        self == Self::Browser
    }
}

/// Request facts the classifier looks at.
#[derive(Debug, Clone, Copy)]
pub struct RequestMeta<'a> {
    /// `None` when no endpoint matched (e.g. an unrouted 404).
    pub endpoint: Option<EndpointFlavor>,
    pub accept: Option<&'a str>,
    pub path: &'a str,
    pub host: Option<&'a str>,
}

/// Endpoint flavor guessed from the URL when routing did not match.
///
/// Any marker contained in the path or host flags the request as API-bound.
/// This is a plain substring match, so `/rapidtest` matches `api`.
#[must_use]
pub fn flavor_from_url(path: &str, host: Option<&str>, markers: &[String]) -> EndpointFlavor {
    let hit = markers
        .iter()
        .filter(|m| !m.is_empty())
        .any(|m| path.contains(m.as_str()) || host.is_some_and(|h| h.contains(m.as_str())));
    if hit {
        EndpointFlavor::Api
    } else {
        EndpointFlavor::Mvc
    }
}

/// Decide whether a request is served to a browser or to an API client.
///
/// API endpoints answer browsers only when the client asks for exactly
/// `text/html`. MVC endpoints answer API clients only when the client asks for
/// exactly one concrete, non-HTML media type that a formatter can produce.
#[must_use]
pub fn classify(
    meta: &RequestMeta<'_>,
    formatters: &FormatterRegistry,
    markers: &[String],
) -> RequestClass {
    let flavor = meta
        .endpoint
        .unwrap_or_else(|| flavor_from_url(meta.path, meta.host, markers));
    let segments = parse_accept_header(meta.accept);

    match (flavor, segments.as_slice()) {
        (EndpointFlavor::Api, [only]) if only.media_type.is_text_html() => RequestClass::Browser,
        (EndpointFlavor::Api, _) => RequestClass::Api,
        (EndpointFlavor::Mvc, [only])
            if !only.media_type.has_wildcard()
                && !only.media_type.is_text_html()
                && formatters.can_satisfy(&Value::Object(serde_json::Map::new()), &only.media_type) =>
        {
            RequestClass::Api
        }
        (EndpointFlavor::Mvc, _) => RequestClass::Browser,
    }
}
