//! `Accept` header parsing (RFC 7231 section 5.3.2).

use super::media_type::MediaType;

/// One media range of an `Accept` header together with its quality.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaTypeSegment {
    pub media_type: MediaType,
    /// Quality in `[0, 1]`, 1.0 when the segment carries no `q` parameter.
    pub quality: f64,
}

impl MediaTypeSegment {
    #[must_use]
    pub fn matches_all_types(&self) -> bool {
        self.media_type.matches_all_types()
    }

    #[must_use]
    pub fn matches_all_subtypes(&self) -> bool {
        self.media_type.matches_all_subtypes()
    }
}

/// Parse a raw `Accept` header into segments sorted by descending quality.
///
/// Never fails: a missing or empty header yields an empty list, and segments that
/// do not parse are skipped. A segment whose `q` is not a valid qvalue (a number
/// in `[0, 1]` with at most three decimals) counts as unparseable. The sort is
/// stable, so segments of equal quality keep header order.
#[must_use]
pub fn parse_accept_header(raw: Option<&str>) -> Vec<MediaTypeSegment> {
    let Some(raw) = raw else {
        return Vec::new();
    };

    let mut segments: Vec<MediaTypeSegment> = split_outside_quotes(raw)
        .into_iter()
        .filter_map(parse_segment)
        .collect();
    segments.sort_by(|a, b| b.quality.total_cmp(&a.quality));
    segments
}

/// Media types the client accepts, or none when a catch-all should be ignored.
///
/// Browsers send `*/*` alongside their preferred types. Unless
/// `respect_browser_accept_header` is set, a header containing `*/*` is treated
/// as if no preference was expressed.
#[must_use]
pub fn acceptable_media_types(
    raw: Option<&str>,
    respect_browser_accept_header: bool,
) -> Vec<MediaTypeSegment> {
    let segments = parse_accept_header(raw);
    if !respect_browser_accept_header && segments.iter().any(MediaTypeSegment::matches_all_types)
    {
        return Vec::new();
    }
    segments
}

fn split_outside_quotes(raw: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;

    for (idx, ch) in raw.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                parts.push(&raw[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(&raw[start..]);
    parts
}

fn parse_segment(raw: &str) -> Option<MediaTypeSegment> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let media_type = MediaType::parse(raw)?;
    let quality = match media_type.param("q") {
        Some(q) => parse_quality(q)?,
        None => 1.0,
    };
    Some(MediaTypeSegment {
        media_type,
        quality,
    })
}

/// qvalue = ( "0" [ "." 0*3DIGIT ] ) / ( "1" [ "." 0*3("0") ] )
fn parse_quality(raw: &str) -> Option<f64> {
    let (whole, fraction) = match raw.split_once('.') {
        Some((w, f)) => (w, f),
        None => (raw, ""),
    };
    if fraction.len() > 3 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match whole {
        "0" => raw.parse().ok(),
        "1" if fraction.bytes().all(|b| b == b'0') => Some(1.0),
        _ => None,
    }
}
