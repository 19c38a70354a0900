//! Media types with wildcard and structured-syntax-suffix matching.

use std::fmt;
use std::str::FromStr;

use mime::Mime;

/// A parsed media type such as `application/problem+json; charset=utf-8`.
///
/// Parsing is delegated to [`mime`]; this type adds the subset relation used by
/// content negotiation.
#[derive(Clone, PartialEq, Eq)]
pub struct MediaType(Mime);

impl MediaType {
    /// Parse `raw`, returning `None` when it is not a valid media type.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        raw.trim().parse().ok()
    }

    #[must_use]
    pub fn type_(&self) -> &str {
        self.0.type_().as_str()
    }

    /// Subtype without the structured syntax suffix.
    #[must_use]
    pub fn subtype(&self) -> &str {
        self.0.subtype().as_str()
    }

    /// Structured syntax suffix (`json` for `application/problem+json`).
    #[must_use]
    pub fn suffix(&self) -> Option<&str> {
        self.0.suffix().map(|s| s.as_str())
    }

    /// `type/subtype[+suffix]` without parameters.
    #[must_use]
    pub fn essence(&self) -> &str {
        self.0.essence_str()
    }

    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.0
            .params()
            .find(|(key, _)| key.as_str().eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// `*/*`
    #[must_use]
    pub fn matches_all_types(&self) -> bool {
        self.type_() == "*"
    }

    /// `type/*` (and `*/*`), without a suffix.
    #[must_use]
    pub fn matches_all_subtypes(&self) -> bool {
        self.subtype() == "*" && self.suffix().is_none()
    }

    /// Any wildcard in type or subtype, including `application/*+json`.
    #[must_use]
    pub fn has_wildcard(&self) -> bool {
        self.matches_all_types() || self.subtype() == "*"
    }

    /// `text/html`, ignoring case and parameters.
    #[must_use]
    pub fn is_text_html(&self) -> bool {
        self.type_().eq_ignore_ascii_case("text")
            && self.subtype().eq_ignore_ascii_case("html")
            && self.suffix().is_none()
    }

    /// `true` when every media type described by `self` is also described by `set`.
    ///
    /// `application/problem+json` is a subset of `application/*+json`,
    /// `application/*`, and `*/*`. Parameters on `set` other than `q` must be
    /// present on `self` with the same value.
    #[must_use]
    pub fn is_subset_of(&self, set: &MediaType) -> bool {
        self.matches_type(set) && self.matches_subtype(set) && self.contains_params_of(set)
    }

    /// `true` when `self` is a structured-syntax flavour of a concrete `requested`
    /// type, e.g. `application/problem+json` for `application/json`.
    #[must_use]
    pub fn has_suffix_of(&self, requested: &MediaType) -> bool {
        !requested.has_wildcard()
            && requested.suffix().is_none()
            && self.type_().eq_ignore_ascii_case(requested.type_())
            && self
                .suffix()
                .is_some_and(|s| s.eq_ignore_ascii_case(requested.subtype()))
    }

    fn matches_type(&self, set: &MediaType) -> bool {
        set.matches_all_types() || set.type_().eq_ignore_ascii_case(self.type_())
    }

    fn matches_subtype(&self, set: &MediaType) -> bool {
        if set.matches_all_subtypes() {
            return true;
        }
        if set.subtype() == "*" {
            // application/*+json
            return match (set.suffix(), self.suffix()) {
                (Some(wanted), Some(actual)) => wanted.eq_ignore_ascii_case(actual),
                _ => false,
            };
        }
        let same_suffix = match (set.suffix(), self.suffix()) {
            (None, None) => true,
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            _ => false,
        };
        same_suffix && set.subtype().eq_ignore_ascii_case(self.subtype())
    }

    fn contains_params_of(&self, set: &MediaType) -> bool {
        set.0
            .params()
            .filter(|(name, _)| name.as_str() != "q")
            .all(|(name, value)| {
                self.param(name.as_str())
                    .is_some_and(|own| own.eq_ignore_ascii_case(value.as_str()))
            })
    }
}

impl FromStr for MediaType {
    type Err = mime::FromStrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<Mime>().map(Self)
    }
}

impl From<Mime> for MediaType {
    fn from(m: Mime) -> Self {
        Self(m)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_ref())
    }
}

impl fmt::Debug for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MediaType({})", self.0)
    }
}
