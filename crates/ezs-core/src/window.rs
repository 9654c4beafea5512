//! Window identity: logical targets, query parameters and label derivation.
//!
//! A window is identified by a label derived deterministically from its
//! route and parameters, so asking twice for the same logical window yields
//! the same label and the coordinator can hand back the live one.
//!
//! ```text
//! WindowTarget { url: "/breakpoint/pause", params: {} }
//!     + parentWindowId = "main"
//!     -> url   "/breakpoint/pause?parentWindowId=main"
//!     -> label "child_-breakpoint-pause_parentWindowId_main"
//! ```

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Label of the main window (the registry owner).
pub const MAIN_WINDOW_LABEL: &str = "main";

/// Prefix applied to every derived label so none collides with `main`.
pub const LABEL_PREFIX: &str = "child_";

/// Maximum length of the sanitized part of a derived label.
pub const LABEL_MAX_LEN: usize = 50;

/// Query parameter carrying the creator's label into a child window.
pub const PARENT_WINDOW_PARAM: &str = "parentWindowId";

/// Characters `encodeURIComponent` leaves untouched.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// A parameter value; objects and arrays are carried as raw JSON.
pub type ParamValue = serde_json::Value;

// ============================================================================
// Window Label
// ============================================================================

/// Process-level identifier of a window.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowLabel(String);

impl WindowLabel {
    /// Wraps an existing label (e.g. one reported by the native host).
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn main() -> Self {
        Self(MAIN_WINDOW_LABEL.to_string())
    }

    /// Derives a safe label from a resolved window URL.
    ///
    /// Every character outside `[A-Za-z0-9-/:]` becomes `_`, `/` becomes
    /// `-`, the result is cut to [`LABEL_MAX_LEN`] characters and prefixed
    /// with [`LABEL_PREFIX`].
    pub fn from_url(url: &str) -> Self {
        let safe: String = url
            .chars()
            .map(|c| match c {
                '/' => '-',
                c if c.is_ascii_alphanumeric() || c == '-' || c == ':' => c,
                _ => '_',
            })
            .take(LABEL_MAX_LEN)
            .collect();
        Self(format!("{LABEL_PREFIX}{safe}"))
    }

    pub fn is_main(&self) -> bool {
        self.0 == MAIN_WINDOW_LABEL
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WindowLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for WindowLabel {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for WindowLabel {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ============================================================================
// Window Parameters
// ============================================================================

/// Ordered window parameters.
///
/// Keys keep their first insertion position; inserting an existing key
/// replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowParams(Vec<(String, ParamValue)>);

impl WindowParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Encodes the parameters as a query string (without the leading `?`).
    ///
    /// Keys and primitive values are percent-encoded, `null` encodes as an
    /// empty value, objects and arrays are written as compact JSON.
    pub fn to_query(&self) -> String {
        self.0
            .iter()
            .map(|(key, value)| format!("{}={}", encode_component(key), encode_value(value)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

fn encode_component(s: &str) -> String {
    utf8_percent_encode(s, URI_COMPONENT).to_string()
}

fn encode_value(value: &ParamValue) -> String {
    match value {
        ParamValue::Null => String::new(),
        ParamValue::Object(_) | ParamValue::Array(_) => value.to_string(),
        ParamValue::String(s) => encode_component(s),
        other => encode_component(&other.to_string()),
    }
}

// ============================================================================
// Window Target
// ============================================================================

/// Logical window request: a route plus parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowTarget {
    pub url: String,
    #[serde(default)]
    pub params: WindowParams,
}

impl WindowTarget {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            params: WindowParams::new(),
        }
    }

    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(key, value);
        self
    }

    /// Resolves the full URL and label of this target when opened by `caller`.
    ///
    /// The caller's label is injected as [`PARENT_WINDOW_PARAM`] first, so
    /// the same route opened by two different windows gives two labels.
    pub fn resolve(&self, caller: &WindowLabel) -> (WindowLabel, String) {
        let mut params = self.params.clone();
        params.insert(PARENT_WINDOW_PARAM, caller.as_str());
        let url = format!("{}?{}", self.url, params.to_query());
        (WindowLabel::from_url(&url), url)
    }
}

// ============================================================================
// Query Parsing (child side)
// ============================================================================

/// Parameters a window parsed out of its own URL.
///
/// Repeated keys collect every value in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(BTreeMap<String, Vec<String>>);

impl QueryParams {
    /// Parses the query part of `url`; a bare query string works as well.
    pub fn parse(url: &str) -> Self {
        let query = match url.split_once('?') {
            Some((_, q)) => q,
            None if url.contains('=') => url,
            None => "",
        };
        let query = query.split('#').next().unwrap_or_default();

        let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            params
                .entry(decode_component(key).into_owned())
                .or_default()
                .push(decode_component(value).into_owned());
        }
        Self(params)
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn get_all(&self, key: &str) -> &[String] {
        self.0.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    /// Decodes a JSON-valued parameter, `None` when absent or malformed.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key)
            .and_then(|raw| serde_json::from_str(raw).ok())
    }

    /// Label of the window that opened this one.
    pub fn parent_window(&self) -> Option<WindowLabel> {
        self.get(PARENT_WINDOW_PARAM)
            .filter(|s| !s.is_empty())
            .map(WindowLabel::new)
    }

    /// Removes a key, returning its values.
    pub fn remove(&mut self, key: &str) -> Option<Vec<String>> {
        self.0.remove(key)
    }
}

fn decode_component(s: &str) -> Cow<'_, str> {
    if s.contains('+') {
        let spaced = s.replace('+', " ");
        Cow::Owned(percent_decode_str(&spaced).decode_utf8_lossy().into_owned())
    } else {
        percent_decode_str(s).decode_utf8_lossy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_encoding_matches_uri_component_rules() {
        let params = WindowParams::new()
            .with("id", 123)
            .with("name", "John Doe")
            .with("extra", json!({"data": "some data"}));
        assert_eq!(
            params.to_query(),
            "id=123&name=John%20Doe&extra={\"data\":\"some data\"}"
        );
    }

    #[test]
    fn test_null_value_encodes_empty() {
        let params = WindowParams::new().with("key", ParamValue::Null);
        assert_eq!(params.to_query(), "key=");
    }

    #[test]
    fn test_duplicate_key_last_write_wins_in_place() {
        let mut params = WindowParams::new().with("a", 1).with("b", 2);
        params.insert("a", 3);
        assert_eq!(params.len(), 2);
        assert_eq!(params.to_query(), "a=3&b=2");
    }

    #[test]
    fn test_resolve_injects_parent() {
        let target = WindowTarget::new("/breakpoint/pause");
        let (label, url) = target.resolve(&WindowLabel::main());
        assert_eq!(url, "/breakpoint/pause?parentWindowId=main");
        assert_eq!(label.as_str(), "child_-breakpoint-pause_parentWindowId_main");
    }

    #[test]
    fn test_resolve_overrides_caller_supplied_parent() {
        let target = WindowTarget::new("/settings").with_param(PARENT_WINDOW_PARAM, "spoofed");
        let (_, url) = target.resolve(&WindowLabel::main());
        assert_eq!(url, "/settings?parentWindowId=main");
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let target = WindowTarget::new("/breakpoint/edit").with_param("key", "breakpoint_1");
        let caller = WindowLabel::new("child_-breakpoint");
        assert_eq!(target.resolve(&caller), target.resolve(&caller));
    }

    #[test]
    fn test_label_is_sanitized_and_bounded() {
        let label = WindowLabel::from_url("/map.local?x=%20&y=a/b:c");
        assert_eq!(label.as_str(), "child_-map_local_x__20_y_a-b:c");

        let long = format!("/{}", "a".repeat(200));
        let label = WindowLabel::from_url(&long);
        assert_eq!(label.as_str().len(), LABEL_PREFIX.len() + LABEL_MAX_LEN);
        assert!(!label.is_main());
    }

    #[test]
    fn test_parse_query_recovers_parent_and_lists() {
        let params = QueryParams::parse("/search?q=a%20b&tag=x&tag=y&parentWindowId=main");
        assert_eq!(params.get("q"), Some("a b"));
        assert_eq!(params.get_all("tag"), ["x".to_string(), "y".to_string()]);
        assert_eq!(params.parent_window(), Some(WindowLabel::main()));
        assert!(params.get("missing").is_none());
    }

    #[test]
    fn test_parse_query_json_value() {
        let params = QueryParams::parse("/edit?extra={\"n\":5}");
        let value: serde_json::Value = params.get_json("extra").unwrap();
        assert_eq!(value, json!({"n": 5}));
        assert!(params.get_json::<serde_json::Value>("nope").is_none());
    }

    #[test]
    fn test_encoded_query_parses_back() {
        let target = WindowTarget::new("/breakpoint/edit").with_param("key", "bp 1&2");
        let (_, url) = target.resolve(&WindowLabel::new("child_-breakpoint"));
        let params = QueryParams::parse(&url);
        assert_eq!(params.get("key"), Some("bp 1&2"));
        assert_eq!(
            params.parent_window(),
            Some(WindowLabel::new("child_-breakpoint"))
        );
    }
}
