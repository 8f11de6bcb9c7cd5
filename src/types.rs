use std::fmt;

use crate::headers::COOKIE;

/// Longest slice of an error body that is logged or kept in an error.
pub const ERROR_BODY_PREVIEW_CHARS: usize = 500;

/// One fully resolved outbound request.
#[derive(Clone, PartialEq, Eq)]
pub struct RefreshRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl RefreshRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Header pairs with the cookie value masked, for logging.
    pub fn redacted_headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(name, value)| {
            if name.eq_ignore_ascii_case(COOKIE) {
                (name.as_str(), "<redacted>")
            } else {
                (name.as_str(), value.as_str())
            }
        })
    }
}

impl fmt::Debug for RefreshRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshRequest")
            .field("url", &self.url)
            .field("headers", &self.redacted_headers().collect::<Vec<_>>())
            .finish()
    }
}

/// A response as seen by the refresh loop. Logged, then dropped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefreshResponse {
    pub status: u16,
    pub reason: Option<String>,
    /// URL after redirects were followed.
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RefreshResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Status line suffix such as `"403 Forbidden"`.
    pub fn status_line(&self) -> String {
        match &self.reason {
            Some(reason) => format!("{} {reason}", self.status),
            None => self.status.to_string(),
        }
    }

    /// Response headers rendered as a pretty JSON object.
    pub fn headers_json(&self) -> String {
        let map: serde_json::Map<String, serde_json::Value> = self
            .headers
            .iter()
            .map(|(name, value)| (name.clone(), serde_json::Value::String(value.clone())))
            .collect();
        serde_json::to_string_pretty(&map).unwrap_or_default()
    }
}

/// Result of comparing the final URL with the expected success URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UrlCheck {
    Matched,
    Mismatched { expected: String, actual: String },
    /// No expected URL is configured, so success cannot be confirmed.
    Unconfigured,
}

impl UrlCheck {
    pub fn evaluate(expected: Option<&str>, actual: &str) -> Self {
        match expected {
            None => Self::Unconfigured,
            Some(expected) if expected == actual => Self::Matched,
            Some(expected) => Self::Mismatched {
                expected: expected.to_owned(),
                actual: actual.to_owned(),
            },
        }
    }
}

/// Summary of one completed refresh.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefreshOutcome {
    /// Number of attempts including the successful one.
    pub attempts: usize,
    pub status: u16,
    pub final_url: String,
    /// Body length in characters.
    pub content_length: usize,
    pub url_check: UrlCheck,
}

/// Returns at most `max` characters of `text`, never splitting a code point.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
