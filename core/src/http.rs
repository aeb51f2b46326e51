//! HTTP request and response types exchanged with the pooled transport.
//!
//! # Design
//! Requests are built as plain data first (`HttpRequest`), then handed to the
//! pooled agent. Keeping the build step pure means method validation, query
//! string construction, and header handling are testable without a socket, and
//! an unsupported method is rejected before any connection is touched.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::UnsupportedMethod;

/// Request parameters. Ordered so the generated query string is stable.
pub type Parameters = BTreeMap<String, String>;

/// Request headers, added verbatim.
pub type Headers = BTreeMap<String, String>;

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=UTF-8";

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses a method name case-insensitively.
impl FromStr for HttpMethod {
    type Err = UnsupportedMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("GET") {
            Ok(HttpMethod::Get)
        } else if s.eq_ignore_ascii_case("POST") {
            Ok(HttpMethod::Post)
        } else if s.eq_ignore_ascii_case("DELETE") {
            Ok(HttpMethod::Delete)
        } else {
            Err(UnsupportedMethod(s.to_string()))
        }
    }
}

/// An HTTP request described as plain data, ready for the pooled agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// Only sent for POST. `None` sends an empty body.
    pub body: Option<String>,
    /// Content type of `body`. Ignored when there is no body to send.
    pub content_type: Option<String>,
}

/// Status code and body of a completed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Build the query string appended to GET and DELETE URLs.
///
/// Returns an empty string for missing or empty parameters, otherwise
/// `?k=v&k2=v2` with keys and values form-encoded (space becomes `+`).
pub fn query_string(parameters: Option<&Parameters>) -> String {
    match parameters {
        Some(params) if !params.is_empty() => format!("?{}", form_encode(params)),
        _ => String::new(),
    }
}

/// Form-encode parameters as `k=v&k2=v2`.
pub fn form_encode(parameters: &Parameters) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(parameters)
        .finish()
}

/// Decode a response body into a string without failing.
///
/// Bodies declared as ISO-8859-1 (or `latin1`) map byte for byte onto chars.
/// Everything else is read as UTF-8, with invalid sequences replaced by U+FFFD.
pub fn decode_body(bytes: &[u8], content_type: Option<&str>) -> String {
    let latin1 = content_type
        .and_then(charset)
        .is_some_and(|c| c.eq_ignore_ascii_case("iso-8859-1") || c.eq_ignore_ascii_case("latin1"));
    if latin1 {
        bytes.iter().map(|&b| char::from(b)).collect()
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    }
}

fn charset(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"'))
    })
}

/// Whether the caller already supplied a `Content-Type` header.
pub(crate) fn has_content_type(headers: Option<&Headers>) -> bool {
    headers.is_some_and(|h| h.keys().any(|name| name.eq_ignore_ascii_case("content-type")))
}

/// Flatten an optional header map into request header pairs.
pub(crate) fn header_pairs(headers: Option<&Headers>) -> Vec<(String, String)> {
    headers
        .map(|h| h.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default()
}
