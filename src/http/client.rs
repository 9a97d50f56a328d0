//! The transport seam: request/response data carriers, the `HttpClient`
//! trait, and the default reqwest-backed implementation.

use std::fmt;
use std::io::Read;

use indexmap::IndexMap;
use reqwest::header::HeaderMap;
pub use reqwest::{Method, StatusCode, Url};

use crate::error::StepError;

/// A request under construction: method, URL, headers, and optional body.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<String>,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// Response headers, keyed as received.
///
/// Value lookups via [`Headers::get`] are case-insensitive on the key, like
/// a canonicalizing header accessor. Presence checks via
/// [`Headers::contains_key`] are exact matches against the key as stored.
#[derive(Debug, Default, Clone)]
pub struct Headers {
    entries: IndexMap<String, Vec<String>>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value for the key, preserving the key's case as given.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.entry(key.into()).or_default().push(value.into());
    }

    /// First value for the key, compared case-insensitively.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(stored, _)| stored.eq_ignore_ascii_case(key))
            .and_then(|(_, values)| values.first())
            .map(String::as_str)
    }

    /// Exact-case presence check against the stored key.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .flat_map(|(key, values)| values.iter().map(move |value| (key.as_str(), value.as_str())))
    }

    fn from_reqwest(map: &HeaderMap) -> Self {
        let mut headers = Self::new();
        for (name, value) in map {
            let value = match value.to_str() {
                Ok(text) => text.to_owned(),
                Err(_) => String::from_utf8_lossy(value.as_bytes()).into_owned(),
            };
            headers.insert(name.as_str(), value);
        }
        headers
    }
}

/// A received response: status and headers, plus the not-yet-read body
/// stream. Dropping the stream closes the underlying connection.
pub struct Response {
    pub status: StatusCode,
    pub headers: Headers,
    stream: Option<Box<dyn Read>>,
}

impl Response {
    pub fn new(status: StatusCode, headers: Headers, stream: Box<dyn Read>) -> Self {
        Self {
            status,
            headers,
            stream: Some(stream),
        }
    }

    /// Take the unread body stream, if it has not been taken yet.
    pub fn take_stream(&mut self) -> Option<Box<dyn Read>> {
        self.stream.take()
    }
}

/// The only network dependency: performs one HTTP exchange. Replaceable for
/// testing or custom transport policy (TLS, proxies, timeouts).
pub trait HttpClient {
    fn perform(&self, request: &Request) -> Result<Response, StepError>;
}

/// Default transport backed by a blocking reqwest client. Deadlines and TLS
/// policy are whatever the wrapped client was built with.
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    pub fn new(client: reqwest::blocking::Client) -> Self {
        Self { client }
    }
}

impl Default for ReqwestClient {
    fn default() -> Self {
        Self::new(reqwest::blocking::Client::new())
    }
}

impl HttpClient for ReqwestClient {
    fn perform(&self, request: &Request) -> Result<Response, StepError> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        let response = builder.send().map_err(|source| StepError::Transport {
            request: request.to_string(),
            source: Box::new(source),
        })?;
        let status = response.status();
        let headers = Headers::from_reqwest(response.headers());
        Ok(Response::new(status, headers, Box::new(response)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_is_case_insensitive() {
        let mut headers = Headers::new();
        headers.insert("Content-Type", "application/json");
        assert_eq!(headers.get("content-type"), Some("application/json"));
        assert_eq!(headers.get("CONTENT-TYPE"), Some("application/json"));
        assert_eq!(headers.get("missing"), None);
    }

    #[test]
    fn presence_check_is_case_sensitive() {
        let mut headers = Headers::new();
        headers.insert("contains", "something");
        assert!(headers.contains_key("contains"));
        assert!(!headers.contains_key("Contains"));
    }

    #[test]
    fn repeated_keys_keep_first_value_for_get() {
        let mut headers = Headers::new();
        headers.insert("set-cookie", "a=1");
        headers.insert("set-cookie", "b=2");
        assert_eq!(headers.get("set-cookie"), Some("a=1"));
        assert_eq!(headers.iter().count(), 2);
    }

    #[test]
    fn request_displays_method_and_url() {
        let request = Request::new(Method::GET, Url::parse("http://example.com/x").unwrap());
        assert_eq!(request.to_string(), "GET http://example.com/x");
    }
}
