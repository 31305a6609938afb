//! Transport abstraction layer for Authforge.
//!
//! Provides the [`Transport`] trait: the single seam through which the
//! session layer and the auth client talk to the remote authentication
//! service. A transport takes a [`Request`] (method, path, headers, query,
//! JSON body) and returns the decoded JSON response or a classified
//! [`TransportError`].
//!
//! # Feature Flags
//!
//! - `http` (default): HTTP transport via `reqwest`

mod error;
#[cfg(feature = "http")]
mod http;

pub use error::TransportError;
#[cfg(feature = "http")]
pub use http::HttpTransport;

use std::fmt;
use std::future::Future;

use serde_json::Value;

/// HTTP method of a [`Request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
        };
        f.write_str(s)
    }
}

/// A request against the remote authentication service.
///
/// `path` is relative to the transport's base URL (e.g. `/token`).
/// Built with the consuming helpers:
///
/// ```rust
/// use authforge_transport::{Method, Request};
/// use serde_json::json;
///
/// let req = Request::post("/token")
///     .query("grant_type", "refresh_token")
///     .json(json!({ "refresh_token": "r-1" }));
///
/// assert_eq!(req.method, Method::Post);
/// assert_eq!(req.query_value("grant_type"), Some("refresh_token"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl Request {
    /// Creates a request with no headers, query or body.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Vec::new(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    /// Appends a header.
    pub fn header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Appends an `Authorization: Bearer <token>` header.
    pub fn bearer(self, token: &str) -> Self {
        self.header("Authorization", format!("Bearer {token}"))
    }

    /// Appends a query parameter.
    pub fn query(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Sets the JSON body.
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Returns the first value of the named query parameter.
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the first value of the named header (case-insensitive).
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Sends requests to the remote authentication service.
///
/// Implementations own everything that is "wire": base URL, default
/// headers, connection pooling, timeouts and status-code handling. They
/// must classify failures (see [`TransportError::is_transient`]) because
/// the refresh scheduler retries only transient ones.
///
/// A successful response with an empty body is returned as
/// [`Value::Null`].
///
/// The returned future must be `Send`: refresh attempts run on spawned
/// Tokio tasks.
pub trait Transport: Send + Sync + 'static {
    /// Sends `request` and returns the decoded JSON body.
    fn request(
        &self,
        request: Request,
    ) -> impl Future<Output = Result<Value, TransportError>> + Send;
}

impl<T: Transport> Transport for std::sync::Arc<T> {
    fn request(
        &self,
        request: Request,
    ) -> impl Future<Output = Result<Value, TransportError>> + Send {
        (**self).request(request)
    }
}
