//! HTTP transport implementation using `reqwest`.

use std::time::Duration;

use serde_json::Value;
use url::Url;

use crate::{Method, Request, Transport, TransportError};

/// Default per-request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A [`Transport`] that speaks JSON over HTTP to a fixed base URL.
///
/// Default headers (API key, client info) are attached to every request;
/// per-request headers are appended after them.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
    default_headers: Vec<(String, String)>,
}

impl HttpTransport {
    /// Creates a transport for `base_url` with the default timeout.
    pub fn new(
        base_url: &str,
        default_headers: Vec<(String, String)>,
    ) -> Result<Self, TransportError> {
        Self::with_timeout(base_url, default_headers, DEFAULT_TIMEOUT)
    }

    /// Creates a transport with an explicit per-request timeout.
    pub fn with_timeout(
        base_url: &str,
        default_headers: Vec<(String, String)>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| TransportError::Config(format!("invalid base url: {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Config(e.to_string()))?;
        tracing::debug!(%base_url, "HTTP transport created");
        Ok(Self {
            client,
            base_url,
            default_headers,
        })
    }

    fn url_for(&self, request: &Request) -> Url {
        let mut url = self.base_url.clone();
        let path = format!(
            "{}/{}",
            url.path().trim_end_matches('/'),
            request.path.trim_start_matches('/')
        );
        url.set_path(&path);
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query);
        }
        url
    }
}

impl Transport for HttpTransport {
    async fn request(&self, request: Request) -> Result<Value, TransportError> {
        let url = self.url_for(&request);
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
        };
        tracing::debug!(method = %request.method, path = %request.path, "sending request");

        let mut builder = self.client.request(method, url);
        for (name, value) in self.default_headers.iter().chain(&request.headers) {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await.map_err(classify)?;

        if status >= 400 {
            tracing::debug!(status, path = %request.path, "remote service returned an error");
            return Err(remote_error(status, &bytes));
        }
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes)
            .map_err(|e| TransportError::Decode(e.to_string()))
    }
}

/// Maps a `reqwest` failure onto the transient/fatal classification.
fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else if err.is_decode() || err.is_body() {
        TransportError::Decode(err.to_string())
    } else {
        // Connect, request and redirect failures never reached the service.
        TransportError::Network(err.to_string())
    }
}

/// Builds an [`TransportError::Http`] from an error response body.
///
/// The service is not consistent about field names, so the message is
/// taken from the first of `msg`, `message`, `error_description`, `error`
/// that is present.
fn remote_error(status: u16, body: &[u8]) -> TransportError {
    let parsed: Option<Value> = serde_json::from_slice(body).ok();
    let field = |name: &str| {
        parsed
            .as_ref()
            .and_then(|v| v.get(name))
            .and_then(Value::as_str)
            .map(str::to_owned)
    };
    let message = ["msg", "message", "error_description", "error"]
        .iter()
        .find_map(|name| field(*name))
        .unwrap_or_else(|| format!("HTTP {status}"));
    let error_code = field("error_code").or_else(|| field("code"));
    TransportError::Http {
        status,
        message,
        error_code,
    }
}
