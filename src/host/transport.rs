//! Transport Layer for the Resource Client
//!
//! Abstracts the HTTP exchange for testability. Provides:
//! - Transport trait: execute one request, return status and body
//! - HttpTransport: real HTTP over a `ureq` agent
//! - The in-process `MockServer` in `crate::mock` implements the same trait
//!
//! A non-2xx status is a *response*, not a transport failure. Only requests
//! that never produced a response surface as [`TransportError`].

use std::error::Error as _;
use std::fmt;
use std::io::{self, Read};
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

/// HTTP verbs used by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single API request.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Absolute URL without query string.
    pub url: String,
    pub query: Vec<(String, String)>,
    /// JSON body, if any.
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Value of a query parameter, if present.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Status code and raw body of a completed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// JSON response with the given status.
    pub fn json(status: u16, body: &Value) -> Self {
        Self::new(status, body.to_string())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport trait for API communication
pub trait Transport: Send + Sync {
    /// Execute a request and return the response, whatever its status.
    fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError>;
}

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out")]
    Timeout,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// HTTP transport configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Timeout for establishing the connection
    pub connect_timeout: Duration,
    /// Overall timeout for one request, including reading the body
    pub request_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Real HTTP transport
pub struct HttpTransport {
    agent: ureq::Agent,
}

impl HttpTransport {
    pub fn new(config: HttpConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(config.connect_timeout)
            .timeout(config.request_timeout)
            .build();
        Self { agent }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(HttpConfig::default())
    }
}

impl Transport for HttpTransport {
    fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let mut call = self
            .agent
            .request(request.method.as_str(), &request.url)
            .set("Accept", "application/json");
        for (key, value) in &request.query {
            call = call.query(key, value);
        }

        debug!(method = %request.method, url = %request.url, "sending request");

        let result = match &request.body {
            Some(body) => {
                let payload = serde_json::to_string(body)?;
                call.set("Content-Type", "application/json")
                    .send_string(&payload)
            }
            None => call.call(),
        };

        match result {
            Ok(response) => {
                let status = response.status();
                let body = read_body(response)?;
                Ok(ApiResponse { status, body })
            }
            // ureq reports 4xx/5xx as errors; for us they are answers.
            Err(ureq::Error::Status(status, response)) => {
                let body = read_body(response).unwrap_or_default();
                Ok(ApiResponse { status, body })
            }
            Err(ureq::Error::Transport(transport)) => Err(map_transport_error(&transport)),
        }
    }
}

/// Read the whole body. `Response::into_string` caps bodies at 10 MB, which
/// a log fetch from offset 0 can exceed.
fn read_body(response: ureq::Response) -> io::Result<String> {
    let mut bytes = Vec::new();
    response.into_reader().read_to_end(&mut bytes)?;
    Ok(match String::from_utf8(bytes) {
        Ok(body) => body,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}

fn map_transport_error(transport: &ureq::Transport) -> TransportError {
    let timed_out = transport
        .source()
        .and_then(|source| source.downcast_ref::<io::Error>())
        .map(|e| matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock))
        .unwrap_or(false);
    if timed_out {
        TransportError::Timeout
    } else {
        TransportError::ConnectionFailed(transport.to_string())
    }
}
