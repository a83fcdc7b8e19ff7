//! Resource Client
//!
//! Performs the application lifecycle operations over a [`Transport`],
//! addressing every resource through [`ApiPaths`]. Each call issues exactly
//! one request and never retries.
//!
//! Failures keep the distinction the operator cares about:
//! - [`ClientError::Transport`]: no response was obtained
//! - [`ClientError::Remote`]: the server answered with a non-2xx status
//! - [`ClientError::Decode`]: the server answered 2xx with an unusable body
//! - [`ClientError::Encode`]: the request body could not be built; nothing was sent

use std::collections::BTreeMap;
use std::sync::Arc;

use kerfuffle_protocol::{
    ApiErrorBody, Application, ApplicationDocument, InstallConfiguration, OutputChunk, Provision,
    StreamType,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::path::{ApiPaths, LifecycleAction, PathNode};

use super::transport::{ApiRequest, ApiResponse, Method, Transport, TransportError};

/// Resource client errors
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Server rejected request ({status}): {message}")]
    Remote { status: u16, message: String },

    #[error("Unexpected response body: {0}")]
    Decode(String),

    #[error("Could not encode request body: {0}")]
    Encode(String),
}

/// Coarse error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request could not complete.
    Transport,
    /// The server responded and rejected the request.
    Remote,
    /// The server responded with a body we could not decode.
    Decode,
    /// The request was never sent.
    Encode,
}

/// Failure kind for exit code mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Server unreachable (exit code 20)
    Unreachable = 20,
    /// Unknown application or provision (exit code 30)
    NotFound = 30,
    /// Request rejected by the server (exit code 40)
    Rejected = 40,
    /// Server-side failure (exit code 50)
    ServerError = 50,
    /// Response not understood (exit code 60)
    Protocol = 60,
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Transport(_) => ErrorKind::Transport,
            ClientError::Remote { .. } => ErrorKind::Remote,
            ClientError::Decode(_) => ErrorKind::Decode,
            ClientError::Encode(_) => ErrorKind::Encode,
        }
    }

    /// HTTP status for remote errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Operator-facing message: the server's `error` text for remote errors.
    pub fn message(&self) -> String {
        match self {
            ClientError::Remote { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Map error to failure kind for exit code
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            ClientError::Transport(_) => FailureKind::Unreachable,
            ClientError::Remote { status: 404, .. } => FailureKind::NotFound,
            ClientError::Remote { status, .. } if *status >= 500 => FailureKind::ServerError,
            ClientError::Remote { .. } => FailureKind::Rejected,
            ClientError::Decode(_) | ClientError::Encode(_) => FailureKind::Protocol,
        }
    }

    /// Get exit code for this error
    pub fn exit_code(&self) -> i32 {
        self.failure_kind() as i32
    }
}

/// Result type for resource client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Client for the application resources of one kerfuffle server
#[derive(Clone)]
pub struct ResourceClient {
    transport: Arc<dyn Transport>,
    paths: ApiPaths,
}

impl ResourceClient {
    /// Create a client for the server at `base_url`.
    pub fn new(transport: Arc<dyn Transport>, base_url: impl AsRef<str>) -> Self {
        Self {
            transport,
            paths: ApiPaths::new(base_url),
        }
    }

    pub fn paths(&self) -> &ApiPaths {
        &self.paths
    }

    /// `GET /application`
    pub fn list_applications(&self) -> ClientResult<Vec<Application>> {
        let body = self.send(Method::Get, self.paths.applications(), None, &[])?;
        // An empty manager serialises its application slice as `null`.
        decode::<Option<Vec<Application>>>(&body).map(Option::unwrap_or_default)
    }

    /// `GET /application/{id}`
    pub fn get_application(&self, id: &str) -> ClientResult<ApplicationDocument> {
        let body = self.send(Method::Get, self.paths.application(id), None, &[])?;
        decode(&body)
    }

    /// `POST /application`
    pub fn deploy_application(&self, config: &InstallConfiguration) -> ClientResult<Value> {
        let payload = encode(config)?;
        let body = self.send(Method::Post, self.paths.applications(), Some(payload), &[])?;
        Ok(decode_value(&body))
    }

    /// `PATCH /application/{id}/{action}`
    pub fn apply_action(&self, id: &str, action: LifecycleAction) -> ClientResult<Value> {
        let body = self.send(Method::Patch, self.paths.action(id, action), None, &[])?;
        Ok(decode_value(&body))
    }

    /// Toggle maintenance mode.
    pub fn hold_application(&self, id: &str) -> ClientResult<Value> {
        self.apply_action(id, LifecycleAction::Hold)
    }

    pub fn reload_application(&self, id: &str) -> ClientResult<Value> {
        self.apply_action(id, LifecycleAction::Reload)
    }

    pub fn shutdown_application(&self, id: &str) -> ClientResult<Value> {
        self.apply_action(id, LifecycleAction::Shutdown)
    }

    pub fn startup_application(&self, id: &str) -> ClientResult<Value> {
        self.apply_action(id, LifecycleAction::Startup)
    }

    /// `DELETE /application/{id}`
    pub fn delete_application(&self, id: &str) -> ClientResult<Value> {
        let body = self.send(Method::Delete, self.paths.application(id), None, &[])?;
        Ok(decode_value(&body))
    }

    /// `GET /application/{id}/processes`
    pub fn list_processes(&self, id: &str) -> ClientResult<Vec<String>> {
        let body = self.send(Method::Get, self.paths.processes(id), None, &[])?;
        decode::<Option<Vec<String>>>(&body).map(Option::unwrap_or_default)
    }

    /// `GET /application/{id}/provisions`
    pub fn list_provisions(&self, id: &str) -> ClientResult<BTreeMap<String, Provision>> {
        let body = self.send(Method::Get, self.paths.provisions(id), None, &[])?;
        decode::<Option<BTreeMap<String, Provision>>>(&body).map(Option::unwrap_or_default)
    }

    /// `GET /application/{id}/provision/{provision}/reload`
    pub fn reload_provision(&self, id: &str, provision: &str) -> ClientResult<Value> {
        let body = self.send(
            Method::Get,
            self.paths.provision_reload(id, provision),
            None,
            &[],
        )?;
        Ok(decode_value(&body))
    }

    /// `GET /application/{id}/provision/{provision}/output/{stream}?from={from}`
    pub fn fetch_output(
        &self,
        id: &str,
        provision: &str,
        stream: StreamType,
        from: u64,
    ) -> ClientResult<OutputChunk> {
        let body = self.send(
            Method::Get,
            self.paths.output(id, provision, stream),
            None,
            &[("from", from.to_string())],
        )?;
        decode(&body)
    }

    fn send(
        &self,
        method: Method,
        path: PathNode,
        body: Option<Value>,
        query: &[(&str, String)],
    ) -> ClientResult<String> {
        let mut request = ApiRequest::new(method, path.to_string());
        for (key, value) in query {
            request = request.with_query(*key, value);
        }
        if let Some(body) = body {
            request = request.with_body(body);
        }

        let response = self.transport.execute(&request)?;
        debug!(
            method = %method,
            url = %request.url,
            status = response.status,
            "response received"
        );

        if !response.is_success() {
            return Err(remote_error(&response));
        }
        Ok(response.body)
    }
}

/// Build a [`ClientError::Remote`] from a non-2xx response.
fn remote_error(response: &ApiResponse) -> ClientError {
    let message = match ApiErrorBody::parse(&response.body) {
        Some(payload) => payload.error,
        None if !response.body.trim().is_empty() => response.body.trim().to_string(),
        None => status_reason(response.status).to_string(),
    };
    ClientError::Remote {
        status: response.status,
        message,
    }
}

fn encode<T: Serialize>(value: &T) -> ClientResult<Value> {
    serde_json::to_value(value).map_err(|e| ClientError::Encode(e.to_string()))
}

fn decode<T: DeserializeOwned>(body: &str) -> ClientResult<T> {
    serde_json::from_str(body).map_err(|e| ClientError::Decode(e.to_string()))
}

/// Decode an untyped result. Empty bodies become `null` and plain-text
/// bodies (e.g. `ok`) become JSON strings.
fn decode_value(body: &str) -> Value {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_string()))
}

fn status_reason(status: u16) -> &'static str {
    match status {
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        409 => "Conflict",
        422 => "Unprocessable Entity",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "Request failed",
    }
}
