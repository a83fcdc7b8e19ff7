//! Shared helpers for integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};

use kerfuffle_dash::host::{ApiRequest, ApiResponse, ResourceClient, Transport, TransportError};
use kerfuffle_dash::mock::MockServer;
use serde_json::Value;

pub const BASE_URL: &str = "http://dash.test";

/// Transport answering from a fixed queue of responses.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<ApiResponse, TransportError>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_json(&self, status: u16, body: Value) {
        self.push(Ok(ApiResponse::json(status, &body)));
    }

    pub fn push_text(&self, status: u16, body: &str) {
        self.push(Ok(ApiResponse::new(status, body)));
    }

    pub fn push(&self, response: Result<ApiResponse, TransportError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Transport for ScriptedTransport {
    fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::ConnectionFailed("script exhausted".into())))
    }
}

pub fn scripted_client() -> (Arc<ScriptedTransport>, ResourceClient) {
    let transport = ScriptedTransport::new();
    let client = ResourceClient::new(transport.clone(), BASE_URL);
    (transport, client)
}

pub fn mock_client() -> (Arc<MockServer>, ResourceClient) {
    let server = Arc::new(MockServer::new());
    let client = ResourceClient::new(server.clone(), MockServer::BASE_URL);
    (server, client)
}

/// Answer one HTTP request on a local port with `200 OK` and `body`.
/// Returns the base URL to reach it.
pub fn serve_json_once(body: String) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut line = String::new();
        while reader.read_line(&mut line).unwrap() > 0 && line != "\r\n" {
            line.clear();
        }
        write!(
            stream,
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        )
        .unwrap();
        stream.write_all(body.as_bytes()).unwrap();
    });
    format!("http://{addr}")
}
