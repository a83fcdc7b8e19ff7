//! Log tail cursor through the resource client
//!
//! Scripted responses pin exact offsets; the mock backend covers the
//! background tailer against a growing stream.

mod common;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use common::{mock_client, scripted_client, serve_json_once, BASE_URL};
use kerfuffle_dash::host::{ErrorKind, HttpTransport, Method, ResourceClient, TransportError};
use kerfuffle_dash::mock::{FailureConfig, Route};
use kerfuffle_dash::protocol::StreamType;
use kerfuffle_dash::tail::{CursorState, LogTailCursor, LogTailer, LogTarget, TickOutcome};
use serde_json::json;

fn demo_log() -> LogTarget {
    LogTarget::new("demo", "backend", StreamType::Stdout)
}

fn wait_for<F: Fn() -> bool>(condition: F) -> bool {
    let deadline = Instant::now() + Duration::from_secs(3);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[test]
fn test_hello_world_offsets() {
    let (transport, client) = scripted_client();
    transport.push_json(200, json!({"next": 42, "content": "hello"}));
    transport.push_json(200, json!({"next": 47, "content": "world"}));

    let mut cursor = LogTailCursor::new();
    cursor.open(demo_log());

    cursor.tick(&client);
    assert_eq!(cursor.offset(), 42);
    assert_eq!(cursor.buffer(), "hello");

    cursor.tick(&client);
    assert_eq!(cursor.offset(), 47);
    assert_eq!(cursor.buffer(), "helloworld");

    let requests = transport.requests();
    let url = format!("{BASE_URL}/api/v1/application/demo/provision/backend/output/log");
    assert!(requests.iter().all(|r| r.method == Method::Get && r.url == url));
    let froms: Vec<Option<&str>> = requests.iter().map(|r| r.query_param("from")).collect();
    assert_eq!(froms, vec![Some("0"), Some("42")]);
}

#[test]
fn test_failures_leave_state_and_resume() {
    let (transport, client) = scripted_client();
    transport.push_json(200, json!({"next": 5, "content": "start"}));
    transport.push_json(404, json!({"error": "process does not exist"}));
    transport.push(Err(TransportError::Timeout));
    transport.push_json(200, json!({"next": 9, "content": " end"}));

    let mut cursor = LogTailCursor::new();
    cursor.open(demo_log());
    cursor.tick(&client);

    assert_eq!(cursor.tick(&client), Some(TickOutcome::Skipped));
    assert_eq!(cursor.last_error(), Some("process does not exist"));
    assert_eq!(cursor.tick(&client), Some(TickOutcome::Skipped));
    assert_eq!(cursor.consecutive_failures(), 2);
    assert_eq!((cursor.offset(), cursor.buffer()), (5, "start"));

    cursor.tick(&client);
    assert_eq!((cursor.offset(), cursor.buffer()), (9, "start end"));
    assert_eq!(cursor.consecutive_failures(), 0);

    let froms: Vec<String> = transport
        .requests()
        .iter()
        .filter_map(|r| r.query_param("from").map(str::to_string))
        .collect();
    assert_eq!(froms, vec!["0", "5", "5", "5"]);
}

#[test]
fn test_missing_next_is_skipped() {
    let (transport, client) = scripted_client();
    transport.push_json(200, json!({"content": "orphan"}));

    let mut cursor = LogTailCursor::new();
    cursor.open(demo_log());
    assert_eq!(cursor.tick(&client), Some(TickOutcome::Skipped));
    assert_eq!(cursor.buffer(), "");
    assert_eq!(cursor.offset(), 0);
}

#[test]
fn test_rewound_stream_is_skipped() {
    let (transport, client) = scripted_client();
    transport.push_json(200, json!({"next": 10, "content": "0123456789"}));
    transport.push_json(200, json!({"next": 3, "content": "xyz"}));

    let mut cursor = LogTailCursor::new();
    cursor.open(demo_log());
    cursor.tick(&client);
    assert_eq!(cursor.tick(&client), Some(TickOutcome::Skipped));
    assert_eq!(cursor.offset(), 10);
    assert_eq!(cursor.buffer(), "0123456789");
    assert!(cursor.last_error().unwrap_or_default().contains("rewound"));
}

#[test]
fn test_open_twice_resets() {
    let (transport, client) = scripted_client();
    transport.push_json(200, json!({"next": 4, "content": "abcd"}));

    let mut cursor = LogTailCursor::new();
    cursor.open(demo_log());
    cursor.tick(&client);
    assert_eq!(cursor.offset(), 4);

    cursor.open(demo_log());
    assert_eq!(cursor.offset(), 0);
    assert_eq!(cursor.buffer(), "");
    cursor.open(demo_log());
    assert_eq!(cursor.offset(), 0);
    assert_eq!(cursor.buffer(), "");
    assert_eq!(cursor.state(), CursorState::Polling);
}

#[test]
fn test_close_discards_in_flight_response() {
    let (transport, client) = scripted_client();
    transport.push_json(200, json!({"next": 4, "content": "late"}));

    let mut cursor = LogTailCursor::new();
    cursor.open(demo_log());
    let ticket = cursor.begin_fetch().unwrap();
    cursor.close();

    let result = client.fetch_output("demo", "backend", StreamType::Stdout, ticket.from());
    assert_eq!(cursor.complete_fetch(ticket, result), TickOutcome::Stale);
    assert_eq!(cursor.state(), CursorState::Idle);
    assert_eq!(cursor.buffer(), "");
}

#[test]
fn test_tail_against_mock_backend() {
    let (server, client) = mock_client();
    server.add_application("demo", &["backend"]);
    server.append_output("demo", "backend", StreamType::Stdout, "line 1\n");

    let mut cursor = LogTailCursor::new();
    cursor.open(demo_log());
    cursor.tick(&client);
    server.append_output("demo", "backend", StreamType::Stdout, "line 2\n");
    cursor.tick(&client);
    cursor.tick(&client);

    assert_eq!(cursor.buffer(), "line 1\nline 2\n");
    assert_eq!(cursor.offset(), 14);
}

#[test]
fn test_unknown_process_is_remote_error() {
    let (server, client) = mock_client();
    server.add_application("demo", &["backend"]);

    let err = client
        .fetch_output("demo", "frontend", StreamType::Stderr, 0)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Remote);
    assert_eq!(err.message(), "process does not exist");
}

#[test]
fn test_background_tailer_follows_both_streams() {
    let (server, client) = mock_client();
    server.add_application("demo", &["backend"]);

    let mut out = LogTailer::with_interval(client.clone(), Duration::from_millis(10));
    let mut err = LogTailer::with_interval(client, Duration::from_millis(10));
    out.open(demo_log()).unwrap();
    err.open(LogTarget::new("demo", "backend", StreamType::Stderr))
        .unwrap();

    server.append_output("demo", "backend", StreamType::Stdout, "listening on :3000\n");
    server.append_output("demo", "backend", StreamType::Stderr, "deprecated flag\n");

    assert!(wait_for(|| out.snapshot().buffer == "listening on :3000\n"));
    assert!(wait_for(|| err.snapshot().buffer == "deprecated flag\n"));

    out.close();
    err.close();
}

#[test]
fn test_background_tailer_survives_outage() {
    let (server, client) = mock_client();
    server.add_application("demo", &["backend"]);
    server.append_output("demo", "backend", StreamType::Stdout, "before");
    server.inject(Route::Output, FailureConfig::unreachable().with_fail_count(3));

    let mut tailer = LogTailer::with_interval(client, Duration::from_millis(10));
    tailer.open(demo_log()).unwrap();

    assert!(wait_for(|| tailer.snapshot().buffer == "before"));
    server.append_output("demo", "backend", StreamType::Stdout, " after");
    assert!(wait_for(|| tailer.snapshot().buffer == "before after"));
    assert!(tailer.last_error().is_none());
}

#[test]
fn test_large_chunk_over_http_advances() {
    let content = "x".repeat(11 * 1024 * 1024);
    let next = content.len() as u64;
    let base = serve_json_once(json!({"next": next, "content": content}).to_string());
    let client = ResourceClient::new(Arc::new(HttpTransport::default()), base);

    let mut cursor = LogTailCursor::new();
    cursor.open(demo_log());
    assert_eq!(
        cursor.tick(&client),
        Some(TickOutcome::Appended {
            bytes: next as usize,
            offset: next
        })
    );
    assert_eq!(cursor.offset(), next);
    assert!(cursor.last_error().is_none());
}
