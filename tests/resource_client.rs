//! Resource client against the in-process kerfuffle backend
//!
//! Covers the lifecycle routes, error classification and exit-code mapping.

mod common;

use common::{mock_client, scripted_client, BASE_URL};
use kerfuffle_dash::host::{ClientError, ErrorKind, FailureKind, Method, TransportError};
use kerfuffle_dash::mock::{FailureConfig, Route};
use kerfuffle_dash::protocol::{InstallConfiguration, StatusFlag};
use serde_json::{json, Value};

fn install(repository: &str) -> InstallConfiguration {
    InstallConfiguration::new(repository, "main", ".kerfuffle")
}

// =============================================================================
// Deploy
// =============================================================================

#[test]
fn test_deploy_returns_created_document() {
    let (transport, client) = scripted_client();
    let created = json!({
        "id": "https-example-com-r@main",
        "install_configuration": {
            "repository": "https://example.com/r",
            "branch": "main",
            "bootstrap": ".kerfuffle"
        }
    });
    transport.push_json(201, created.clone());

    let result = client
        .deploy_application(&install("https://example.com/r"))
        .unwrap();
    assert_eq!(result, created);

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, Method::Post);
    assert_eq!(requests[0].url, format!("{BASE_URL}/api/v1/application"));
    assert_eq!(
        requests[0].body,
        Some(json!({
            "repository": "https://example.com/r",
            "branch": "main",
            "bootstrap": ".kerfuffle"
        }))
    );
}

#[test]
fn test_deploy_rejected_carries_server_message() {
    let (transport, client) = scripted_client();
    transport.push_json(400, json!({"error": "invalid repository"}));

    let err = client.deploy_application(&install("not a url")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Remote);
    assert_eq!(err.status(), Some(400));
    assert_eq!(err.message(), "invalid repository");
    assert_eq!(err.failure_kind(), FailureKind::Rejected);
}

#[test]
fn test_deploy_against_mock_backend() {
    let (server, client) = mock_client();

    let created = client
        .deploy_application(&install("https://example.com/r"))
        .unwrap();
    assert_eq!(created["id"], "https-example-com-r@main");

    let apps = client.list_applications().unwrap();
    assert_eq!(apps.len(), 1);
    assert_eq!(
        apps[0].latest_status().map(|s| s.flag),
        Some(StatusFlag::Booting)
    );

    let err = client.deploy_application(&install("example.com/r")).unwrap_err();
    assert_eq!(err.message(), "invalid repository");
    assert!(server.application("example-com-r@main").is_none());
}

// =============================================================================
// Read routes
// =============================================================================

#[test]
fn test_list_empty_server() {
    let (_server, client) = mock_client();
    assert!(client.list_applications().unwrap().is_empty());
}

#[test]
fn test_list_null_body_is_empty() {
    let (transport, client) = scripted_client();
    transport.push_text(200, "null");
    assert!(client.list_applications().unwrap().is_empty());
}

#[test]
fn test_get_application_document() {
    let (server, client) = mock_client();
    server.add_application("demo", &["backend", "worker"]);

    let document = client.get_application("demo").unwrap();
    assert_eq!(document.application.id, "demo");
    assert_eq!(document.alive_processes(), vec!["backend", "worker"]);
    assert_eq!(
        document.application.latest_status().map(|s| s.flag),
        Some(StatusFlag::Running)
    );

    assert_eq!(client.list_processes("demo").unwrap(), vec!["backend", "worker"]);
    let provisions = client.list_provisions("demo").unwrap();
    assert!(provisions.contains_key("backend"));
}

#[test]
fn test_unknown_application_is_not_found() {
    let (_server, client) = mock_client();

    let err = client.get_application("ghost").unwrap_err();
    assert!(matches!(err, ClientError::Remote { status: 404, .. }));
    assert_eq!(err.message(), "application does not exist");
    assert_eq!(err.exit_code(), 30);
}

// =============================================================================
// Lifecycle actions
// =============================================================================

#[test]
fn test_hold_toggles_maintenance() {
    let (server, client) = mock_client();
    server.add_application("demo", &["backend"]);

    client.hold_application("demo").unwrap();
    assert!(server.application("demo").unwrap().maintenance_mode);
    client.hold_application("demo").unwrap();
    assert!(!server.application("demo").unwrap().maintenance_mode);
}

#[test]
fn test_shutdown_then_startup() {
    let (server, client) = mock_client();
    server.add_application("demo", &["backend"]);

    client.shutdown_application("demo").unwrap();
    let document = client.get_application("demo").unwrap();
    assert!(document.alive_processes().is_empty());
    assert_eq!(
        document.application.latest_status().map(|s| s.flag),
        Some(StatusFlag::Shutdown)
    );

    let err = client.shutdown_application("demo").unwrap_err();
    assert_eq!(err.message(), "application is not running");

    client.startup_application("demo").unwrap();
    let document = client.get_application("demo").unwrap();
    assert_eq!(document.alive_processes(), vec!["backend"]);
}

#[test]
fn test_reload_records_status_history() {
    let (server, client) = mock_client();
    server.add_application("demo", &["backend"]);

    let response = client.reload_application("demo").unwrap();
    assert_eq!(response, json!({"error": null}));

    let app = server.application("demo").unwrap();
    let flags: Vec<StatusFlag> = app.statuses.iter().map(|s| s.flag).collect();
    assert_eq!(
        flags,
        vec![StatusFlag::Running, StatusFlag::Booting, StatusFlag::Running]
    );
}

#[test]
fn test_delete_then_missing() {
    let (server, client) = mock_client();
    server.add_application("demo", &["backend"]);

    client.delete_application("demo").unwrap();
    let err = client.delete_application("demo").unwrap_err();
    assert_eq!(err.status(), Some(404));
}

#[test]
fn test_delete_empty_body_is_null() {
    let (transport, client) = scripted_client();
    transport.push_text(200, "");
    assert_eq!(client.delete_application("demo").unwrap(), Value::Null);
}

#[test]
fn test_provision_reload_plain_text() {
    let (server, client) = mock_client();
    server.add_application("demo", &["backend"]);

    let result = client.reload_provision("demo", "backend").unwrap();
    assert_eq!(result, Value::String("ok".into()));

    let err = client.reload_provision("demo", "frontend").unwrap_err();
    assert_eq!(err.failure_kind(), FailureKind::ServerError);
}

// =============================================================================
// Error classification
// =============================================================================

#[test]
fn test_unreachable_is_transport_error() {
    let (server, client) = mock_client();
    server.inject(Route::ListApplications, FailureConfig::unreachable());

    let err = client.list_applications().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(err.failure_kind(), FailureKind::Unreachable);
    assert!(matches!(
        err,
        ClientError::Transport(TransportError::ConnectionFailed(_))
    ));
}

#[test]
fn test_plain_text_error_body() {
    let (transport, client) = scripted_client();
    transport.push_text(502, "upstream went away\n");

    let err = client.get_application("demo").unwrap_err();
    assert_eq!(err.message(), "upstream went away");
    assert_eq!(err.failure_kind(), FailureKind::ServerError);
}

#[test]
fn test_empty_error_body_uses_reason() {
    let (transport, client) = scripted_client();
    transport.push_text(503, "");

    let err = client.get_application("demo").unwrap_err();
    assert_eq!(err.message(), "Service Unavailable");
}

#[test]
fn test_malformed_document_is_decode_error() {
    let (server, client) = mock_client();
    server.add_application("demo", &["backend"]);
    server.inject(Route::GetApplication, FailureConfig::raw_body("<html>"));

    let err = client.get_application("demo").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Decode);
    assert_eq!(err.exit_code(), 60);
}

#[test]
fn test_injected_failure_expires() {
    let (server, client) = mock_client();
    server.add_application("demo", &["backend"]);
    server.inject(
        Route::GetApplication,
        FailureConfig::status(500, "database locked").with_fail_count(1),
    );

    let err = client.get_application("demo").unwrap_err();
    assert_eq!(err.message(), "database locked");
    assert!(client.get_application("demo").is_ok());
}
