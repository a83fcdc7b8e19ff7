//! Mock Server Implementation
//!
//! In-process stand-in for the kerfuffle REST API. Implements [`Transport`]
//! directly, so a [`ResourceClient`](crate::host::ResourceClient) can talk to
//! it without a socket. Output streams are append-only strings addressed by
//! byte offset.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;

use chrono::Utc;
use kerfuffle_protocol::{
    AppStatus, Application, ApplicationDocument, InstallConfiguration, Meta, OutputChunk,
    ProcessState, Provision, StatusFlag, StreamType, DEFAULT_BOOTSTRAP, DEFAULT_BRANCH,
};
use serde_json::{json, Value};

use crate::host::transport::{ApiRequest, ApiResponse, Method, Transport, TransportError};
use crate::path::LifecycleAction;

use super::failure::{FailureConfig, FailureInjector, FailureMode, Route};

#[derive(Debug, Clone)]
struct MockApplication {
    application: Application,
    provisions: BTreeMap<String, Provision>,
    processes: BTreeMap<String, ProcessState>,
    outputs: HashMap<(String, StreamType), String>,
    last_commit: String,
}

impl MockApplication {
    fn new(application: Application) -> Self {
        Self {
            application,
            provisions: BTreeMap::new(),
            processes: BTreeMap::new(),
            outputs: HashMap::new(),
            last_commit: String::new(),
        }
    }

    fn document(&self) -> ApplicationDocument {
        ApplicationDocument {
            application: self.application.clone(),
            provisions: self.provisions.clone(),
            proxies: BTreeMap::new(),
            cfs: BTreeMap::new(),
            processes: self.processes.clone(),
            last_commit: self.last_commit.clone(),
        }
    }

    fn push_status(&mut self, flag: StatusFlag, reason: &str) {
        self.application.statuses.insert(
            0,
            AppStatus {
                flag,
                reason: reason.to_string(),
                at: Utc::now(),
            },
        );
    }

    fn any_alive(&self) -> bool {
        self.processes.values().any(|p| p.alive)
    }

    fn set_alive(&mut self, alive: bool) {
        for (id, process) in self.processes.iter_mut() {
            process.alive = alive;
            process.status = Some(if alive {
                format!("running: {id}")
            } else {
                "exit status 0".to_string()
            });
        }
    }
}

/// A parsed API call
#[derive(Debug)]
enum Call<'a> {
    List,
    Deploy,
    Get(&'a str),
    Delete(&'a str),
    Action(&'a str, LifecycleAction),
    Processes(&'a str),
    Provisions(&'a str),
    ProvisionReload(&'a str, &'a str),
    Output(&'a str, &'a str, &'a str),
}

impl Call<'_> {
    fn route(&self) -> Route {
        match self {
            Call::List => Route::ListApplications,
            Call::Deploy => Route::Deploy,
            Call::Get(_) => Route::GetApplication,
            Call::Delete(_) => Route::Delete,
            Call::Action(..) => Route::Action,
            Call::Processes(_) => Route::Processes,
            Call::Provisions(_) => Route::Provisions,
            Call::ProvisionReload(..) => Route::ProvisionReload,
            Call::Output(..) => Route::Output,
        }
    }
}

/// Configurable mock server for testing
#[derive(Debug, Default)]
pub struct MockServer {
    applications: Mutex<BTreeMap<String, MockApplication>>,
    failures: Mutex<FailureInjector>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl MockServer {
    /// Base URL clients should use to address this server.
    pub const BASE_URL: &'static str = "http://kerfuffle.test";

    pub fn new() -> Self {
        Self::default()
    }

    // === Public API for test configuration ===

    /// Register a running application with the given provisions.
    pub fn add_application(&self, id: &str, provisions: &[&str]) {
        let mut app = MockApplication::new(Application {
            id: id.to_string(),
            install_configuration: Some(InstallConfiguration::new(
                format!("https://example.com/{id}"),
                DEFAULT_BRANCH,
                DEFAULT_BOOTSTRAP,
            )),
            meta: Some(Meta {
                name: id.to_string(),
            }),
            statuses: Vec::new(),
            created: Some(Utc::now()),
            maintenance_mode: false,
            root_path: format!("/srv/kerfuffle/{id}"),
        });
        for provision in provisions {
            app.provisions.insert(
                provision.to_string(),
                Provision {
                    id: provision.to_string(),
                    ..Provision::default()
                },
            );
            app.processes.insert(provision.to_string(), ProcessState::default());
        }
        app.set_alive(true);
        app.push_status(StatusFlag::Running, "all provisions started");
        app.last_commit = format!("commit 0000000 ({id})");
        lock(&self.applications).insert(id.to_string(), app);
    }

    pub fn remove_application(&self, id: &str) -> bool {
        lock(&self.applications).remove(id).is_some()
    }

    pub fn application(&self, id: &str) -> Option<Application> {
        lock(&self.applications)
            .get(id)
            .map(|app| app.application.clone())
    }

    /// Append to a provision's output stream.
    pub fn append_output(&self, id: &str, provision: &str, stream: StreamType, text: &str) {
        if let Some(app) = lock(&self.applications).get_mut(id) {
            app.outputs
                .entry((provision.to_string(), stream))
                .or_default()
                .push_str(text);
        }
    }

    /// Full output of a stream so far.
    pub fn output(&self, id: &str, provision: &str, stream: StreamType) -> String {
        lock(&self.applications)
            .get(id)
            .and_then(|app| app.outputs.get(&(provision.to_string(), stream)).cloned())
            .unwrap_or_default()
    }

    /// Inject a failure for a route
    pub fn inject(&self, route: Route, config: FailureConfig) {
        lock(&self.failures).inject(route, config);
    }

    /// Fail the next `count` output fetches with `status`.
    pub fn fail_next_outputs(&self, count: u32, status: u16, message: &str) {
        self.inject(
            Route::Output,
            FailureConfig::status(status, message).with_fail_count(count),
        );
    }

    pub fn clear_failures(&self) {
        lock(&self.failures).clear();
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<ApiRequest> {
        lock(&self.requests).clone()
    }

    // === Request handling ===

    fn parse<'a>(method: Method, segments: &[&'a str]) -> Option<Call<'a>> {
        let call = match (method, segments) {
            (Method::Get, ["application"]) => Call::List,
            (Method::Post, ["application"]) => Call::Deploy,
            (Method::Get, ["application", id]) => Call::Get(*id),
            (Method::Delete, ["application", id]) => Call::Delete(*id),
            (Method::Patch, ["application", id, action]) => {
                Call::Action(*id, action.parse().ok()?)
            }
            (Method::Get, ["application", id, "processes"]) => Call::Processes(*id),
            (Method::Get, ["application", id, "provisions"]) => Call::Provisions(*id),
            (Method::Get, ["application", id, "provision", provision, "reload"]) => {
                Call::ProvisionReload(*id, *provision)
            }
            (Method::Get, ["application", id, "provision", provision, "output", stream]) => {
                Call::Output(*id, *provision, *stream)
            }
            _ => return None,
        };
        Some(call)
    }

    fn dispatch(&self, call: Call<'_>, request: &ApiRequest) -> ApiResponse {
        let mut apps = lock(&self.applications);
        let path = request.url.trim_start_matches(Self::BASE_URL);

        match call {
            Call::List => {
                let list: Vec<&Application> = apps.values().map(|app| &app.application).collect();
                ApiResponse::json(200, &json!(list))
            }
            Call::Deploy => self.deploy(&mut apps, request),
            Call::Get(id) => match apps.get(id) {
                Some(app) => ApiResponse::json(200, &json!(app.document())),
                None => not_found(id, path),
            },
            Call::Delete(id) => match apps.remove(id) {
                Some(_) => ApiResponse::json(200, &json!({"id": id, "deleted": true})),
                None => not_found(id, path),
            },
            Call::Action(id, action) => match apps.get_mut(id) {
                Some(app) => apply_action(app, action),
                None => not_found(id, path),
            },
            Call::Processes(id) => match apps.get(id) {
                Some(app) => {
                    let ids: Vec<&String> = app.processes.keys().collect();
                    ApiResponse::json(200, &json!(ids))
                }
                None => not_found(id, path),
            },
            Call::Provisions(id) => match apps.get(id) {
                Some(app) => ApiResponse::json(200, &json!(app.provisions)),
                None => not_found(id, path),
            },
            Call::ProvisionReload(id, provision) => match apps.get_mut(id) {
                Some(app) => match app.processes.get_mut(provision) {
                    Some(process) => {
                        process.alive = true;
                        process.status = Some(format!("running: {provision}"));
                        ApiResponse::new(200, "ok")
                    }
                    None => error_response(500, "provision does not exist"),
                },
                None => not_found(id, path),
            },
            Call::Output(id, provision, stream) => match apps.get(id) {
                Some(app) => read_output(app, provision, stream, request),
                None => not_found(id, path),
            },
        }
    }

    fn deploy(
        &self,
        apps: &mut BTreeMap<String, MockApplication>,
        request: &ApiRequest,
    ) -> ApiResponse {
        let Some(body) = &request.body else {
            return error_response(400, "missing install configuration");
        };
        let mut config: InstallConfiguration = match serde_json::from_value(body.clone()) {
            Ok(config) => config,
            Err(e) => return error_response(400, &e.to_string()),
        };
        if !is_repository_url(&config.repository) {
            return error_response(400, "invalid repository");
        }
        if config.branch.is_empty() {
            config.branch = DEFAULT_BRANCH.to_string();
        }
        if config.bootstrap.is_empty() {
            config.bootstrap = DEFAULT_BOOTSTRAP.to_string();
        }

        let id = format!("{}@{}", slug(&config.repository), config.branch);
        if apps.contains_key(&id) {
            return error_response(409, "application already exists");
        }

        let mut app = MockApplication::new(Application {
            id: id.clone(),
            install_configuration: Some(config),
            meta: None,
            statuses: Vec::new(),
            created: Some(Utc::now()),
            maintenance_mode: false,
            root_path: format!("/srv/kerfuffle/{id}"),
        });
        app.push_status(StatusFlag::Booting, "installed from git");
        let response = ApiResponse::json(201, &json!(app.application));
        apps.insert(id, app);
        response
    }
}

impl Transport for MockServer {
    fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        lock(&self.requests).push(request.clone());

        let prefix = format!("{}/api/v1/", Self::BASE_URL);
        let segments: Vec<&str> = match request.url.strip_prefix(&prefix) {
            Some(rest) => rest.split('/').collect(),
            None => return Ok(ApiResponse::new(404, "404 page not found")),
        };
        let Some(call) = Self::parse(request.method, &segments) else {
            return Ok(ApiResponse::new(404, "404 page not found"));
        };

        let failure = lock(&self.failures).check(call.route());
        if let Some(failure) = failure {
            if let Some(delay) = failure.delay {
                thread::sleep(delay);
            }
            match failure.mode {
                Some(FailureMode::Status { status, message }) => {
                    return Ok(error_response(status, &message));
                }
                Some(FailureMode::Unreachable) => {
                    return Err(TransportError::ConnectionFailed(
                        "connection refused".to_string(),
                    ));
                }
                Some(FailureMode::RawBody(body)) => return Ok(ApiResponse::new(200, body)),
                None => {}
            }
        }

        Ok(self.dispatch(call, request))
    }
}

fn apply_action(app: &mut MockApplication, action: LifecycleAction) -> ApiResponse {
    match action {
        LifecycleAction::Hold => {
            app.application.maintenance_mode = !app.application.maintenance_mode;
        }
        LifecycleAction::Shutdown => {
            if !app.any_alive() {
                return error_response(400, "application is not running");
            }
            app.set_alive(false);
            app.push_status(StatusFlag::Shutdown, "shutdown requested");
        }
        LifecycleAction::Startup => {
            if app.any_alive() {
                return error_response(400, "application is already running");
            }
            app.set_alive(true);
            app.push_status(StatusFlag::Running, "startup requested");
        }
        LifecycleAction::Reload => {
            app.push_status(StatusFlag::Booting, "reload requested");
            app.set_alive(true);
            app.push_status(StatusFlag::Running, "reloaded");
        }
    }
    ApiResponse::json(200, &json!({"error": Value::Null}))
}

fn read_output(
    app: &MockApplication,
    provision: &str,
    stream: &str,
    request: &ApiRequest,
) -> ApiResponse {
    if !app.processes.contains_key(provision) {
        return error_response(404, "process does not exist");
    }
    let stream = match stream {
        "log" => StreamType::Stdout,
        "err" => StreamType::Stderr,
        _ => return error_response(404, "buffer does not exist"),
    };
    let from: usize = match request.query_param("from").map(str::parse::<usize>).transpose() {
        Ok(from) => from.unwrap_or(0),
        Err(_) => return error_response(400, "invalid offset"),
    };

    let buffer = app
        .outputs
        .get(&(provision.to_string(), stream))
        .map(String::as_str)
        .unwrap_or("");
    match buffer.get(from..) {
        Some(content) => ApiResponse::json(
            200,
            &json!(OutputChunk::new(buffer.len() as u64, content)),
        ),
        None => error_response(400, "offset beyond end of stream"),
    }
}

fn not_found(id: &str, path: &str) -> ApiResponse {
    ApiResponse::json(
        404,
        &json!({
            "error": "application does not exist",
            "meta": {"code": 404, "msg": id, "path": path}
        }),
    )
}

fn error_response(status: u16, message: &str) -> ApiResponse {
    ApiResponse::json(status, &json!({ "error": message }))
}

fn is_repository_url(repository: &str) -> bool {
    let rest = repository
        .strip_prefix("https://")
        .or_else(|| repository.strip_prefix("http://"));
    matches!(rest, Some(rest) if rest.contains('/') && !rest.starts_with('/'))
}

/// URL-safe id fragment derived from a repository URL.
fn slug(repository: &str) -> String {
    let mut out = String::with_capacity(repository.len());
    for c in repository.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_string()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
