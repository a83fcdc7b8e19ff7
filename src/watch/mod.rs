//! Periodic application status refresh
//!
//! Keeps the latest [`ApplicationDocument`] for one application, refreshed
//! on its own poll thread. Independent from any log tailer: separate thread,
//! separate interval, no ordering between the two.

use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use kerfuffle_protocol::ApplicationDocument;
use tracing::{debug, warn};

use crate::host::{ClientError, ResourceClient};
use crate::poll::Poller;

/// Default interval between status refreshes
pub const DEFAULT_STATUS_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Latest known status of the watched application
#[derive(Debug, Clone, Default)]
pub struct StatusSnapshot {
    /// Last successfully fetched document
    pub document: Option<ApplicationDocument>,
    /// Message of the most recent failure, cleared on success
    pub last_error: Option<String>,
    /// When `document` was fetched
    pub refreshed_at: Option<DateTime<Utc>>,
    pub refreshes: u64,
    pub failures: u64,
}

impl StatusSnapshot {
    /// Apply one refresh result. A failure keeps the previous document.
    pub fn record(&mut self, result: Result<ApplicationDocument, ClientError>) {
        match result {
            Ok(document) => {
                self.document = Some(document);
                self.refreshed_at = Some(Utc::now());
                self.last_error = None;
                self.refreshes += 1;
            }
            Err(e) => {
                self.last_error = Some(e.message());
                self.failures += 1;
            }
        }
    }
}

/// Status watcher for a single application
pub struct StatusWatcher {
    application: String,
    state: Arc<Mutex<StatusSnapshot>>,
    poller: Option<Poller>,
}

impl StatusWatcher {
    /// Start refreshing `application` every `interval`, beginning now.
    pub fn start(
        client: ResourceClient,
        application: impl Into<String>,
        interval: Duration,
    ) -> io::Result<Self> {
        let application = application.into();
        let state = Arc::new(Mutex::new(StatusSnapshot::default()));

        let shared = Arc::clone(&state);
        let id = application.clone();
        let poller = Poller::spawn(format!("status-{application}"), interval, move || {
            refresh(&client, &id, &shared);
        })?;

        Ok(Self {
            application,
            state,
            poller: Some(poller),
        })
    }

    pub fn application(&self) -> &str {
        &self.application
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        lock(&self.state).clone()
    }

    pub fn stop(&mut self) {
        if let Some(mut poller) = self.poller.take() {
            poller.stop();
        }
    }
}

impl Drop for StatusWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Fetch the application once and record the result.
pub fn refresh(client: &ResourceClient, application: &str, state: &Mutex<StatusSnapshot>) {
    let result = client.get_application(application);
    match &result {
        Ok(document) => debug!(
            application,
            processes = document.processes.len(),
            "status refreshed"
        ),
        Err(e) => warn!(application, error = %e, "status refresh failed"),
    }
    lock(state).record(result);
}

fn lock(state: &Mutex<StatusSnapshot>) -> MutexGuard<'_, StatusSnapshot> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
