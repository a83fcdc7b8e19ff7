//! Background log tailing
//!
//! [`LogTailer`] owns a [`LogTailCursor`] and drives it from a [`Poller`]
//! thread: one fetch as soon as a target is opened, then one per interval.
//! The HTTP call runs outside the cursor lock; its completion is applied
//! under the lock and dropped if the cursor was closed or retargeted in the
//! meantime.

use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::host::ResourceClient;
use crate::poll::Poller;

use super::cursor::{fetch, CursorSnapshot, LogTailCursor, LogTarget, TickOutcome};

/// Default interval between log fetches
pub const DEFAULT_LOG_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Log tailer: a cursor plus the thread that polls it
pub struct LogTailer {
    client: ResourceClient,
    cursor: Arc<Mutex<LogTailCursor>>,
    interval: Duration,
    poller: Option<Poller>,
}

impl LogTailer {
    pub fn new(client: ResourceClient) -> Self {
        Self::with_interval(client, DEFAULT_LOG_POLL_INTERVAL)
    }

    pub fn with_interval(client: ResourceClient, interval: Duration) -> Self {
        Self {
            client,
            cursor: Arc::new(Mutex::new(LogTailCursor::new())),
            interval,
            poller: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Follow `target` from offset 0, closing any previous target first.
    pub fn open(&mut self, target: LogTarget) -> io::Result<()> {
        self.close();
        let name = format!("tail-{}-{}", target.provision, target.stream);
        lock(&self.cursor).open(target);

        let client = self.client.clone();
        let cursor = Arc::clone(&self.cursor);
        let poller = Poller::spawn(name, self.interval, move || {
            poll_once(&client, &cursor);
        });
        match poller {
            Ok(poller) => {
                self.poller = Some(poller);
                Ok(())
            }
            Err(e) => {
                lock(&self.cursor).close();
                Err(e)
            }
        }
    }

    /// Stop polling and drop the cursor's state.
    pub fn close(&mut self) {
        // Close first so a response still in flight lands on a new epoch.
        lock(&self.cursor).close();
        if let Some(mut poller) = self.poller.take() {
            poller.stop();
        }
    }

    pub fn is_open(&self) -> bool {
        self.poller.is_some()
    }

    pub fn target(&self) -> Option<LogTarget> {
        lock(&self.cursor).target().cloned()
    }

    pub fn snapshot(&self) -> CursorSnapshot {
        lock(&self.cursor).snapshot()
    }

    /// Content appended since the previous call.
    pub fn take_new(&self) -> String {
        lock(&self.cursor).take_new()
    }

    /// Failure message of the most recent tick, if it failed.
    pub fn last_error(&self) -> Option<String> {
        lock(&self.cursor).last_error().map(str::to_string)
    }
}

impl Drop for LogTailer {
    fn drop(&mut self) {
        self.close();
    }
}

/// One poll tick against a shared cursor.
///
/// Returns `None` when the cursor is idle or a fetch is already running.
pub fn poll_once(client: &ResourceClient, cursor: &Mutex<LogTailCursor>) -> Option<TickOutcome> {
    let ticket = lock(cursor).begin_fetch()?;
    let result = fetch(client, &ticket);
    Some(lock(cursor).complete_fetch(ticket, result))
}

fn lock(cursor: &Mutex<LogTailCursor>) -> MutexGuard<'_, LogTailCursor> {
    // Cursor state is consistent after every method; a panic elsewhere does
    // not invalidate it.
    cursor.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockServer;
    use kerfuffle_protocol::StreamType;
    use std::thread;
    use std::time::Instant;

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

    fn server_with_app() -> Arc<MockServer> {
        let server = Arc::new(MockServer::new());
        server.add_application("demo", &["backend"]);
        server
    }

    #[test]
    fn test_open_fetches_immediately() {
        let server = server_with_app();
        server.append_output("demo", "backend", StreamType::Stdout, "booted\n");
        let client = ResourceClient::new(server.clone(), MockServer::BASE_URL);

        let mut tailer = LogTailer::with_interval(client, Duration::from_secs(60));
        tailer
            .open(LogTarget::new("demo", "backend", StreamType::Stdout))
            .unwrap();

        assert!(wait_for(|| tailer.snapshot().buffer == "booted\n"));
        assert_eq!(tailer.snapshot().offset, 7);
        tailer.close();
    }

    #[test]
    fn test_follows_appended_output() {
        let server = server_with_app();
        let client = ResourceClient::new(server.clone(), MockServer::BASE_URL);

        let mut tailer = LogTailer::with_interval(client, Duration::from_millis(10));
        tailer
            .open(LogTarget::new("demo", "backend", StreamType::Stdout))
            .unwrap();

        server.append_output("demo", "backend", StreamType::Stdout, "one\n");
        assert!(wait_for(|| tailer.snapshot().buffer == "one\n"));
        server.append_output("demo", "backend", StreamType::Stdout, "two\n");
        assert!(wait_for(|| tailer.snapshot().buffer == "one\ntwo\n"));

        assert_eq!(tailer.take_new(), "one\ntwo\n");
        assert_eq!(tailer.take_new(), "");
    }

    #[test]
    fn test_close_drops_state() {
        let server = server_with_app();
        server.append_output("demo", "backend", StreamType::Stdout, "data");
        let client = ResourceClient::new(server.clone(), MockServer::BASE_URL);

        let mut tailer = LogTailer::with_interval(client, Duration::from_millis(10));
        tailer
            .open(LogTarget::new("demo", "backend", StreamType::Stdout))
            .unwrap();
        assert!(wait_for(|| !tailer.snapshot().buffer.is_empty()));

        tailer.close();
        assert!(!tailer.is_open());
        assert!(tailer.target().is_none());

        // Output keeps growing server-side; nothing reaches the closed cursor.
        server.append_output("demo", "backend", StreamType::Stdout, "more");
        thread::sleep(Duration::from_millis(50));
        let snapshot = tailer.snapshot();
        assert_eq!(snapshot.buffer, "");
        assert_eq!(snapshot.offset, 0);
    }

    #[test]
    fn test_retarget_isolates_streams() {
        let server = server_with_app();
        server.append_output("demo", "backend", StreamType::Stdout, "out-line");
        server.append_output("demo", "backend", StreamType::Stderr, "err-line");
        let client = ResourceClient::new(server.clone(), MockServer::BASE_URL);

        let mut tailer = LogTailer::with_interval(client, Duration::from_millis(10));
        tailer
            .open(LogTarget::new("demo", "backend", StreamType::Stdout))
            .unwrap();
        assert!(wait_for(|| tailer.snapshot().buffer == "out-line"));

        tailer
            .open(LogTarget::new("demo", "backend", StreamType::Stderr))
            .unwrap();
        assert!(wait_for(|| tailer.snapshot().buffer == "err-line"));
        thread::sleep(Duration::from_millis(30));
        assert_eq!(tailer.snapshot().buffer, "err-line");
    }

    #[test]
    fn test_transient_failures_recover() {
        let server = server_with_app();
        server.append_output("demo", "backend", StreamType::Stdout, "steady");
        server.fail_next_outputs(2, 503, "restarting");
        let client = ResourceClient::new(server.clone(), MockServer::BASE_URL);

        let mut tailer = LogTailer::with_interval(client, Duration::from_millis(10));
        tailer
            .open(LogTarget::new("demo", "backend", StreamType::Stdout))
            .unwrap();

        assert!(wait_for(|| tailer.snapshot().buffer == "steady"));
        assert!(tailer.last_error().is_none());
    }

    #[test]
    fn test_poll_once_idle_cursor() {
        let server = server_with_app();
        let client = ResourceClient::new(server, MockServer::BASE_URL);
        let cursor = Mutex::new(LogTailCursor::new());
        assert!(poll_once(&client, &cursor).is_none());
    }
}
