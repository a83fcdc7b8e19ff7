//! Interrupt handling for long-running commands
//!
//! `logs --follow` and `watch` run until interrupted. The first SIGINT/SIGTERM
//! asks them to stop at their next check; a second one exits at once.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Exit code after an interrupt-initiated stop
pub const EXIT_CODE_INTERRUPTED: i32 = 130;

/// Slice used when sleeping while watching for a stop request
const CHECK_SLICE: Duration = Duration::from_millis(50);

/// Shared stop flag
#[derive(Debug, Default)]
pub struct StopSignal {
    stop_requested: AtomicBool,
    force_exit: AtomicBool,
    signal_count: AtomicU8,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    /// Second signal received
    pub fn is_force_exit(&self) -> bool {
        self.force_exit.load(Ordering::SeqCst)
    }

    pub fn signal_count(&self) -> u8 {
        self.signal_count.load(Ordering::SeqCst)
    }

    /// Record a signal and return what to do about it
    pub fn handle_signal(&self) -> SignalAction {
        let count = self.signal_count.fetch_add(1, Ordering::SeqCst);
        match count {
            0 => {
                self.stop_requested.store(true, Ordering::SeqCst);
                SignalAction::Stop
            }
            1 => {
                self.force_exit.store(true, Ordering::SeqCst);
                SignalAction::ForceExit
            }
            _ => SignalAction::Ignore,
        }
    }

    /// Request a stop without a signal
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    /// Sleep for `duration`, waking early on a stop request.
    ///
    /// Returns true if a stop was requested.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_stop_requested() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            std::thread::sleep(CHECK_SLICE.min(deadline - now));
        }
    }
}

/// Action to take after receiving a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    /// First signal: finish the current iteration and stop
    Stop,
    /// Second signal: exit immediately
    ForceExit,
    /// Third+ signal: ignore
    Ignore,
}

/// Installs the process-wide Ctrl-C handler around a [`StopSignal`]
pub struct SignalHandler {
    signal: Arc<StopSignal>,
}

impl SignalHandler {
    pub fn new() -> Self {
        Self::with_signal(Arc::new(StopSignal::new()))
    }

    pub fn with_signal(signal: Arc<StopSignal>) -> Self {
        Self { signal }
    }

    pub fn signal(&self) -> Arc<StopSignal> {
        Arc::clone(&self.signal)
    }

    /// Install the handler for SIGINT and SIGTERM.
    ///
    /// Must be called at most once per process.
    pub fn install(&self) -> Result<(), ctrlc::Error> {
        let signal = Arc::clone(&self.signal);
        ctrlc::set_handler(move || match signal.handle_signal() {
            SignalAction::Stop => {
                tracing::info!("interrupt received, stopping");
            }
            SignalAction::ForceExit => {
                eprintln!("\nReceived second interrupt, exiting immediately...");
                std::process::exit(EXIT_CODE_INTERRUPTED);
            }
            SignalAction::Ignore => {}
        })
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}
