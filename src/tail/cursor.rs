//! Log tail cursor
//!
//! Client-side pointer into one provision output stream. The cursor pulls
//! `GET .../output/{stream}?from={offset}` chunks, appends each chunk's
//! `content` to its buffer and resumes from the chunk's `next`.
//!
//! ## States
//!
//! - **Idle**: no target, nothing buffered.
//! - **Polling**: target set; ticks fetch and append.
//!
//! Every `open`/`close` starts a new epoch. A fetch is split into
//! [`LogTailCursor::begin_fetch`] and [`LogTailCursor::complete_fetch`] so the
//! network call can run without holding the cursor. Completions carrying an
//! old epoch are discarded, which keeps a closed or retargeted cursor from
//! picking up responses that were in flight.
//!
//! ## Failures
//!
//! A failed fetch (unreachable server, error status, undecodable body, or a
//! `next` behind the requested offset) leaves offset and buffer untouched.
//! The next tick retries from the same offset.

use std::fmt;

use kerfuffle_protocol::{OutputChunk, StreamType};
use tracing::{debug, info, warn};

use crate::host::{ClientError, ResourceClient};

/// Which stream a cursor follows.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogTarget {
    pub application: String,
    pub provision: String,
    pub stream: StreamType,
}

impl LogTarget {
    pub fn new(
        application: impl Into<String>,
        provision: impl Into<String>,
        stream: StreamType,
    ) -> Self {
        Self {
            application: application.into(),
            provision: provision.into(),
            stream,
        }
    }
}

impl fmt::Display for LogTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.application, self.provision, self.stream)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    Idle,
    Polling,
}

/// Error from a single tail fetch
#[derive(Debug, thiserror::Error)]
pub enum TailError {
    #[error(transparent)]
    Client(#[from] ClientError),

    /// The server answered with a resume offset behind the requested one.
    #[error("Server rewound stream: requested from {from}, got next {next}")]
    Rewound { from: u64, next: u64 },
}

impl TailError {
    /// Operator-facing message
    pub fn message(&self) -> String {
        match self {
            TailError::Client(e) => e.message(),
            other => other.to_string(),
        }
    }
}

/// Permission to run one fetch, issued by [`LogTailCursor::begin_fetch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    epoch: u64,
    target: LogTarget,
    from: u64,
}

impl FetchTicket {
    pub fn target(&self) -> &LogTarget {
        &self.target
    }

    /// Offset to request.
    pub fn from(&self) -> u64 {
        self.from
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// What a completed fetch did to the cursor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Chunk applied.
    Appended { bytes: usize, offset: u64 },
    /// Fetch failed; state unchanged, retry next tick.
    Skipped,
    /// Cursor was closed or reopened while the fetch was in flight.
    Stale,
}

/// Point-in-time copy of a cursor's visible state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorSnapshot {
    pub target: Option<LogTarget>,
    pub offset: u64,
    pub buffer: String,
}

/// Log tail cursor state
#[derive(Debug, Default)]
pub struct LogTailCursor {
    target: Option<LogTarget>,

    /// Resume offset for the next fetch
    offset: u64,

    /// Every chunk received for the current target, in arrival order
    buffer: String,

    /// Bumped on every open/close
    epoch: u64,

    /// A ticket is outstanding for the current epoch
    in_flight: bool,

    /// Buffer length already handed out by `take_new`
    drained: usize,

    consecutive_failures: u32,
    last_error: Option<String>,
}

impl LogTailCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CursorState {
        if self.target.is_some() {
            CursorState::Polling
        } else {
            CursorState::Idle
        }
    }

    pub fn target(&self) -> Option<&LogTarget> {
        self.target.as_ref()
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_fetch_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Failed fetches since the last successful one.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Start following `target` from offset 0.
    ///
    /// Opening an already open cursor closes it first, whatever the target.
    pub fn open(&mut self, target: LogTarget) {
        if self.target.is_some() {
            self.close();
        }
        info!(tail = %target, "opening log tail");
        self.epoch += 1;
        self.target = Some(target);
    }

    /// Stop following and drop all state. In-flight fetches become stale.
    pub fn close(&mut self) {
        if let Some(target) = self.target.take() {
            info!(tail = %target, offset = self.offset, "closing log tail");
        }
        self.epoch += 1;
        self.offset = 0;
        self.buffer.clear();
        self.drained = 0;
        self.in_flight = false;
        self.consecutive_failures = 0;
        self.last_error = None;
    }

    /// Reserve the next fetch. Returns `None` when idle or when a fetch for
    /// this epoch is still outstanding.
    pub fn begin_fetch(&mut self) -> Option<FetchTicket> {
        if self.in_flight {
            return None;
        }
        let target = self.target.clone()?;
        self.in_flight = true;
        Some(FetchTicket {
            epoch: self.epoch,
            target,
            from: self.offset,
        })
    }

    /// Apply the result of the fetch reserved by `ticket`.
    pub fn complete_fetch(
        &mut self,
        ticket: FetchTicket,
        result: Result<OutputChunk, ClientError>,
    ) -> TickOutcome {
        if ticket.epoch != self.epoch {
            debug!(
                tail = %ticket.target,
                ticket_epoch = ticket.epoch,
                epoch = self.epoch,
                "discarding stale tail response"
            );
            return TickOutcome::Stale;
        }
        self.in_flight = false;

        let result = result.map_err(TailError::from).and_then(|chunk| {
            if chunk.next < ticket.from {
                Err(TailError::Rewound {
                    from: ticket.from,
                    next: chunk.next,
                })
            } else {
                Ok(chunk)
            }
        });

        match result {
            Ok(chunk) => {
                let bytes = chunk.content.len();
                self.offset = chunk.next;
                self.buffer.push_str(&chunk.content);
                self.consecutive_failures = 0;
                self.last_error = None;
                TickOutcome::Appended {
                    bytes,
                    offset: self.offset,
                }
            }
            Err(e) => {
                self.consecutive_failures += 1;
                warn!(
                    tail = %ticket.target,
                    from = ticket.from,
                    failures = self.consecutive_failures,
                    error = %e,
                    "tail fetch failed; retrying next tick"
                );
                self.last_error = Some(e.message());
                TickOutcome::Skipped
            }
        }
    }

    /// Run one fetch in place. Returns `None` when there is nothing to fetch.
    pub fn tick(&mut self, client: &ResourceClient) -> Option<TickOutcome> {
        let ticket = self.begin_fetch()?;
        let result = fetch(client, &ticket);
        Some(self.complete_fetch(ticket, result))
    }

    /// Content appended since the previous call.
    pub fn take_new(&mut self) -> String {
        let fresh = self.buffer[self.drained..].to_string();
        self.drained = self.buffer.len();
        fresh
    }

    pub fn snapshot(&self) -> CursorSnapshot {
        CursorSnapshot {
            target: self.target.clone(),
            offset: self.offset,
            buffer: self.buffer.clone(),
        }
    }
}

/// Issue the HTTP request a ticket stands for.
pub fn fetch(client: &ResourceClient, ticket: &FetchTicket) -> Result<OutputChunk, ClientError> {
    let target = ticket.target();
    client.fetch_output(
        &target.application,
        &target.provision,
        target.stream,
        ticket.from(),
    )
}
