//! Incremental log retrieval
//!
//! Cursor-based tailing of provision output streams.

pub mod cursor;
pub mod poller;

pub use cursor::{
    CursorSnapshot, CursorState, FetchTicket, LogTailCursor, LogTarget, TailError, TickOutcome,
};
pub use poller::{poll_once, LogTailer, DEFAULT_LOG_POLL_INTERVAL};
