//! Mock kerfuffle backend
//!
//! An in-process [`Transport`](crate::host::Transport) that answers the
//! kerfuffle REST routes from memory. Used by unit and integration tests to
//! drive the resource client, the log tailer and the status watcher without
//! a network.
//!
//! # Routes
//!
//! - `GET /api/v1/application`: list applications
//! - `POST /api/v1/application`: install from an install configuration
//! - `GET|DELETE /api/v1/application/{id}`
//! - `PATCH /api/v1/application/{id}/{hold|reload|shutdown|startup}`
//! - `GET /api/v1/application/{id}/processes` and `/provisions`
//! - `GET /api/v1/application/{id}/provision/{p}/reload`
//! - `GET /api/v1/application/{id}/provision/{p}/output/{log|err}?from=N`

mod failure;
mod server;

pub use failure::{FailureConfig, FailureInjector, FailureMode, Route};
pub use server::MockServer;
