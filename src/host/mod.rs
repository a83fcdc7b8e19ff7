//! Host-Side Components
//!
//! The resource client and the transport it talks through.

pub mod client;
pub mod transport;

pub use client::{ClientError, ClientResult, ErrorKind, FailureKind, ResourceClient};
pub use transport::{
    ApiRequest, ApiResponse, HttpConfig, HttpTransport, Method, Transport, TransportError,
};
