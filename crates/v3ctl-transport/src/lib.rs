//! Local endpoint transport for talking to the v3 core.
//!
//! The core creates one named endpoint per process:
//! - Named pipe `\\.\pipe\v3_core_ipc_<pid>` (Windows)
//! - Unix domain socket `<dir>/v3_core_ipc_<pid>` (Linux/macOS)
//!
//! This is the lowest layer. A [`Channel`] is one open connection to that
//! endpoint; it knows nothing about message contents beyond where a frame
//! ends (see [`FrameBoundary`]).

pub mod channel;
pub mod endpoint;
pub mod error;

#[cfg(windows)]
mod pipe;
#[cfg(unix)]
pub mod uds;

pub use channel::{Channel, ChannelConfig, FrameBoundary};
pub use endpoint::{
    default_namespace, wait_for_endpoint, EndpointName, ENDPOINT_PREFIX, NAMESPACE_ENV,
};
pub use error::{Result, TransportError};

#[cfg(unix)]
pub use uds::EndpointListener;
