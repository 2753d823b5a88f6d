//! Control client for the v3 core.
//!
//! - [`IpcClient`]: one-at-a-time request/response over a [`v3ctl_transport::Channel`]
//! - [`Supervisor`]: spawn, stop, and liveness of the core process
//! - [`StateTracker`]: last reported connection state
//! - [`CoreSession`]: the three together, driven from a single control thread

pub mod client;
pub mod config;
pub mod error;
pub mod session;
pub mod supervisor;
pub mod tracker;

pub use client::{IpcClient, Response};
pub use config::{SessionConfig, CORE_EXECUTABLE, CORE_SUBDIR, CORE_VERBOSE_FLAG};
pub use error::{ClientError, ErrorKind, Result};
pub use session::{CoreSession, TickEvent};
pub use supervisor::{StopOutcome, Supervisor};
pub use tracker::{StateTracker, StateUpdate};
