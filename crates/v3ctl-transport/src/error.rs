use std::path::PathBuf;
use std::time::Duration;

/// Errors that can occur on the core endpoint transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to create the endpoint (server side).
    #[error("failed to bind to {path}: {source}")]
    Bind {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The endpoint exists but connecting to it failed.
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// The endpoint did not become available within the connect budget.
    #[error("timed out after {timeout:?} waiting for {endpoint}")]
    Timeout { endpoint: String, timeout: Duration },

    /// The endpoint namespace itself does not exist.
    #[error("endpoint not found: {endpoint}")]
    NotFound { endpoint: String },

    /// An I/O error occurred on an open channel.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The socket path is too long for the platform.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },

    /// The remote end closed the channel.
    #[error("channel closed by peer")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TransportError>;
