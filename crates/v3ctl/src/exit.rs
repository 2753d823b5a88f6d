use std::fmt;

use v3ctl_client::{ClientError, ErrorKind};
use v3ctl_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Exit code for a client error class.
pub fn code_for(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Timeout => TIMEOUT,
        ErrorKind::NotFound | ErrorKind::Io => TRANSPORT_ERROR,
        ErrorKind::Protocol => DATA_INVALID,
        ErrorKind::NoCore
        | ErrorKind::Unexpected
        | ErrorKind::AlreadyRunning
        | ErrorKind::NotRunning => FAILURE,
    }
}

pub fn client_error(context: &str, err: ClientError) -> CliError {
    CliError::new(code_for(err.kind()), format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    let code = match &err {
        TransportError::Timeout { .. } => TIMEOUT,
        TransportError::PathTooLong { .. } => USAGE,
        TransportError::Bind { source, .. } | TransportError::Accept(source)
            if source.kind() == std::io::ErrorKind::PermissionDenied =>
        {
            FAILURE
        }
        TransportError::Bind { .. } | TransportError::Accept(_) => INTERNAL,
        _ => TRANSPORT_ERROR,
    };
    CliError::new(code, format!("{context}: {err}"))
}
