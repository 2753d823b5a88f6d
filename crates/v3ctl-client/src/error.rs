use std::path::PathBuf;

use v3ctl_frame::{opcode_name, FrameError};
use v3ctl_transport::TransportError;

/// Errors surfaced by the control client and supervisor.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// No core process id is known, so there is no endpoint to talk to.
    #[error("core is not running")]
    NoCore,

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// The response did not echo the request's sequence number.
    #[error("response sequence {got} does not match request {expected}")]
    SequenceMismatch { expected: u32, got: u32 },

    /// The core answered with a different response type than the command expects.
    #[error(
        "{} answered with {} (0x{:04X}){}",
        code_name(.command),
        code_name(.got),
        .got,
        detail_suffix(.detail)
    )]
    UnexpectedResponse {
        command: u16,
        got: u16,
        detail: Option<String>,
    },

    /// `start` while a supervised core is alive.
    #[error("core is already running (pid {pid})")]
    AlreadyRunning { pid: u32 },

    /// A supervisor operation needed a running core.
    #[error("no supervised core is running")]
    NotRunning,

    /// None of the candidate executable paths exist.
    #[error("core executable not found (searched: {})", display_paths(.searched))]
    ExecutableNotFound { searched: Vec<PathBuf> },

    /// The OS refused to start the core.
    #[error("failed to spawn {path}: {source}")]
    Spawn {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The client's own install directory could not be determined.
    #[error("cannot determine install directory: {0}")]
    InstallDir(std::io::Error),
}

/// Coarse classification of a [`ClientError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NoCore,
    NotFound,
    Timeout,
    Io,
    Protocol,
    Unexpected,
    AlreadyRunning,
    NotRunning,
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoCore => ErrorKind::NoCore,
            Self::Transport(err) => match err {
                TransportError::Timeout { .. } => ErrorKind::Timeout,
                TransportError::NotFound { .. } => ErrorKind::NotFound,
                TransportError::Connect { source, .. }
                    if source.kind() == std::io::ErrorKind::NotFound =>
                {
                    ErrorKind::NotFound
                }
                _ => ErrorKind::Io,
            },
            Self::Frame(_) | Self::SequenceMismatch { .. } => ErrorKind::Protocol,
            Self::UnexpectedResponse { .. } => ErrorKind::Unexpected,
            Self::AlreadyRunning { .. } => ErrorKind::AlreadyRunning,
            Self::NotRunning => ErrorKind::NotRunning,
            Self::ExecutableNotFound { .. } | Self::InstallDir(_) => ErrorKind::NotFound,
            Self::Spawn { .. } => ErrorKind::Io,
        }
    }

    /// Precondition violations that leave everything as it was.
    pub fn is_benign(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::AlreadyRunning | ErrorKind::NotRunning
        )
    }
}

fn code_name(code: &u16) -> &'static str {
    opcode_name(*code)
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail
        .as_deref()
        .map(|text| format!(": {text}"))
        .unwrap_or_default()
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use v3ctl_frame::opcode::{ERROR, PING};

    use super::*;

    #[test]
    fn unexpected_response_names_opcodes() {
        let err = ClientError::UnexpectedResponse {
            command: PING,
            got: ERROR,
            detail: Some("busy".to_string()),
        };
        assert_eq!(err.to_string(), "PING answered with ERROR (0x8001): busy");
        assert_eq!(err.kind(), ErrorKind::Unexpected);
    }

    #[test]
    fn transport_errors_are_classified() {
        let timeout = ClientError::from(TransportError::Timeout {
            endpoint: "x".to_string(),
            timeout: Duration::from_secs(5),
        });
        assert_eq!(timeout.kind(), ErrorKind::Timeout);

        let closed = ClientError::from(TransportError::Closed);
        assert_eq!(closed.kind(), ErrorKind::Io);

        let missing = ClientError::from(TransportError::NotFound {
            endpoint: "x".to_string(),
        });
        assert_eq!(missing.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn supervisor_preconditions_are_benign() {
        assert!(ClientError::AlreadyRunning { pid: 1 }.is_benign());
        assert!(ClientError::NotRunning.is_benign());
        assert!(!ClientError::NoCore.is_benign());
    }

    #[test]
    fn frame_errors_are_protocol_errors() {
        let err = ClientError::from(FrameError::ShortFrame { len: 3, header: 16 });
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }
}
