use std::path::PathBuf;
use std::time::Duration;

use v3ctl_transport::{default_namespace, ChannelConfig, EndpointName};

use crate::error::{ClientError, Result};

/// File name of the core executable.
#[cfg(windows)]
pub const CORE_EXECUTABLE: &str = "v3_core.exe";
/// File name of the core executable.
#[cfg(not(windows))]
pub const CORE_EXECUTABLE: &str = "v3_core";

/// Subdirectory of the install dir searched first for the core.
pub const CORE_SUBDIR: &str = "core";

/// Flag that makes the core log verbosely to its own console.
pub const CORE_VERBOSE_FLAG: &str = "-v";

/// Configuration for a control session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Directory to search for the core. Default: the running binary's directory.
    pub install_dir: Option<PathBuf>,
    /// Subdirectory of `install_dir` searched before `install_dir` itself.
    pub core_subdir: PathBuf,
    /// Core executable file name.
    pub executable_name: String,
    /// Arguments passed to the core.
    pub core_args: Vec<String>,
    /// Endpoint namespace. Default: platform namespace (see `V3_IPC_DIR`).
    pub endpoint_dir: Option<PathBuf>,
    /// Wait for the endpoint on connect. Default: 5 s.
    pub connect_timeout: Duration,
    /// Read/write timeout on the open channel. Default: 5 s.
    pub io_timeout: Option<Duration>,
    /// How long `start` waits for the endpoint to appear. Default: 1 s.
    pub startup_grace: Duration,
    /// Wait for the core to exit after SHUTDOWN. Default: 3 s.
    pub graceful_exit_timeout: Duration,
    /// Wait for the core to exit after it was killed. Default: 1 s.
    pub kill_timeout: Duration,
    /// State/liveness polling period used by control surfaces. Default: 2 s.
    pub poll_interval: Duration,
    /// Reject responses whose sequence differs from the request's.
    pub verify_sequence: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            install_dir: None,
            core_subdir: PathBuf::from(CORE_SUBDIR),
            executable_name: CORE_EXECUTABLE.to_string(),
            core_args: vec![CORE_VERBOSE_FLAG.to_string()],
            endpoint_dir: None,
            connect_timeout: Duration::from_millis(5000),
            io_timeout: Some(Duration::from_millis(5000)),
            startup_grace: Duration::from_millis(1000),
            graceful_exit_timeout: Duration::from_millis(3000),
            kill_timeout: Duration::from_millis(1000),
            poll_interval: Duration::from_millis(2000),
            verify_sequence: false,
        }
    }
}

impl SessionConfig {
    /// Channel settings derived from this config.
    pub fn channel_config(&self) -> ChannelConfig {
        ChannelConfig {
            connect_timeout: self.connect_timeout,
            io_timeout: self.io_timeout,
        }
    }

    /// The endpoint a core with `pid` serves.
    pub fn endpoint_for(&self, pid: u32) -> EndpointName {
        match &self.endpoint_dir {
            Some(dir) => EndpointName::in_namespace(dir, pid),
            None => EndpointName::in_namespace(default_namespace(), pid),
        }
    }

    /// The configured install dir, or the directory of the running binary.
    pub fn resolve_install_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.install_dir {
            return Ok(dir.clone());
        }
        let exe = std::env::current_exe().map_err(ClientError::InstallDir)?;
        exe.parent().map(PathBuf::from).ok_or_else(|| {
            ClientError::InstallDir(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("executable has no parent directory: {}", exe.display()),
            ))
        })
    }

    /// Candidate core paths in search order.
    pub fn executable_candidates(&self) -> Result<Vec<PathBuf>> {
        let dir = self.resolve_install_dir()?;
        Ok(vec![
            dir.join(&self.core_subdir).join(&self.executable_name),
            dir.join(&self.executable_name),
        ])
    }
}
