use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use v3ctl_transport::{wait_for_endpoint, NAMESPACE_ENV};

use crate::client::IpcClient;
use crate::config::SessionConfig;
use crate::error::{ClientError, Result};

/// Interval between non-blocking exit checks.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// A core process started by this supervisor.
#[derive(Debug)]
struct CoreProcess {
    pid: u32,
    child: Child,
}

/// How [`Supervisor::stop`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Nothing was running.
    NotRunning,
    /// The core exited on its own within the graceful window.
    Graceful(ExitStatus),
    /// The core was killed. `None` if it still had not been reaped.
    Forced(Option<ExitStatus>),
}

/// Starts, stops, and watches the core process.
///
/// Lifecycle: not running, then running after [`Supervisor::start`], back to
/// not running after [`Supervisor::stop`] or when [`Supervisor::poll_liveness`]
/// sees the process gone.
#[derive(Debug)]
pub struct Supervisor {
    config: SessionConfig,
    core: Option<CoreProcess>,
}

impl Supervisor {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            config: config.clone(),
            core: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.core.is_some()
    }

    pub fn pid(&self) -> Option<u32> {
        self.core.as_ref().map(|core| core.pid)
    }

    /// First existing candidate from [`SessionConfig::executable_candidates`].
    pub fn resolve_executable(&self) -> Result<PathBuf> {
        let candidates = self.config.executable_candidates()?;
        match candidates.iter().find(|path| path.is_file()) {
            Some(path) => Ok(path.clone()),
            None => Err(ClientError::ExecutableNotFound {
                searched: candidates,
            }),
        }
    }

    /// Spawn the core and point `client` at it.
    ///
    /// Returns once the endpoint exists or the startup grace has passed,
    /// whichever comes first.
    pub fn start(&mut self, client: &mut IpcClient) -> Result<u32> {
        if let Some(core) = &self.core {
            return Err(ClientError::AlreadyRunning { pid: core.pid });
        }

        let executable = self.resolve_executable()?;
        let install_dir = self.config.resolve_install_dir()?;

        let mut command = Command::new(&executable);
        command
            .args(&self.config.core_args)
            .current_dir(&install_dir)
            .stdin(Stdio::null());
        if let Some(dir) = &self.config.endpoint_dir {
            command.env(NAMESPACE_ENV, dir);
        }
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            command.creation_flags(windows_sys::Win32::System::Threading::CREATE_NEW_CONSOLE);
        }

        let child = command.spawn().map_err(|source| ClientError::Spawn {
            path: executable.clone(),
            source,
        })?;
        let pid = child.id();
        info!(pid, executable = %executable.display(), "core started");

        self.core = Some(CoreProcess { pid, child });
        client.set_core_pid(Some(pid));

        let endpoint = self.config.endpoint_for(pid);
        if wait_for_endpoint(&endpoint, self.config.startup_grace) {
            debug!(%endpoint, "core endpoint is up");
        } else {
            warn!(
                %endpoint,
                grace_ms = self.config.startup_grace.as_millis() as u64,
                "core endpoint did not appear within startup grace"
            );
        }
        Ok(pid)
    }

    /// Stop the core: SHUTDOWN if connected, wait, then kill.
    ///
    /// Afterwards no core is tracked, whatever path was taken.
    pub fn stop(&mut self, client: &mut IpcClient) -> StopOutcome {
        let Some(mut core) = self.core.take() else {
            info!("core is not running");
            return StopOutcome::NotRunning;
        };

        if client.is_connected() {
            debug!(pid = core.pid, "sending shutdown");
            if let Err(err) = client.shutdown() {
                debug!(pid = core.pid, error = %err, "shutdown not acknowledged");
            }
        }
        client.disconnect();

        let outcome = match wait_for_exit(&mut core.child, self.config.graceful_exit_timeout) {
            Some(status) => {
                info!(pid = core.pid, %status, "core exited");
                StopOutcome::Graceful(status)
            }
            None => {
                warn!(pid = core.pid, "core did not exit in time; terminating");
                if let Err(err) = core.child.kill() {
                    warn!(pid = core.pid, error = %err, "kill failed");
                }
                let status = wait_for_exit(&mut core.child, self.config.kill_timeout);
                info!(pid = core.pid, reaped = status.is_some(), "core terminated");
                StopOutcome::Forced(status)
            }
        };

        client.set_core_pid(None);
        outcome
    }

    /// Check, without blocking, whether the core has exited on its own.
    ///
    /// On exit the core is forgotten and `client` is disconnected.
    pub fn poll_liveness(&mut self, client: &mut IpcClient) -> Option<ExitStatus> {
        let core = self.core.as_mut()?;
        match core.child.try_wait() {
            Ok(Some(status)) => {
                warn!(pid = core.pid, %status, "core exited unexpectedly");
                self.core = None;
                client.disconnect();
                client.set_core_pid(None);
                Some(status)
            }
            Ok(None) => None,
            Err(err) => {
                warn!(pid = core.pid, error = %err, "could not query core status");
                None
            }
        }
    }
}

/// Wait up to `timeout` for `child` to exit.
fn wait_for_exit(child: &mut Child, timeout: Duration) -> Option<ExitStatus> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Some(status),
            Ok(None) => {}
            Err(err) => {
                warn!(error = %err, "could not query child status");
                return None;
            }
        }
        let now = Instant::now();
        if now >= deadline {
            return None;
        }
        std::thread::sleep(EXIT_POLL_INTERVAL.min(deadline - now));
    }
}
