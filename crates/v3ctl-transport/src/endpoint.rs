use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::debug;

/// File-name prefix of every core endpoint; the decimal pid follows it.
pub const ENDPOINT_PREFIX: &str = "v3_core_ipc_";

/// Environment variable overriding the Unix socket directory.
pub const NAMESPACE_ENV: &str = "V3_IPC_DIR";

/// The name of the endpoint a core process serves, derived from its pid.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointName {
    path: PathBuf,
    pid: u32,
}

impl EndpointName {
    /// Endpoint for `pid` in the platform default namespace.
    pub fn for_pid(pid: u32) -> Self {
        Self::in_namespace(default_namespace(), pid)
    }

    /// Endpoint for `pid` under an explicit namespace directory.
    pub fn in_namespace(namespace: impl AsRef<Path>, pid: u32) -> Self {
        Self {
            path: namespace
                .as_ref()
                .join(format!("{ENDPOINT_PREFIX}{pid}")),
            pid,
        }
    }

    /// Process id the endpoint belongs to.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Full path of the endpoint (pipe name or socket path).
    pub fn as_path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for EndpointName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// Namespace the core creates its endpoint in.
///
/// Windows always uses the named-pipe namespace. On Unix the directory comes
/// from `V3_IPC_DIR`, falling back to the system temp dir.
pub fn default_namespace() -> PathBuf {
    #[cfg(windows)]
    {
        PathBuf::from(r"\\.\pipe")
    }

    #[cfg(not(windows))]
    {
        match std::env::var_os(NAMESPACE_ENV) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => std::env::temp_dir(),
        }
    }
}

/// Poll until `endpoint` exists or `budget` runs out.
///
/// Returns `true` as soon as the endpoint is there. This does not connect, so
/// the server's single accept slot is left untouched.
pub fn wait_for_endpoint(endpoint: &EndpointName, budget: Duration) -> bool {
    let mut delay = RetryDelay::new(budget);
    loop {
        if endpoint_present(endpoint, delay.remaining()) {
            debug!(%endpoint, "endpoint is available");
            return true;
        }
        if !delay.wait() {
            debug!(%endpoint, ?budget, "endpoint did not appear");
            return false;
        }
    }
}

#[cfg(unix)]
fn endpoint_present(endpoint: &EndpointName, _remaining: Duration) -> bool {
    use std::os::unix::fs::FileTypeExt;

    std::fs::symlink_metadata(endpoint.as_path())
        .map(|meta| meta.file_type().is_socket())
        .unwrap_or(false)
}

#[cfg(windows)]
fn endpoint_present(endpoint: &EndpointName, remaining: Duration) -> bool {
    crate::pipe::wait_available(endpoint.as_path(), remaining).unwrap_or(false)
}

/// Doubling sleep between attempts, bounded by an overall deadline.
pub(crate) struct RetryDelay {
    next: Duration,
    deadline: Instant,
}

impl RetryDelay {
    const INITIAL: Duration = Duration::from_millis(10);
    const MAX: Duration = Duration::from_millis(200);

    pub(crate) fn new(budget: Duration) -> Self {
        Self {
            next: Self::INITIAL,
            deadline: Instant::now() + budget,
        }
    }

    pub(crate) fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Sleep before the next attempt. Returns `false` once the budget is spent.
    pub(crate) fn wait(&mut self) -> bool {
        let remaining = self.remaining();
        if remaining.is_zero() {
            return false;
        }
        std::thread::sleep(self.next.min(remaining));
        self.next = (self.next * 2).min(Self::MAX);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_name_embeds_decimal_pid() {
        let name = EndpointName::in_namespace("/run/v3", 4242);
        assert_eq!(name.pid(), 4242);
        assert_eq!(name.as_path(), Path::new("/run/v3/v3_core_ipc_4242"));
        assert!(name.to_string().ends_with("v3_core_ipc_4242"));
    }

    #[cfg(windows)]
    #[test]
    fn default_namespace_is_pipe_root() {
        let name = EndpointName::for_pid(7);
        assert_eq!(name.to_string(), r"\\.\pipe\v3_core_ipc_7");
    }

    #[test]
    fn wait_for_missing_endpoint_respects_budget() {
        let dir = std::env::temp_dir().join(format!("v3ctl-missing-{}", std::process::id()));
        let name = EndpointName::in_namespace(&dir, 1);

        let start = Instant::now();
        assert!(!wait_for_endpoint(&name, Duration::from_millis(120)));
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(120));
        assert!(elapsed < Duration::from_secs(2));
    }

    #[test]
    fn retry_delay_stops_at_deadline() {
        let mut delay = RetryDelay::new(Duration::from_millis(30));
        let mut attempts = 0;
        while delay.wait() {
            attempts += 1;
            assert!(attempts < 100, "retry loop must terminate");
        }
        assert!(delay.remaining().is_zero());
    }
}
