use tracing::{debug, info};
use v3ctl_frame::StateReport;

use crate::client::IpcClient;
use crate::error::Result;

/// Result of one successful state poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateUpdate {
    pub report: StateReport,
    /// The report differs from the previous one.
    pub changed: bool,
}

/// Caches the last connection state reported by the core.
#[derive(Debug, Default)]
pub struct StateTracker {
    last: Option<StateReport>,
}

impl StateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Query `GET_STATE`. Failures leave the cached value alone and return `None`.
    pub fn poll(&mut self, client: &mut IpcClient) -> Option<StateUpdate> {
        match self.refresh(client) {
            Ok(update) => Some(update),
            Err(err) => {
                debug!(error = %err, "state poll failed");
                None
            }
        }
    }

    /// Query `GET_STATE`, surfacing failures.
    pub fn refresh(&mut self, client: &mut IpcClient) -> Result<StateUpdate> {
        let report = client.get_state()?;
        Ok(self.record(report))
    }

    fn record(&mut self, report: StateReport) -> StateUpdate {
        let changed = self.last != Some(report);
        if changed {
            info!(state = %report, "core state changed");
        }
        self.last = Some(report);
        StateUpdate { report, changed }
    }

    pub fn last(&self) -> Option<StateReport> {
        self.last
    }

    /// Forget the cached state, e.g. after the core exited.
    pub fn reset(&mut self) {
        self.last = None;
    }
}
