use std::process::ExitStatus;
use std::time::Duration;

use tracing::info;
use v3ctl_frame::{StateReport, StatsSnapshot};

use crate::client::IpcClient;
use crate::config::SessionConfig;
use crate::error::{ClientError, Result};
use crate::supervisor::{StopOutcome, Supervisor};
use crate::tracker::StateTracker;

/// What a periodic [`CoreSession::tick`] observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickEvent {
    /// No core, or the state poll failed.
    Idle,
    /// The supervised core exited on its own.
    CoreExited(ExitStatus),
    /// The core reported its connection state.
    State { report: StateReport, changed: bool },
}

/// The single control session: one client, one supervised core, one tracker.
///
/// Every control command goes through here, on one thread.
#[derive(Debug)]
pub struct CoreSession {
    client: IpcClient,
    supervisor: Supervisor,
    tracker: StateTracker,
}

impl CoreSession {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            client: IpcClient::new(&config),
            supervisor: Supervisor::new(&config),
            tracker: StateTracker::new(),
        }
    }

    /// Session for a core this process did not start.
    pub fn attach(config: SessionConfig, pid: u32) -> Self {
        let mut session = Self::new(config);
        session.client.set_core_pid(Some(pid));
        session
    }

    pub fn core_pid(&self) -> Option<u32> {
        self.client.core_pid()
    }

    pub fn is_core_running(&self) -> bool {
        self.supervisor.is_running()
    }

    pub fn is_channel_open(&self) -> bool {
        self.client.is_connected()
    }

    pub fn start_core(&mut self) -> Result<u32> {
        self.supervisor.start(&mut self.client)
    }

    pub fn stop_core(&mut self) -> StopOutcome {
        let outcome = self.supervisor.stop(&mut self.client);
        if outcome != StopOutcome::NotRunning {
            self.tracker.reset();
        }
        outcome
    }

    pub fn close_channel(&mut self) -> bool {
        self.client.disconnect()
    }

    /// Ask the core to bring its tunnel up.
    pub fn connect(&mut self) -> Result<()> {
        self.client.request_connect()?;
        info!("connect requested");
        Ok(())
    }

    /// Ask the core to take its tunnel down.
    pub fn disconnect(&mut self) -> Result<()> {
        self.client.request_disconnect()?;
        info!("disconnect requested");
        Ok(())
    }

    pub fn ping(&mut self) -> Result<Duration> {
        self.client.ping()
    }

    pub fn get_stats(&mut self) -> Result<StatsSnapshot> {
        self.client.get_stats()
    }

    pub fn get_version(&mut self) -> Result<String> {
        self.client.get_version()
    }

    /// Ask an attached core to exit and drop the channel.
    pub fn shutdown_core(&mut self) -> Result<()> {
        if self.client.core_pid().is_none() {
            return Err(ClientError::NoCore);
        }
        let result = self.client.shutdown();
        self.client.disconnect();
        self.tracker.reset();
        result
    }

    /// Query the state now, updating the cache.
    pub fn poll_state(&mut self) -> Result<StateReport> {
        self.tracker
            .refresh(&mut self.client)
            .map(|update| update.report)
    }

    pub fn last_state(&self) -> Option<StateReport> {
        self.tracker.last()
    }

    /// Liveness check, then a state poll if a core is known.
    pub fn tick(&mut self) -> TickEvent {
        if let Some(status) = self.supervisor.poll_liveness(&mut self.client) {
            self.tracker.reset();
            return TickEvent::CoreExited(status);
        }
        if self.client.core_pid().is_none() {
            return TickEvent::Idle;
        }
        match self.tracker.poll(&mut self.client) {
            Some(update) => TickEvent::State {
                report: update.report,
                changed: update.changed,
            },
            None => TickEvent::Idle,
        }
    }
}
