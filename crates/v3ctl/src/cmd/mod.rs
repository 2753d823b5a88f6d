use clap::{Args, Subcommand};
use std::path::PathBuf;

use v3ctl_client::{SessionConfig, CORE_VERBOSE_FLAG};

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod console;
pub mod duration;
pub mod oneshot;
pub mod stub_core;
pub mod version;

use self::duration::parse_duration;
use self::oneshot::CoreAction;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Interactive control console: start, stop, and query the core.
    Console(ConsoleArgs),
    /// PING a running core and report the round-trip time.
    Ping(CoreArgs),
    /// Query a running core's tunnel state.
    State(CoreArgs),
    /// Fetch a running core's statistics.
    Stats(CoreArgs),
    /// Query a running core's version string.
    CoreVersion(CoreArgs),
    /// Ask a running core to bring its tunnel up.
    Connect(CoreArgs),
    /// Ask a running core to take its tunnel down.
    Disconnect(CoreArgs),
    /// Ask a running core to exit.
    Shutdown(CoreArgs),
    /// Serve the control protocol as a minimal stand-in core.
    StubCore(StubCoreArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Console(args) => console::run(args, format),
        Command::Ping(args) => oneshot::run(CoreAction::Ping, args, format),
        Command::State(args) => oneshot::run(CoreAction::State, args, format),
        Command::Stats(args) => oneshot::run(CoreAction::Stats, args, format),
        Command::CoreVersion(args) => oneshot::run(CoreAction::Version, args, format),
        Command::Connect(args) => oneshot::run(CoreAction::Connect, args, format),
        Command::Disconnect(args) => oneshot::run(CoreAction::Disconnect, args, format),
        Command::Shutdown(args) => oneshot::run(CoreAction::Shutdown, args, format),
        Command::StubCore(args) => stub_core::run(args),
        Command::Version(args) => version::run(args),
    }
}

/// Endpoint and timing options shared by every command that talks to a core.
#[derive(Args, Debug)]
pub struct SessionArgs {
    /// Directory holding the core endpoint sockets (Unix).
    #[arg(long, value_name = "DIR", env = "V3_IPC_DIR")]
    pub ipc_dir: Option<PathBuf>,
    /// How long to wait for the core endpoint (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub connect_timeout: String,
    /// Read/write timeout on the control channel.
    #[arg(long, default_value = "5s")]
    pub io_timeout: String,
    /// Reject responses whose sequence number does not match the request.
    #[arg(long)]
    pub verify_sequence: bool,
}

impl SessionArgs {
    pub fn to_config(&self) -> CliResult<SessionConfig> {
        Ok(SessionConfig {
            endpoint_dir: self.ipc_dir.clone(),
            connect_timeout: parse_duration(&self.connect_timeout)?,
            io_timeout: Some(parse_duration(&self.io_timeout)?),
            verify_sequence: self.verify_sequence,
            ..SessionConfig::default()
        })
    }
}

#[derive(Args, Debug)]
pub struct ConsoleArgs {
    #[command(flatten)]
    pub session: SessionArgs,
    /// Directory containing the core executable (default: this binary's directory).
    #[arg(long, value_name = "DIR", env = "V3CTL_INSTALL_DIR")]
    pub install_dir: Option<PathBuf>,
    /// Argument passed to the core; repeat for several (default: -v).
    #[arg(
        long = "core-arg",
        value_name = "ARG",
        allow_hyphen_values = true,
        num_args = 1
    )]
    pub core_args: Vec<String>,
    /// State and liveness polling period.
    #[arg(long, default_value = "2s")]
    pub poll_interval: String,
    /// Wait for the core endpoint after start before giving up on it.
    #[arg(long, default_value = "1s")]
    pub startup_grace: String,
    /// Keep a started core running when the console exits.
    #[arg(long)]
    pub leave_running: bool,
}

impl ConsoleArgs {
    pub fn to_config(&self) -> CliResult<SessionConfig> {
        let mut config = self.session.to_config()?;
        config.install_dir = self.install_dir.clone();
        config.core_args = if self.core_args.is_empty() {
            vec![CORE_VERBOSE_FLAG.to_string()]
        } else {
            self.core_args.clone()
        };
        config.poll_interval = parse_duration(&self.poll_interval)?;
        config.startup_grace = parse_duration(&self.startup_grace)?;
        Ok(config)
    }
}

#[derive(Args, Debug)]
pub struct CoreArgs {
    /// Process id of the running core.
    #[arg(long, env = "V3CTL_CORE_PID")]
    pub pid: u32,
    #[command(flatten)]
    pub session: SessionArgs,
}

#[derive(Args, Debug)]
pub struct StubCoreArgs {
    /// Log every command (the flag the supervisor passes).
    #[arg(short = 'v', long)]
    pub verbose: bool,
    /// Directory for the endpoint socket (Unix).
    #[arg(long, value_name = "DIR", env = "V3_IPC_DIR")]
    pub ipc_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
