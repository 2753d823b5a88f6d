use tracing::debug;
use v3ctl_client::CoreSession;

use crate::cmd::CoreArgs;
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{print_ack, print_ping, print_state, print_stats, print_version, OutputFormat};

/// A single request against a core that is already running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreAction {
    Ping,
    State,
    Stats,
    Version,
    Connect,
    Disconnect,
    Shutdown,
}

impl CoreAction {
    fn name(self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::State => "state",
            Self::Stats => "stats",
            Self::Version => "core-version",
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::Shutdown => "shutdown",
        }
    }
}

pub fn run(action: CoreAction, args: CoreArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.session.to_config()?;
    let pid = args.pid;
    let mut session = CoreSession::attach(config, pid);
    debug!(pid, action = action.name(), "attached to core");

    let context = format!("{} failed", action.name());
    match action {
        CoreAction::Ping => {
            let rtt = session.ping().map_err(|err| client_error(&context, err))?;
            print_ping(pid, rtt, format);
        }
        CoreAction::State => {
            let report = session
                .poll_state()
                .map_err(|err| client_error(&context, err))?;
            print_state(pid, report, format);
        }
        CoreAction::Stats => {
            let stats = session
                .get_stats()
                .map_err(|err| client_error(&context, err))?;
            print_stats(pid, &stats, format);
        }
        CoreAction::Version => {
            let version = session
                .get_version()
                .map_err(|err| client_error(&context, err))?;
            print_version(pid, &version, format);
        }
        CoreAction::Connect => {
            session.connect().map_err(|err| client_error(&context, err))?;
            print_ack(pid, "CONNECT", format);
        }
        CoreAction::Disconnect => {
            session
                .disconnect()
                .map_err(|err| client_error(&context, err))?;
            print_ack(pid, "DISCONNECT", format);
        }
        CoreAction::Shutdown => {
            session
                .shutdown_core()
                .map_err(|err| client_error(&context, err))?;
            print_ack(pid, "SHUTDOWN", format);
        }
    }

    session.close_channel();
    Ok(SUCCESS)
}
