use std::time::{Instant, SystemTime, UNIX_EPOCH};

use bytes::BytesMut;
use tracing::{debug, info, warn};
use v3ctl_frame::opcode::{
    CONNECT, DISCONNECT, ERROR, GET_STATE, GET_STATS, GET_VERSION, OK, PING, PONG, SHUTDOWN,
    STATE, STATS, VERSION,
};
use v3ctl_frame::{
    decode_frame, encode_frame, opcode_name, ConnectionState, StatsSnapshot, FRAME_BOUNDARY,
    MAX_FRAME_SIZE,
};
use v3ctl_transport::{Channel, TransportError};

use crate::cmd::StubCoreArgs;
use crate::exit::CliResult;

#[cfg(unix)]
pub fn run(args: StubCoreArgs) -> CliResult<i32> {
    use v3ctl_transport::{EndpointListener, EndpointName};

    use crate::exit::{transport_error, SUCCESS};

    let pid = std::process::id();
    let endpoint = match &args.ipc_dir {
        Some(dir) => EndpointName::in_namespace(dir, pid),
        None => EndpointName::for_pid(pid),
    };
    let listener =
        EndpointListener::bind(&endpoint).map_err(|err| transport_error("bind failed", err))?;
    info!(pid, %endpoint, verbose = args.verbose, "stub core ready");

    let mut core = StubCore::new(args.verbose);
    loop {
        let mut channel = listener
            .accept()
            .map_err(|err| transport_error("accept failed", err))?;
        if core.serve(&mut channel) == Served::Shutdown {
            break;
        }
    }

    info!(pid, "stub core exiting");
    Ok(SUCCESS)
}

#[cfg(not(unix))]
pub fn run(args: StubCoreArgs) -> CliResult<i32> {
    let _ = args;
    Err(crate::exit::CliError::new(
        crate::exit::USAGE,
        "stub-core requires Unix domain sockets",
    ))
}

/// How a client session with the stub ended.
#[cfg_attr(not(unix), allow(dead_code))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Served {
    Disconnected,
    Shutdown,
}

/// One response from the stub.
#[derive(Debug, PartialEq, Eq)]
struct Reply {
    msg_type: u16,
    payload: Vec<u8>,
    exit: bool,
}

impl Reply {
    fn new(msg_type: u16, payload: Vec<u8>) -> Self {
        Self {
            msg_type,
            payload,
            exit: false,
        }
    }
}

/// In-memory tunnel state answering the control protocol.
#[cfg_attr(not(unix), allow(dead_code))]
struct StubCore {
    verbose: bool,
    state: ConnectionState,
    stats: StatsSnapshot,
    connected_at: Option<Instant>,
    connects: u32,
}

#[cfg_attr(not(unix), allow(dead_code))]
impl StubCore {
    fn new(verbose: bool) -> Self {
        Self {
            verbose,
            state: ConnectionState::Disconnected,
            stats: StatsSnapshot::default(),
            connected_at: None,
            connects: 0,
        }
    }

    /// Answer commands until the client goes away or asks us to exit.
    fn serve(&mut self, channel: &mut Channel) -> Served {
        let mut out = BytesMut::new();
        loop {
            let raw = match channel.read_frame(MAX_FRAME_SIZE, FRAME_BOUNDARY) {
                Ok(raw) => raw,
                Err(TransportError::Closed) => {
                    debug!("control client disconnected");
                    return Served::Disconnected;
                }
                Err(err) => {
                    warn!(error = %err, "read failed; dropping client");
                    return Served::Disconnected;
                }
            };

            let (header, payload) = match decode_frame(&raw) {
                Ok(decoded) => decoded,
                Err(err) => {
                    warn!(error = %err, "bad frame; dropping client");
                    return Served::Disconnected;
                }
            };
            self.stats.packets_recv += 1;
            self.stats.bytes_recv += raw.len() as u64;
            self.stats.last_recv_time = unix_now();

            let reply = self.handle(header.msg_type, payload);
            out.clear();
            let encoded = encode_frame(reply.msg_type, header.sequence, &reply.payload, &mut out);
            if let Err(err) = encoded {
                warn!(error = %err, "reply does not fit a frame");
                return Served::Disconnected;
            }
            if let Err(err) = channel.write_frame(&out) {
                warn!(error = %err, "write failed; dropping client");
                return Served::Disconnected;
            }
            self.stats.packets_sent += 1;
            self.stats.bytes_sent += out.len() as u64;
            self.stats.last_send_time = unix_now();

            if reply.exit {
                return Served::Shutdown;
            }
        }
    }

    fn handle(&mut self, command: u16, payload: &[u8]) -> Reply {
        if self.verbose {
            info!(command = opcode_name(command), len = payload.len(), "command");
        } else {
            debug!(command = opcode_name(command), len = payload.len(), "command");
        }

        match command {
            PING => Reply::new(PONG, Vec::new()),
            CONNECT => {
                if self.state != ConnectionState::Connected {
                    self.state = ConnectionState::Connected;
                    self.connected_at = Some(Instant::now());
                    self.connects += 1;
                }
                Reply::new(OK, Vec::new())
            }
            DISCONNECT => {
                self.state = ConnectionState::Disconnected;
                self.connected_at = None;
                Reply::new(OK, Vec::new())
            }
            GET_STATE => Reply::new(STATE, (self.state as u32).to_le_bytes().to_vec()),
            GET_STATS => {
                let mut snapshot = self.stats;
                snapshot.connect_time_sec = self
                    .connected_at
                    .map_or(0, |since| since.elapsed().as_secs());
                snapshot.reconnect_count = self.connects.saturating_sub(1);
                let mut wire = BytesMut::new();
                snapshot.encode(&mut wire);
                Reply::new(STATS, wire.to_vec())
            }
            GET_VERSION => Reply::new(
                VERSION,
                format!("v3ctl-stub {}", env!("CARGO_PKG_VERSION")).into_bytes(),
            ),
            SHUTDOWN => Reply {
                msg_type: OK,
                payload: Vec::new(),
                exit: true,
            },
            other => Reply::new(
                ERROR,
                format!("unsupported command 0x{other:04X}").into_bytes(),
            ),
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use v3ctl_frame::{StateReport, STATS_WIRE_SIZE};

    use super::*;

    #[test]
    fn tunnel_state_follows_commands() {
        let mut core = StubCore::new(false);
        let state = |core: &mut StubCore| {
            let reply = core.handle(GET_STATE, &[]);
            assert_eq!(reply.msg_type, STATE);
            StateReport::from_payload(&reply.payload)
        };

        assert_eq!(
            state(&mut core),
            StateReport::Known(ConnectionState::Disconnected)
        );
        assert_eq!(core.handle(CONNECT, &[]).msg_type, OK);
        assert_eq!(state(&mut core), StateReport::Known(ConnectionState::Connected));
        assert_eq!(core.handle(DISCONNECT, &[]).msg_type, OK);
        assert_eq!(
            state(&mut core),
            StateReport::Known(ConnectionState::Disconnected)
        );
    }

    #[test]
    fn stats_reply_is_a_full_snapshot() {
        let mut core = StubCore::new(false);
        core.handle(CONNECT, &[]);
        core.handle(DISCONNECT, &[]);
        core.handle(CONNECT, &[]);

        let reply = core.handle(GET_STATS, &[]);
        assert_eq!(reply.msg_type, STATS);
        assert_eq!(reply.payload.len(), STATS_WIRE_SIZE);

        let mut snapshot = StatsSnapshot::default();
        snapshot.overlay(&reply.payload);
        assert_eq!(snapshot.reconnect_count, 1);
    }

    #[test]
    fn shutdown_acknowledges_then_exits() {
        let mut core = StubCore::new(true);
        let reply = core.handle(SHUTDOWN, &[]);
        assert_eq!(reply.msg_type, OK);
        assert!(reply.exit);
        assert!(!core.handle(PING, &[]).exit);
    }

    #[test]
    fn unknown_command_is_an_error_reply() {
        let mut core = StubCore::new(false);
        let reply = core.handle(0x0777, &[]);
        assert_eq!(reply.msg_type, ERROR);
        assert_eq!(reply.payload, b"unsupported command 0x0777".to_vec());
    }
}
