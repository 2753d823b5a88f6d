use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use bytes::{Bytes, BytesMut};
use tracing::{debug, trace, warn};
use v3ctl_frame::opcode::{
    CONNECT, DISCONNECT, GET_STATE, GET_STATS, GET_VERSION, OK, PING, PONG, SHUTDOWN, STATE,
    STATS, VERSION,
};
use v3ctl_frame::{
    decode_frame, encode_frame, opcode_name, FrameError, Header, StateReport, StatsSnapshot,
    FRAME_BOUNDARY, HEADER_SIZE, MAX_FRAME_SIZE, MAX_PAYLOAD, STATS_WIRE_SIZE,
};
use v3ctl_transport::{Channel, EndpointName};

use crate::config::SessionConfig;
use crate::error::{ClientError, Result};

/// Bytes of an unexpected response kept for diagnostics.
const DETAIL_CAPACITY: usize = 256;

/// One decoded response frame.
#[derive(Debug, Clone)]
pub struct Response {
    pub header: Header,
    /// Payload, clamped to the capacity the caller asked for.
    pub payload: Bytes,
}

impl Response {
    pub fn msg_type(&self) -> u16 {
        self.header.msg_type
    }

    /// Payload as text, if any; used for `ERROR` messages.
    pub fn detail(&self) -> Option<String> {
        let text = String::from_utf8_lossy(&self.payload);
        let text = text.trim_end_matches('\0').trim();
        if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        }
    }
}

/// Request sequence numbers.
#[derive(Debug)]
struct SequenceCounter {
    next: u32,
}

impl SequenceCounter {
    fn seeded() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u32)
            .unwrap_or(0);
        Self { next: millis }
    }

    fn next(&mut self) -> u32 {
        let sequence = self.next;
        self.next = self.next.wrapping_add(1);
        sequence
    }
}

/// Synchronous request/response client for one core.
///
/// The channel is opened on demand by the first call after the core pid is
/// known. Any transport or protocol failure closes it; the following call
/// opens a fresh one. Calls are never retried.
#[derive(Debug)]
pub struct IpcClient {
    config: SessionConfig,
    core_pid: Option<u32>,
    channel: Option<Channel>,
    sequence: SequenceCounter,
    scratch: BytesMut,
}

impl IpcClient {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            config: config.clone(),
            core_pid: None,
            channel: None,
            sequence: SequenceCounter::seeded(),
            scratch: BytesMut::with_capacity(HEADER_SIZE),
        }
    }

    /// Client for a core that is already running.
    pub fn attach(config: &SessionConfig, pid: u32) -> Self {
        let mut client = Self::new(config);
        client.core_pid = Some(pid);
        client
    }

    pub fn core_pid(&self) -> Option<u32> {
        self.core_pid
    }

    /// Change the target core. An open channel to a different core is closed.
    pub fn set_core_pid(&mut self, pid: Option<u32>) {
        if self.core_pid != pid {
            self.disconnect();
            self.core_pid = pid;
        }
    }

    /// The endpoint of the target core, if one is known.
    pub fn endpoint(&self) -> Option<EndpointName> {
        self.core_pid.map(|pid| self.config.endpoint_for(pid))
    }

    pub fn is_connected(&self) -> bool {
        self.channel.is_some()
    }

    /// Open the channel if it is not already open.
    pub fn connect(&mut self) -> Result<()> {
        if self.channel.is_some() {
            return Ok(());
        }
        let endpoint = self.endpoint().ok_or(ClientError::NoCore)?;
        let channel = Channel::open(&endpoint, &self.config.channel_config())?;
        debug!(%endpoint, "connected to core");
        self.channel = Some(channel);
        Ok(())
    }

    /// Close the channel. Returns whether one was open.
    pub fn disconnect(&mut self) -> bool {
        match self.channel.take() {
            Some(channel) => {
                channel.close();
                true
            }
            None => false,
        }
    }

    /// Send one command and wait for its response.
    ///
    /// At most `capacity` payload bytes of the response are kept.
    pub fn send_recv(&mut self, command: u16, payload: &[u8], capacity: usize) -> Result<Response> {
        self.connect()?;

        let sequence = self.sequence.next();
        self.scratch.clear();
        encode_frame(command, sequence, payload, &mut self.scratch)?;
        trace!(
            command = opcode_name(command),
            sequence,
            len = payload.len(),
            "sending command"
        );

        let result = self.exchange(sequence, capacity);
        if let Err(err) = &result {
            warn!(
                command = opcode_name(command),
                error = %err,
                "exchange failed; closing channel"
            );
            self.disconnect();
        }
        result
    }

    fn exchange(&mut self, sequence: u32, capacity: usize) -> Result<Response> {
        let channel = self.channel.as_mut().ok_or(ClientError::NoCore)?;
        channel.write_frame(&self.scratch)?;
        let raw = channel.read_frame(MAX_FRAME_SIZE, FRAME_BOUNDARY)?;

        let (header, payload) = decode_frame(&raw)?;
        // The declared body must fit the frame and arrive whole.
        let declared = header.payload_len as usize;
        if declared > MAX_PAYLOAD {
            return Err(FrameError::PayloadTooLarge {
                size: declared,
                max: MAX_PAYLOAD,
            }
            .into());
        }
        if payload.len() < declared {
            return Err(FrameError::Truncated {
                declared,
                received: payload.len(),
            }
            .into());
        }
        if self.config.verify_sequence && header.sequence != sequence {
            return Err(ClientError::SequenceMismatch {
                expected: sequence,
                got: header.sequence,
            });
        }

        let keep = payload.len().min(capacity);
        trace!(
            response = opcode_name(header.msg_type),
            sequence = header.sequence,
            len = keep,
            "received response"
        );
        Ok(Response {
            header,
            payload: raw.slice(HEADER_SIZE..HEADER_SIZE + keep),
        })
    }

    fn call(&mut self, command: u16, expected: u16, capacity: usize) -> Result<Response> {
        let response = self.send_recv(command, &[], capacity.max(DETAIL_CAPACITY))?;
        if response.msg_type() != expected {
            return Err(ClientError::UnexpectedResponse {
                command,
                got: response.msg_type(),
                detail: response.detail(),
            });
        }
        Ok(response)
    }

    /// Round-trip a PING. Returns the elapsed time.
    pub fn ping(&mut self) -> Result<Duration> {
        let started = Instant::now();
        self.call(PING, PONG, 0)?;
        Ok(started.elapsed())
    }

    /// Ask the core to bring its tunnel up.
    pub fn request_connect(&mut self) -> Result<()> {
        self.call(CONNECT, OK, 0).map(|_| ())
    }

    /// Ask the core to take its tunnel down.
    pub fn request_disconnect(&mut self) -> Result<()> {
        self.call(DISCONNECT, OK, 0).map(|_| ())
    }

    pub fn get_state(&mut self) -> Result<StateReport> {
        let response = self.call(GET_STATE, STATE, 4)?;
        Ok(StateReport::from_payload(&response.payload))
    }

    /// Fetch statistics. A short reply leaves the missing counters at zero.
    pub fn get_stats(&mut self) -> Result<StatsSnapshot> {
        let response = self.call(GET_STATS, STATS, STATS_WIRE_SIZE)?;
        let mut snapshot = StatsSnapshot::default();
        let applied = snapshot.overlay(&response.payload);
        if applied < STATS_WIRE_SIZE {
            debug!(applied, expected = STATS_WIRE_SIZE, "short stats reply");
        }
        Ok(snapshot)
    }

    pub fn get_version(&mut self) -> Result<String> {
        let response = self.call(GET_VERSION, VERSION, DETAIL_CAPACITY)?;
        let text = String::from_utf8_lossy(&response.payload);
        Ok(text.trim_end_matches('\0').to_string())
    }

    /// Ask the core to exit. Any reply is accepted.
    pub fn shutdown(&mut self) -> Result<()> {
        let response = self.send_recv(SHUTDOWN, &[], 0)?;
        debug!(
            response = opcode_name(response.msg_type()),
            "shutdown acknowledged"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use v3ctl_frame::opcode::ERROR;

    use super::*;

    #[test]
    fn send_without_core_is_no_core() {
        let mut client = IpcClient::new(&SessionConfig::default());
        let err = client.send_recv(PING, &[], 0).unwrap_err();
        assert!(matches!(err, ClientError::NoCore));
        assert!(!client.is_connected());
    }

    #[test]
    fn sequence_counter_wraps() {
        let mut counter = SequenceCounter { next: u32::MAX };
        assert_eq!(counter.next(), u32::MAX);
        assert_eq!(counter.next(), 0);
        assert_eq!(counter.next(), 1);
    }

    #[test]
    fn response_detail_trims_padding() {
        let response = Response {
            header: Header::new(ERROR, 1, 8),
            payload: Bytes::from_static(b"busy\0\0\0\0"),
        };
        assert_eq!(response.detail().as_deref(), Some("busy"));

        let empty = Response {
            header: Header::new(ERROR, 1, 0),
            payload: Bytes::new(),
        };
        assert_eq!(empty.detail(), None);
    }

    #[test]
    fn changing_pid_updates_endpoint() {
        let config = SessionConfig {
            endpoint_dir: Some(std::path::PathBuf::from("/run/v3")),
            ..SessionConfig::default()
        };
        let mut client = IpcClient::attach(&config, 10);
        assert_eq!(client.endpoint().map(|e| e.pid()), Some(10));

        client.set_core_pid(Some(11));
        assert_eq!(client.endpoint().map(|e| e.pid()), Some(11));

        client.set_core_pid(None);
        assert!(client.endpoint().is_none());
        assert!(!client.disconnect());
    }
}
