//! Message type codes.
//!
//! Commands (client → core) live in the low range. Responses (core → client)
//! set the high bit, except PONG which the core sends as `0x0101`.

/// Reserved bit marking a response opcode.
pub const RESPONSE_BIT: u16 = 0x8000;

/// Liveness probe.
pub const PING: u16 = 0x0100;
/// Reply to [`PING`].
pub const PONG: u16 = 0x0101;
/// Ask the core to bring its tunnel up.
pub const CONNECT: u16 = 0x0110;
/// Ask the core to take its tunnel down.
pub const DISCONNECT: u16 = 0x0111;
/// Ask the core process to exit.
pub const SHUTDOWN: u16 = 0x01FF;
/// Query the connection state (`u32` reply).
pub const GET_STATE: u16 = 0x0300;
/// Query the statistics snapshot.
pub const GET_STATS: u16 = 0x0301;
/// Query the core's version string.
pub const GET_VERSION: u16 = 0x0302;

/// Command accepted.
pub const OK: u16 = 0x8000;
/// Command rejected; payload may carry a message.
pub const ERROR: u16 = 0x8001;
/// Reply to [`GET_STATE`].
pub const STATE: u16 = 0x8003;
/// Reply to [`GET_STATS`].
pub const STATS: u16 = 0x8004;
/// Reply to [`GET_VERSION`].
pub const VERSION: u16 = 0x8005;

/// Returns a human-readable name for an opcode.
pub fn opcode_name(code: u16) -> &'static str {
    match code {
        PING => "PING",
        PONG => "PONG",
        CONNECT => "CONNECT",
        DISCONNECT => "DISCONNECT",
        SHUTDOWN => "SHUTDOWN",
        GET_STATE => "GET_STATE",
        GET_STATS => "GET_STATS",
        GET_VERSION => "GET_VERSION",
        OK => "OK",
        ERROR => "ERROR",
        STATE => "STATE",
        STATS => "STATS",
        VERSION => "VERSION",
        _ if is_response(code) => "UNKNOWN_RESPONSE",
        _ => "UNKNOWN_COMMAND",
    }
}

/// Returns true if the opcode travels core → client.
pub fn is_response(code: u16) -> bool {
    code & RESPONSE_BIT != 0 || code == PONG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn responses_are_classified() {
        for code in [PONG, OK, ERROR, STATE, STATS, VERSION] {
            assert!(is_response(code), "{} should be a response", opcode_name(code));
        }
        for code in [PING, CONNECT, DISCONNECT, SHUTDOWN, GET_STATE, GET_STATS, GET_VERSION] {
            assert!(!is_response(code), "{} should be a command", opcode_name(code));
        }
    }

    #[test]
    fn unknown_codes_have_range_names() {
        assert_eq!(opcode_name(0x8FFF), "UNKNOWN_RESPONSE");
        assert_eq!(opcode_name(0x0042), "UNKNOWN_COMMAND");
        assert_eq!(opcode_name(SHUTDOWN), "SHUTDOWN");
    }
}
