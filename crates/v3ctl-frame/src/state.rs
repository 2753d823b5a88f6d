use std::fmt;

use serde::Serialize;

/// Tunnel connection state as reported by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u32)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    Reconnecting = 3,
    Disconnecting = 4,
    Error = 5,
}

impl ConnectionState {
    /// Map a `STATE` payload value; `None` for values this client does not know.
    pub fn from_wire(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Disconnected),
            1 => Some(Self::Connecting),
            2 => Some(Self::Connected),
            3 => Some(Self::Reconnecting),
            4 => Some(Self::Disconnecting),
            5 => Some(Self::Error),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Disconnecting => "disconnecting",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A decoded `STATE` reply, keeping values outside the known range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateReport {
    Known(ConnectionState),
    Unrecognized(u32),
}

impl StateReport {
    pub fn from_wire(value: u32) -> Self {
        ConnectionState::from_wire(value).map_or(Self::Unrecognized(value), Self::Known)
    }

    /// Decode a `STATE` payload. Missing bytes read as zero.
    pub fn from_payload(payload: &[u8]) -> Self {
        let mut raw = [0u8; 4];
        let n = payload.len().min(raw.len());
        raw[..n].copy_from_slice(&payload[..n]);
        Self::from_wire(u32::from_le_bytes(raw))
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Known(state) => state.label(),
            Self::Unrecognized(_) => "unknown",
        }
    }

    pub fn state(self) -> Option<ConnectionState> {
        match self {
            Self::Known(state) => Some(state),
            Self::Unrecognized(_) => None,
        }
    }
}

impl fmt::Display for StateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(state) => write!(f, "{state}"),
            Self::Unrecognized(raw) => write!(f, "unknown ({raw})"),
        }
    }
}

impl Serialize for StateReport {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_values_map_in_order() {
        assert_eq!(
            ConnectionState::from_wire(0),
            Some(ConnectionState::Disconnected)
        );
        assert_eq!(ConnectionState::from_wire(2), Some(ConnectionState::Connected));
        assert_eq!(ConnectionState::from_wire(5), Some(ConnectionState::Error));
        assert_eq!(ConnectionState::from_wire(6), None);
        assert_eq!(ConnectionState::Reconnecting as u32, 3);
    }

    #[test]
    fn unrecognized_value_renders_unknown() {
        let report = StateReport::from_wire(42);
        assert_eq!(report, StateReport::Unrecognized(42));
        assert_eq!(report.label(), "unknown");
        assert_eq!(report.state(), None);
        assert_eq!(report.to_string(), "unknown (42)");
    }

    #[test]
    fn short_payload_reads_as_zero_extended() {
        assert_eq!(
            StateReport::from_payload(&[]),
            StateReport::Known(ConnectionState::Disconnected)
        );
        assert_eq!(
            StateReport::from_payload(&[1]),
            StateReport::Known(ConnectionState::Connecting)
        );
        assert_eq!(
            StateReport::from_payload(&[4, 0, 0, 0, 0xFF]),
            StateReport::Known(ConnectionState::Disconnecting)
        );
    }

    #[test]
    fn serializes_as_label() {
        let json = serde_json::to_string(&StateReport::Known(ConnectionState::Connected)).unwrap();
        assert_eq!(json, "\"connected\"");
    }
}
