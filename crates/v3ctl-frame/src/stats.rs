use bytes::{Buf, BufMut, BytesMut};
use serde::Serialize;

/// Packed size of a [`StatsSnapshot`] on the wire.
pub const STATS_WIRE_SIZE: usize = 16 * 8 + 4 + 2 * 8;

/// Counters reported in a `STATS` reply.
///
/// Field order and widths are the wire layout; do not reorder. All counters
/// are owned by the core and only reset when the core restarts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub packets_sent: u64,
    pub packets_recv: u64,
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    pub packets_dropped: u64,
    pub decrypt_failures: u64,
    pub magic_failures: u64,
    pub fec_groups_sent: u64,
    pub fec_groups_recv: u64,
    pub fec_recoveries: u64,
    pub fec_failures: u64,
    pub rtt_us: u64,
    pub rtt_min_us: u64,
    pub rtt_max_us: u64,
    pub jitter_us: u64,
    pub connect_time_sec: u64,
    pub reconnect_count: u32,
    pub last_send_time: u64,
    pub last_recv_time: u64,
}

impl StatsSnapshot {
    /// Append the packed wire form to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(STATS_WIRE_SIZE);
        for counter in [
            self.packets_sent,
            self.packets_recv,
            self.bytes_sent,
            self.bytes_recv,
            self.packets_dropped,
            self.decrypt_failures,
            self.magic_failures,
            self.fec_groups_sent,
            self.fec_groups_recv,
            self.fec_recoveries,
            self.fec_failures,
            self.rtt_us,
            self.rtt_min_us,
            self.rtt_max_us,
            self.jitter_us,
            self.connect_time_sec,
        ] {
            dst.put_u64_le(counter);
        }
        dst.put_u32_le(self.reconnect_count);
        dst.put_u64_le(self.last_send_time);
        dst.put_u64_le(self.last_recv_time);
    }

    /// Copy up to [`STATS_WIRE_SIZE`] bytes of `payload` over this record.
    ///
    /// Bytes beyond the end of a short payload keep their current values.
    /// Returns how many bytes were applied.
    pub fn overlay(&mut self, payload: &[u8]) -> usize {
        let mut wire = BytesMut::with_capacity(STATS_WIRE_SIZE);
        self.encode(&mut wire);
        let n = payload.len().min(STATS_WIRE_SIZE);
        wire[..n].copy_from_slice(&payload[..n]);
        *self = Self::parse(&wire);
        n
    }

    fn parse(mut src: &[u8]) -> Self {
        Self {
            packets_sent: src.get_u64_le(),
            packets_recv: src.get_u64_le(),
            bytes_sent: src.get_u64_le(),
            bytes_recv: src.get_u64_le(),
            packets_dropped: src.get_u64_le(),
            decrypt_failures: src.get_u64_le(),
            magic_failures: src.get_u64_le(),
            fec_groups_sent: src.get_u64_le(),
            fec_groups_recv: src.get_u64_le(),
            fec_recoveries: src.get_u64_le(),
            fec_failures: src.get_u64_le(),
            rtt_us: src.get_u64_le(),
            rtt_min_us: src.get_u64_le(),
            rtt_max_us: src.get_u64_le(),
            jitter_us: src.get_u64_le(),
            connect_time_sec: src.get_u64_le(),
            reconnect_count: src.get_u32_le(),
            last_send_time: src.get_u64_le(),
            last_recv_time: src.get_u64_le(),
        }
    }
}
