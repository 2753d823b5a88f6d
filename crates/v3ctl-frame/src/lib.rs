//! Wire codec for the v3 core control protocol.
//!
//! Every message is one frame:
//! - A 16-byte packed little-endian header (magic, version, type, sequence, length)
//! - The payload, at most [`MAX_PAYLOAD`] bytes
//!
//! Decoding never sizes anything from the declared length; payloads are views
//! clamped to what was actually received.

pub mod codec;
pub mod error;
pub mod opcode;
pub mod state;
pub mod stats;

pub use codec::{
    decode_frame, encode_frame, Header, FRAME_BOUNDARY, HEADER_SIZE, MAGIC, MAX_FRAME_SIZE,
    MAX_PAYLOAD, VERSION,
};
pub use error::{FrameError, Result};
pub use opcode::{is_response, opcode_name};
pub use state::{ConnectionState, StateReport};
pub use stats::{StatsSnapshot, STATS_WIRE_SIZE};
