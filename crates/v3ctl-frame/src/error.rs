/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Fewer bytes than a header were supplied.
    #[error("short frame ({len} bytes, header is {header} bytes)")]
    ShortFrame { len: usize, header: usize },

    /// The frame header contains the wrong magic number.
    #[error("bad frame magic 0x{found:08X} (expected 0x{expected:08X})")]
    BadMagic { found: u32, expected: u32 },

    /// The frame header carries a protocol version this client does not speak.
    #[error("unsupported protocol version 0x{found:04X} (expected 0x{expected:04X})")]
    UnsupportedVersion { found: u16, expected: u16 },

    /// The payload does not fit in one frame.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// Fewer payload bytes arrived than the header declared.
    #[error("truncated frame ({received} of {declared} payload bytes)")]
    Truncated { declared: usize, received: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;
