use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tracing::debug;

use crate::endpoint::{EndpointName, RetryDelay};
use crate::error::{Result, TransportError};

/// Default wait for the core endpoint to appear.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Default OS-level read/write timeout on an open channel.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_millis(5000);

/// Where a frame ends, for endpoints that do not preserve message boundaries.
///
/// The header is `header_len` bytes and carries the little-endian `u32` body
/// length at `length_offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameBoundary {
    pub header_len: usize,
    pub length_offset: usize,
}

impl FrameBoundary {
    /// Body length declared by `header`, or 0 if the field is not present.
    pub fn declared_len(&self, header: &[u8]) -> usize {
        header
            .get(self.length_offset..self.length_offset + 4)
            .and_then(|field| field.try_into().ok())
            .map(|field| u32::from_le_bytes(field) as usize)
            .unwrap_or(0)
    }
}

/// Configuration for opening a channel.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// How long to wait for the endpoint to become available.
    pub connect_timeout: Duration,
    /// Read/write timeout applied to the open channel (Unix only).
    pub io_timeout: Option<Duration>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            io_timeout: Some(DEFAULT_IO_TIMEOUT),
        }
    }
}

/// One open connection to a core endpoint.
///
/// Every read and write blocks. Any error leaves the channel unusable; drop it
/// (or call [`Channel::close`]) and open a new one.
pub struct Channel {
    inner: ChannelInner,
    endpoint: EndpointName,
    buf: BytesMut,
}

enum ChannelInner {
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
    #[cfg(windows)]
    Pipe(std::fs::File),
}

impl Channel {
    /// Wait for `endpoint` to exist, then connect to it.
    pub fn open(endpoint: &EndpointName, config: &ChannelConfig) -> Result<Self> {
        let inner = Self::connect_inner(endpoint, config)?;
        debug!(%endpoint, "channel open");
        Ok(Self {
            inner,
            endpoint: endpoint.clone(),
            buf: BytesMut::new(),
        })
    }

    #[cfg(unix)]
    fn connect_inner(endpoint: &EndpointName, config: &ChannelConfig) -> Result<ChannelInner> {
        use std::os::unix::net::UnixStream;

        let path = endpoint.as_path();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                return Err(TransportError::NotFound {
                    endpoint: endpoint.to_string(),
                });
            }
        }

        let mut delay = RetryDelay::new(config.connect_timeout);
        let stream = loop {
            match UnixStream::connect(path) {
                Ok(stream) => break stream,
                Err(err)
                    if matches!(
                        err.kind(),
                        ErrorKind::NotFound | ErrorKind::ConnectionRefused
                    ) =>
                {
                    if !delay.wait() {
                        return Err(TransportError::Timeout {
                            endpoint: endpoint.to_string(),
                            timeout: config.connect_timeout,
                        });
                    }
                }
                Err(err) => {
                    return Err(TransportError::Connect {
                        endpoint: endpoint.to_string(),
                        source: err,
                    })
                }
            }
        };

        stream.set_read_timeout(config.io_timeout)?;
        stream.set_write_timeout(config.io_timeout)?;
        Ok(ChannelInner::Unix(stream))
    }

    #[cfg(windows)]
    fn connect_inner(endpoint: &EndpointName, config: &ChannelConfig) -> Result<ChannelInner> {
        use crate::pipe;

        let path = endpoint.as_path();
        let connect_err = |source| TransportError::Connect {
            endpoint: endpoint.to_string(),
            source,
        };

        let mut delay = RetryDelay::new(config.connect_timeout);
        let file = loop {
            match pipe::wait_available(path, delay.remaining()) {
                Ok(true) => match pipe::open(path) {
                    Ok(file) => break file,
                    Err(err) if pipe::is_busy(&err) => {}
                    Err(err) => return Err(connect_err(err)),
                },
                Ok(false) => {}
                Err(err) => return Err(connect_err(err)),
            }
            if !delay.wait() {
                return Err(TransportError::Timeout {
                    endpoint: endpoint.to_string(),
                    timeout: config.connect_timeout,
                });
            }
        };

        if let Err(err) = pipe::set_message_mode(&file) {
            tracing::warn!(%endpoint, error = %err, "could not switch pipe to message mode");
        }
        if config.io_timeout.is_some() {
            debug!(%endpoint, "synchronous pipes use the OS default I/O timeout");
        }
        Ok(ChannelInner::Pipe(file))
    }

    /// Wrap an accepted server-side stream.
    #[cfg(unix)]
    pub(crate) fn from_unix(
        stream: std::os::unix::net::UnixStream,
        endpoint: EndpointName,
    ) -> Self {
        Self {
            inner: ChannelInner::Unix(stream),
            endpoint,
            buf: BytesMut::new(),
        }
    }

    /// Write one complete frame.
    pub fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        let stream: &mut dyn Write = match &mut self.inner {
            #[cfg(unix)]
            ChannelInner::Unix(stream) => stream,
            #[cfg(windows)]
            ChannelInner::Pipe(file) => file,
        };
        stream.write_all(frame)?;
        stream.flush()?;
        Ok(())
    }

    /// Read one frame of at most `max_len` bytes.
    ///
    /// The returned buffer may be shorter than the frame the peer declared if
    /// the peer closed mid-frame or the frame exceeds `max_len`.
    pub fn read_frame(&mut self, max_len: usize, boundary: FrameBoundary) -> Result<Bytes> {
        self.buf.clear();
        self.buf.resize(max_len, 0);

        let filled = match &mut self.inner {
            #[cfg(unix)]
            ChannelInner::Unix(stream) => read_delimited(stream, &mut self.buf[..], boundary)?,
            #[cfg(windows)]
            ChannelInner::Pipe(file) => {
                let _ = boundary;
                read_message(file, &mut self.buf[..])?
            }
        };

        self.buf.truncate(filled);
        Ok(self.buf.split().freeze())
    }

    /// The endpoint this channel is connected to.
    pub fn endpoint(&self) -> &EndpointName {
        &self.endpoint
    }

    /// Close the channel, releasing the OS handle.
    pub fn close(self) {
        debug!(endpoint = %self.endpoint, "channel closed");
    }

    /// Process id of the connected peer (Linux only).
    #[cfg(target_os = "linux")]
    pub fn peer_pid(&self) -> Option<u32> {
        use std::os::fd::AsRawFd;

        let fd = match &self.inner {
            ChannelInner::Unix(stream) => stream.as_raw_fd(),
        };

        let mut cred = libc::ucred {
            pid: 0,
            uid: 0,
            gid: 0,
        };
        let mut len = std::mem::size_of::<libc::ucred>() as libc::socklen_t;

        // SAFETY: `cred` and `len` are valid writable pointers for the provided sizes,
        // and `fd` is an open Unix socket descriptor owned by this channel.
        let rc = unsafe {
            libc::getsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_PEERCRED,
                (&mut cred as *mut libc::ucred).cast::<libc::c_void>(),
                &mut len,
            )
        };

        if rc == 0 && len as usize == std::mem::size_of::<libc::ucred>() {
            Some(cred.pid as u32)
        } else {
            None
        }
    }

    /// Process id of the connected peer.
    ///
    /// Returns `None` on platforms that do not expose peer credentials.
    #[cfg(not(target_os = "linux"))]
    pub fn peer_pid(&self) -> Option<u32> {
        None
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("endpoint", &self.endpoint.to_string())
            .finish()
    }
}

/// Header first, then the declared body clamped to the buffer.
#[cfg(unix)]
fn read_delimited<R: Read>(
    stream: &mut R,
    buf: &mut [u8],
    boundary: FrameBoundary,
) -> Result<usize> {
    let header_len = boundary.header_len.min(buf.len());
    let got = read_up_to(stream, &mut buf[..header_len])?;
    if got == 0 {
        return Err(TransportError::Closed);
    }
    if got < boundary.header_len {
        return Ok(got);
    }

    let declared = boundary.declared_len(&buf[..header_len]);
    let body_end = header_len.saturating_add(declared).min(buf.len());
    let body = read_up_to(stream, &mut buf[header_len..body_end])?;
    Ok(header_len + body)
}

/// Fill `buf` unless EOF comes first; returns the byte count.
#[cfg(unix)]
fn read_up_to<R: Read>(stream: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0usize;
    while filled < buf.len() {
        match stream.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(TransportError::Io(err)),
        }
    }
    Ok(filled)
}

#[cfg(windows)]
fn read_message<R: Read>(stream: &mut R, buf: &mut [u8]) -> Result<usize> {
    loop {
        match stream.read(buf) {
            Ok(0) => return Err(TransportError::Closed),
            Ok(n) => return Ok(n),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(TransportError::Io(err)),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::Cursor;

    use super::*;

    const BOUNDARY: FrameBoundary = FrameBoundary {
        header_len: 8,
        length_offset: 4,
    };

    fn frame(declared: u32, body: &[u8]) -> Vec<u8> {
        let mut out = vec![0xAA, 0xBB, 0xCC, 0xDD];
        out.extend_from_slice(&declared.to_le_bytes());
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn declared_len_reads_le_field() {
        let header = frame(0x0102, b"");
        assert_eq!(BOUNDARY.declared_len(&header), 0x0102);
        assert_eq!(BOUNDARY.declared_len(&header[..5]), 0);
    }

    #[test]
    fn reads_exactly_one_frame() {
        let mut wire = frame(3, b"abc");
        wire.extend_from_slice(&frame(2, b"zz"));
        let mut cursor = Cursor::new(wire);

        let mut buf = [0u8; 64];
        let n = read_delimited(&mut cursor, &mut buf, BOUNDARY).unwrap();
        assert_eq!(n, 11);
        assert_eq!(&buf[8..n], b"abc");

        let n = read_delimited(&mut cursor, &mut buf, BOUNDARY).unwrap();
        assert_eq!(&buf[8..n], b"zz");
    }

    #[test]
    fn body_is_clamped_to_buffer() {
        let mut cursor = Cursor::new(frame(1000, &[7u8; 1000]));
        let mut buf = [0u8; 16];
        let n = read_delimited(&mut cursor, &mut buf, BOUNDARY).unwrap();
        assert_eq!(n, 16);
    }

    #[test]
    fn eof_mid_body_returns_partial_frame() {
        let mut cursor = Cursor::new(frame(40, b"only-part"));
        let mut buf = [0u8; 64];
        let n = read_delimited(&mut cursor, &mut buf, BOUNDARY).unwrap();
        assert_eq!(&buf[8..n], b"only-part");
    }

    #[test]
    fn eof_before_header_is_closed() {
        let mut cursor = Cursor::new(Vec::<u8>::new());
        let mut buf = [0u8; 64];
        let err = read_delimited(&mut cursor, &mut buf, BOUNDARY).unwrap_err();
        assert!(matches!(err, TransportError::Closed));
    }

    #[test]
    fn short_header_is_returned_as_is() {
        let mut cursor = Cursor::new(vec![1, 2, 3]);
        let mut buf = [0u8; 64];
        let n = read_delimited(&mut cursor, &mut buf, BOUNDARY).unwrap();
        assert_eq!(n, 3);
    }

    #[test]
    fn open_missing_namespace_is_not_found() {
        let dir = std::env::temp_dir().join(format!("v3ctl-no-such-dir-{}", std::process::id()));
        let name = EndpointName::in_namespace(&dir, 99);
        let err = Channel::open(&name, &ChannelConfig::default()).unwrap_err();
        assert!(matches!(err, TransportError::NotFound { .. }));
    }

    #[test]
    fn open_absent_endpoint_times_out() {
        let name = EndpointName::in_namespace(std::env::temp_dir(), u32::MAX - 3);
        let config = ChannelConfig {
            connect_timeout: Duration::from_millis(100),
            ..ChannelConfig::default()
        };
        let start = std::time::Instant::now();
        let err = Channel::open(&name, &config).unwrap_err();
        assert!(matches!(err, TransportError::Timeout { .. }));
        assert!(start.elapsed() >= Duration::from_millis(100));
    }
}
