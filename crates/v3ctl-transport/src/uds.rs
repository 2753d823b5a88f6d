use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::os::unix::net::UnixListener;
use std::path::Path;

use tracing::{debug, info};

use crate::channel::Channel;
use crate::endpoint::EndpointName;
use crate::error::{Result, TransportError};

/// Server side of a core endpoint on Unix.
///
/// The core (or a stand-in for it) binds `v3_core_ipc_<pid>` and accepts one
/// control client at a time. The socket file is removed on drop, unless the
/// path was replaced by something else in the meantime.
pub struct EndpointListener {
    listener: UnixListener,
    endpoint: EndpointName,
    created_inode: (u64, u64),
}

impl EndpointListener {
    /// Default permission mode for created socket paths.
    pub const DEFAULT_SOCKET_MODE: u32 = 0o600;
    /// Unix `sockaddr_un.sun_path` is 108 bytes on Linux, 104 on macOS.
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(not(target_os = "linux"))]
    const MAX_PATH_LEN: usize = 104;

    /// Bind and listen on the endpoint.
    ///
    /// A stale socket at the same path is removed first; any other kind of
    /// file there is left alone and reported as a bind error.
    pub fn bind(endpoint: &EndpointName) -> Result<Self> {
        let path = endpoint.as_path().to_path_buf();

        let path_bytes = path.as_os_str().len();
        if path_bytes >= Self::MAX_PATH_LEN {
            return Err(TransportError::PathTooLong {
                path,
                len: path_bytes,
                max: Self::MAX_PATH_LEN,
            });
        }

        let bind_err = |source| TransportError::Bind {
            path: path.clone(),
            source,
        };

        if let Ok(metadata) = std::fs::symlink_metadata(&path) {
            if !metadata.file_type().is_socket() {
                return Err(bind_err(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "existing path is not a unix socket",
                )));
            }
            debug!(?path, "removing stale socket");
            std::fs::remove_file(&path).map_err(bind_err)?;
        }

        let listener = UnixListener::bind(&path).map_err(bind_err)?;
        std::fs::set_permissions(
            &path,
            std::fs::Permissions::from_mode(Self::DEFAULT_SOCKET_MODE),
        )
        .map_err(bind_err)?;
        let created = std::fs::symlink_metadata(&path).map_err(bind_err)?;

        info!(%endpoint, "listening for control clients");

        Ok(Self {
            listener,
            endpoint: endpoint.clone(),
            created_inode: (created.dev(), created.ino()),
        })
    }

    /// Accept one control client (blocking).
    pub fn accept(&self) -> Result<Channel> {
        let (stream, _addr) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(endpoint = %self.endpoint, "accepted control client");
        Ok(Channel::from_unix(stream, self.endpoint.clone()))
    }

    /// The endpoint this listener serves.
    pub fn endpoint(&self) -> &EndpointName {
        &self.endpoint
    }

    fn path(&self) -> &Path {
        self.endpoint.as_path()
    }
}

impl Drop for EndpointListener {
    fn drop(&mut self) {
        let (expected_dev, expected_ino) = self.created_inode;
        if let Ok(metadata) = std::fs::symlink_metadata(self.path()) {
            if metadata.file_type().is_socket()
                && metadata.dev() == expected_dev
                && metadata.ino() == expected_ino
            {
                debug!(path = ?self.path(), "cleaning up socket file");
                let _ = std::fs::remove_file(self.path());
            } else {
                debug!(
                    path = ?self.path(),
                    "socket path identity changed; skipping cleanup"
                );
            }
        }
    }
}
