//! Control console and supervisor for the v3 core.
//!
//! v3ctl starts the core engine process, talks to it over its local control
//! endpoint, and stops it again. The `v3ctl` binary is the control surface;
//! this library re-exports the layers it is built from.
//!
//! # Crate Structure
//!
//! - [`transport`]: endpoint naming and the blocking channel (named pipes, Unix sockets)
//! - [`frame`]: the 16-byte header wire codec, opcodes, state and statistics records
//! - [`client`]: request/response client, process supervisor, state tracker, session

/// Re-export transport types.
pub mod transport {
    pub use v3ctl_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use v3ctl_frame::*;
}

/// Re-export client types.
pub mod client {
    pub use v3ctl_client::*;
}
