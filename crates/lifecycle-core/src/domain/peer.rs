//! # Peer Identity
//!
//! The peer registry owns every channel device. The core only ever sees a
//! [`ConnectionId`] lookup key and short-lived [`PeerInfo`] snapshots.

use std::fmt;
use std::path::{Path, PathBuf};

/// Lookup key for a channel device (the daemon uses the device slot index).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u32);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// Lookup key for an admin socket client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client#{}", self.0)
    }
}

/// Snapshot of a connected peer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerInfo {
    pub conn: ConnectionId,
    /// VM name as configured for the channel device.
    pub name: String,
    /// Device path; compared against the allow-list for host shutdown requests.
    pub device_path: PathBuf,
}

impl PeerInfo {
    pub fn new(conn: ConnectionId, name: impl Into<String>, device_path: impl Into<PathBuf>) -> Self {
        Self {
            conn,
            name: name.into(),
            device_path: device_path.into(),
        }
    }

    /// Whether this peer may originate a host-wide shutdown.
    pub fn is_allowed_s5(&self, allowed: &Path) -> bool {
        self.device_path == allowed
    }
}
