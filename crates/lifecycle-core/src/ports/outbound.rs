//! # Driven Ports (Outbound SPI)
//!
//! Everything the core needs from the host process. The daemon supplies tokio
//! based adapters; tests supply recording mocks.
//!
//! All ports except [`Pacer`] are synchronous: they stage work (a write, a
//! timer, a close) and return immediately, so a handler never blocks on I/O.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{AdminReply, ArmId, ClientId, Command, ConnectionId, PeerInfo};
use crate::error::{ProcessQueryError, TransportError};

/// Registry of channel devices and the live Connection Set.
pub trait PeerRegistry: Send + Sync {
    /// Resolve a connected peer by connection id.
    fn lookup(&self, conn: ConnectionId) -> Option<PeerInfo>;

    /// Resolve a connected peer by VM name.
    fn lookup_by_name(&self, name: &str) -> Option<PeerInfo>;

    /// Oldest entry of the Connection Set (the upstream peer in the User VM role).
    fn first_connected(&self) -> Option<PeerInfo>;

    /// Snapshot of the Connection Set in connection order.
    fn connected(&self) -> Vec<PeerInfo>;

    fn is_empty(&self) -> bool {
        self.connected().is_empty()
    }

    /// Write one command to one peer.
    fn send(&self, conn: ConnectionId, command: Command) -> Result<(), TransportError>;

    /// Write one command to every connected peer. Failures are per peer.
    fn notify_all(&self, command: Command) -> Vec<(ConnectionId, Result<(), TransportError>)> {
        self.connected()
            .into_iter()
            .map(|peer| (peer.conn, self.send(peer.conn, command)))
            .collect()
    }

    /// Remove a peer from the Connection Set.
    fn disconnect(&self, conn: ConnectionId);

    /// Stop admitting new peers into the Connection Set.
    fn stop_listening(&self);
}

/// Collaborator-owned retransmission timer.
///
/// `start` resends `command` on every expiry until `cancel` or until `budget`
/// resends have gone out, at which point the timer reports an ack timeout
/// for `conn`, tagged with `arm`, back into dispatch.
pub trait ResendTimer: Send + Sync {
    fn start(&self, conn: ConnectionId, arm: ArmId, command: Command, budget: u32);

    fn cancel(&self, conn: ConnectionId);
}

/// The local control socket.
pub trait AdminChannel: Send + Sync {
    /// Stage a reply for an admin client.
    fn reply(&self, client: ClientId, reply: AdminReply) -> Result<(), TransportError>;

    /// Close the listener; no further admin requests are accepted.
    fn close(&self);
}

/// Structured view of the host's guest device-model processes.
pub trait ProcessRegistry: Send + Sync {
    /// Number of live device-model processes.
    fn count_device_models(&self) -> Result<usize, ProcessQueryError>;
}

/// Cooperative delay used for protocol pacing and the bounded poll.
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self, duration: Duration);
}
