//! # Dispatch Events
//!
//! The single stream of work fed to the lifecycle service. Reader tasks, the
//! admin accept loop and resend timers only ever produce these; the service
//! consumes them one at a time.

use crate::domain::{AdminRequest, ArmId, ClientId, Command, ConnectionId};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// A protocol command arrived on a peer channel.
    PeerMessage {
        conn: ConnectionId,
        command: Command,
    },
    /// The resend timer armed as `arm` on `conn` exhausted its budget without an ack.
    AckTimeout { conn: ConnectionId, arm: ArmId },
    /// A local admin client sent a request.
    Admin {
        client: ClientId,
        request: AdminRequest,
    },
}

impl LifecycleEvent {
    pub fn peer(conn: ConnectionId, command: Command) -> Self {
        LifecycleEvent::PeerMessage { conn, command }
    }

    pub fn admin(client: ClientId, request: AdminRequest) -> Self {
        LifecycleEvent::Admin { client, request }
    }
}
