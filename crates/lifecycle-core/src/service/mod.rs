//! # Lifecycle Service
//!
//! Command dispatch for both roles, the socket-admin bridge and the shared
//! pieces they call into (resend policy, orchestrator).
//!
//! ## Dispatch
//!
//! ```text
//! LifecycleEvent ──→ dispatch()
//!                       ├── PeerMessage ──→ service_vm / user_vm table (by Role)
//!                       ├── AckTimeout  ──→ fail-open / disarm / strict (by Role + pending arm)
//!                       └── Admin       ──→ admin bridge
//!                                               │
//!                 ResendPolicy ←── arm/disarm ──┤
//!                 ShutdownOrchestrator ←────────┘ (terminal sink)
//! ```
//!
//! Each handler runs to completion before the next event. Settle delays go
//! through the [`Pacer`] port so the daemon's producers keep running.

mod admin;
mod orchestrator;
mod resend;
mod service_vm;
mod user_vm;

pub use orchestrator::ShutdownOrchestrator;
pub use resend::ResendPolicy;

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{
    ArmId, Command, ConnectionId, LifecycleConfig, PendingCommand, Role, ShutdownPhase,
    ShutdownState,
};
use crate::events::LifecycleEvent;
use crate::ports::{
    AdminChannel, HandlerStatus, LifecycleApi, Pacer, PeerRegistry, ProcessRegistry, ResendTimer,
};

/// Lifecycle manager service.
///
/// Generic over its five outbound ports:
/// - `R: PeerRegistry` - channel devices and the Connection Set
/// - `T: ResendTimer` - retransmission timers
/// - `A: AdminChannel` - the local control socket
/// - `P: ProcessRegistry` - guest device-model process count
/// - `Z: Pacer` - settle delays
pub struct LifecycleService<R, T, A, P, Z>
where
    R: PeerRegistry,
    T: ResendTimer,
    A: AdminChannel,
    P: ProcessRegistry,
    Z: Pacer,
{
    config: LifecycleConfig,
    registry: Arc<R>,
    resend: ResendPolicy<T>,
    admin: Arc<A>,
    pacer: Arc<Z>,
    orchestrator: ShutdownOrchestrator<R, A, P, Z>,
}

impl<R, T, A, P, Z> LifecycleService<R, T, A, P, Z>
where
    R: PeerRegistry,
    T: ResendTimer,
    A: AdminChannel,
    P: ProcessRegistry,
    Z: Pacer,
{
    pub fn new(
        config: LifecycleConfig,
        registry: Arc<R>,
        timer: Arc<T>,
        admin: Arc<A>,
        processes: Arc<P>,
        pacer: Arc<Z>,
    ) -> Self {
        let orchestrator = ShutdownOrchestrator::new(
            config.shutdown,
            Arc::new(ShutdownState::new()),
            Arc::clone(&registry),
            Arc::clone(&admin),
            processes,
            Arc::clone(&pacer),
        );
        Self {
            config,
            registry,
            resend: ResendPolicy::new(timer),
            admin,
            pacer,
            orchestrator,
        }
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    pub fn orchestrator(&self) -> &ShutdownOrchestrator<R, A, P, Z> {
        &self.orchestrator
    }

    /// Shared handle on the shutdown flags, for the outer run loop.
    pub fn shutdown_state(&self) -> Arc<ShutdownState> {
        self.orchestrator.state()
    }

    pub fn pending(&self, conn: ConnectionId) -> Option<PendingCommand> {
        self.resend.pending(conn)
    }

    /// Arm POWEROFF_CMD on every connected peer, then send it to all of them.
    fn broadcast_poweroff(&self) {
        let peers = self.registry.connected();
        for peer in &peers {
            self.resend
                .arm(peer.conn, Command::PoweroffCmd, self.config.retry.broadcast);
        }
        tracing::info!(
            "[lifecycle] Broadcasting {} to {} guest(s)",
            Command::PoweroffCmd,
            peers.len()
        );
        for (conn, result) in self.registry.notify_all(Command::PoweroffCmd) {
            if let Err(e) = result {
                tracing::warn!("[lifecycle] {} to {} failed: {}", Command::PoweroffCmd, conn, e);
            }
        }
    }

    /// Send `command` and log a failed write. Retries only come from the resend timer.
    fn send_logged(&self, conn: ConnectionId, command: Command) -> HandlerStatus {
        match self.registry.send(conn, command) {
            Ok(()) => HandlerStatus::Handled,
            Err(e) => {
                tracing::warn!("[lifecycle] Failed to send {} to {}: {}", command, conn, e);
                HandlerStatus::WriteFailed
            }
        }
    }

    /// The command a timeout for `arm` refers to, if that arm is still pending.
    ///
    /// A timeout queued before its ack was handled, or before its command was
    /// replaced by a newer arm, is stale.
    fn expired(&self, conn: ConnectionId, arm: ArmId) -> Option<PendingCommand> {
        let pending = self.resend.timed_out(conn, arm);
        if pending.is_none() {
            tracing::debug!("[lifecycle] Stale ACK timeout on {} ({})", conn, arm);
        }
        pending
    }

    /// Strict ack timeout: give up on the peer entirely.
    fn strict_ack_timeout(&self, conn: ConnectionId, arm: ArmId) -> HandlerStatus {
        let Some(peer) = self.registry.lookup(conn) else {
            return HandlerStatus::UnknownPeer;
        };
        let Some(pending) = self.expired(conn, arm) else {
            return HandlerStatus::Handled;
        };
        self.resend.disarm(conn);
        self.registry.disconnect(conn);
        self.admin.close();
        tracing::warn!(
            "[lifecycle] No ACK from {} ({}) for {}, disconnected",
            peer.name,
            conn,
            pending.command
        );
        HandlerStatus::Handled
    }
}

#[async_trait]
impl<R, T, A, P, Z> LifecycleApi for LifecycleService<R, T, A, P, Z>
where
    R: PeerRegistry,
    T: ResendTimer,
    A: AdminChannel,
    P: ProcessRegistry,
    Z: Pacer,
{
    fn role(&self) -> Role {
        self.config.role
    }

    async fn dispatch(&self, event: LifecycleEvent) -> HandlerStatus {
        let role = self.config.role;
        let status = match event.clone() {
            LifecycleEvent::PeerMessage { conn, command } => match role {
                Role::ServiceVm => self.service_vm_command(conn, command).await,
                Role::UserVm => self.user_vm_command(conn, command).await,
            },
            LifecycleEvent::AckTimeout { conn, arm } => match role {
                Role::ServiceVm => self.service_vm_ack_timeout(conn, arm).await,
                Role::UserVm => self.strict_ack_timeout(conn, arm),
            },
            LifecycleEvent::Admin { client, request } => self.admin_request(client, request).await,
        };
        match status {
            HandlerStatus::Handled => tracing::trace!("[lifecycle] {:?} handled", event),
            other => tracing::debug!("[lifecycle] {:?} -> {:?}", event, other),
        }
        status
    }

    fn announce(&self) -> HandlerStatus {
        match self.config.role {
            Role::ServiceVm => HandlerStatus::Ignored,
            Role::UserVm => self.announce_sync(),
        }
    }

    fn shutdown_phase(&self) -> ShutdownPhase {
        self.orchestrator.phase()
    }
}
