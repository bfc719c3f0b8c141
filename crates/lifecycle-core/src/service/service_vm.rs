//! Service VM handler table: messages from guests.

use super::LifecycleService;
use crate::domain::{ArmId, Command, ConnectionId};
use crate::ports::{AdminChannel, HandlerStatus, Pacer, PeerRegistry, ProcessRegistry, ResendTimer};

impl<R, T, A, P, Z> LifecycleService<R, T, A, P, Z>
where
    R: PeerRegistry,
    T: ResendTimer,
    A: AdminChannel,
    P: ProcessRegistry,
    Z: Pacer,
{
    pub(super) async fn service_vm_command(
        &self,
        conn: ConnectionId,
        command: Command,
    ) -> HandlerStatus {
        match command {
            Command::Sync => self.on_sync(conn).await,
            Command::ReqSysShutdown => self.on_req_sys_shutdown(conn).await,
            Command::AckPoweroff => self.on_ack_poweroff(conn).await,
            Command::AckUserVmShutdown => self.on_ack_user_vm_shutdown(conn),
            Command::AckSync
            | Command::AckReqSysShutdown
            | Command::PoweroffCmd
            | Command::UserVmShutdown => {
                tracing::debug!("[lifecycle] {} from {} has no service VM handler", command, conn);
                HandlerStatus::Ignored
            }
        }
    }

    async fn on_sync(&self, conn: ConnectionId) -> HandlerStatus {
        let Some(peer) = self.registry.lookup(conn) else {
            return HandlerStatus::UnknownPeer;
        };
        let status = self.send_logged(conn, Command::AckSync);
        tracing::info!("[lifecycle] SYNC from user VM {}, start to talk", peer.name);
        self.pacer.pause(self.config.settle.after_reply).await;
        status
    }

    /// Host-wide shutdown requested by a guest. Only the allow-listed device may ask.
    async fn on_req_sys_shutdown(&self, conn: ConnectionId) -> HandlerStatus {
        let Some(peer) = self.registry.lookup(conn) else {
            return HandlerStatus::UnknownPeer;
        };
        if !peer.is_allowed_s5(&self.config.allowed_s5_device) {
            tracing::warn!(
                "[lifecycle] User VM {} ({}) is not allowed to trigger system shutdown",
                peer.name,
                peer.device_path.display()
            );
            return HandlerStatus::Unauthorized;
        }

        tracing::info!("[lifecycle] Shutdown request from user VM {}", peer.name);
        let status = self.send_logged(conn, Command::AckReqSysShutdown);
        self.pacer.pause(self.config.settle.before_broadcast).await;
        self.broadcast_poweroff();
        self.pacer.pause(self.config.settle.after_reply).await;
        status
    }

    /// A guest confirmed poweroff (or is presumed to have, after a timeout).
    pub(super) async fn on_ack_poweroff(&self, conn: ConnectionId) -> HandlerStatus {
        let Some(peer) = self.registry.lookup(conn) else {
            return HandlerStatus::UnknownPeer;
        };
        tracing::info!("[lifecycle] Poweroff ACK from user VM {}", peer.name);
        self.resend.disarm(conn);
        self.registry.disconnect(conn);
        self.pacer.pause(self.config.settle.after_poweroff_ack).await;
        self.orchestrator.try_start().await;
        HandlerStatus::Handled
    }

    fn on_ack_user_vm_shutdown(&self, conn: ConnectionId) -> HandlerStatus {
        let Some(peer) = self.registry.lookup(conn) else {
            return HandlerStatus::UnknownPeer;
        };
        tracing::info!("[lifecycle] User VM shutdown ACK from {}", peer.name);
        self.resend.disarm(conn);
        HandlerStatus::Handled
    }

    /// POWEROFF_CMD timeouts fail open; forwarded requests fail hard; the rest just stop.
    pub(super) async fn service_vm_ack_timeout(
        &self,
        conn: ConnectionId,
        arm: ArmId,
    ) -> HandlerStatus {
        if self.registry.lookup(conn).is_none() {
            return HandlerStatus::UnknownPeer;
        }
        let Some(pending) = self.expired(conn, arm) else {
            return HandlerStatus::Handled;
        };
        match pending.command {
            Command::PoweroffCmd => {
                tracing::warn!(
                    "[lifecycle] No poweroff ACK from {}, assuming it powered off",
                    conn
                );
                self.on_ack_poweroff(conn).await
            }
            Command::ReqSysShutdown => self.strict_ack_timeout(conn, arm),
            other => {
                tracing::info!("[lifecycle] ACK timeout on {} for {}, giving up", conn, other);
                self.resend.disarm(conn);
                HandlerStatus::Handled
            }
        }
    }
}
