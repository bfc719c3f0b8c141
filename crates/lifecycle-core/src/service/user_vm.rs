//! User VM handler table: messages from the single upstream Service VM.

use super::LifecycleService;
use crate::domain::{Command, ConnectionId};
use crate::ports::{AdminChannel, HandlerStatus, Pacer, PeerRegistry, ProcessRegistry, ResendTimer};

impl<R, T, A, P, Z> LifecycleService<R, T, A, P, Z>
where
    R: PeerRegistry,
    T: ResendTimer,
    A: AdminChannel,
    P: ProcessRegistry,
    Z: Pacer,
{
    pub(super) async fn user_vm_command(
        &self,
        conn: ConnectionId,
        command: Command,
    ) -> HandlerStatus {
        match command {
            Command::AckSync => self.on_ack(conn, Command::AckSync),
            Command::AckReqSysShutdown => self.on_ack(conn, Command::AckReqSysShutdown),
            Command::PoweroffCmd => self.shutdown_self(conn, Command::AckPoweroff).await,
            Command::UserVmShutdown => self.shutdown_self(conn, Command::AckUserVmShutdown).await,
            Command::Sync
            | Command::ReqSysShutdown
            | Command::AckPoweroff
            | Command::AckUserVmShutdown => {
                tracing::debug!("[lifecycle] {} from {} has no user VM handler", command, conn);
                HandlerStatus::Ignored
            }
        }
    }

    fn on_ack(&self, conn: ConnectionId, ack: Command) -> HandlerStatus {
        if self.registry.lookup(conn).is_none() {
            return HandlerStatus::UnknownPeer;
        }
        self.resend.disarm(conn);
        tracing::info!("[lifecycle] {} from service VM", ack);
        HandlerStatus::Handled
    }

    /// POWEROFF_CMD and USER_VM_SHUTDOWN converge here; only the echoed ack differs.
    async fn shutdown_self(&self, conn: ConnectionId, ack: Command) -> HandlerStatus {
        if self.registry.lookup(conn).is_none() {
            return HandlerStatus::UnknownPeer;
        }
        tracing::info!("[lifecycle] Poweroff requested by service VM, replying {}", ack);
        let status = self.send_logged(conn, ack);
        self.resend.disarm(conn);
        self.registry.disconnect(conn);
        self.pacer.pause(self.config.settle.after_reply).await;
        self.admin.close();
        self.orchestrator.state().mark_complete();
        status
    }

    /// Startup SYNC to the upstream peer, retransmitted until ACK_SYNC.
    pub(super) fn announce_sync(&self) -> HandlerStatus {
        let Some(upstream) = self.registry.first_connected() else {
            tracing::warn!("[lifecycle] No service VM channel to announce on");
            return HandlerStatus::UnknownPeer;
        };
        self.resend
            .arm(upstream.conn, Command::Sync, self.config.retry.sync);
        tracing::info!("[lifecycle] Announcing to service VM over {}", upstream.device_path.display());
        self.send_logged(upstream.conn, Command::Sync)
    }
}
