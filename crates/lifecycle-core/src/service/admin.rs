//! Socket-Admin Bridge
//!
//! Turns admin socket requests into the same protocol actions peers trigger.
//! Every request waits out the admin settle delay, then answers the client
//! before any channel traffic. If the client is gone, nothing is sent.

use super::LifecycleService;
use crate::domain::{AdminReply, AdminRequest, ClientId, Command, Role};
use crate::ports::{AdminChannel, HandlerStatus, Pacer, PeerRegistry, ProcessRegistry, ResendTimer};

impl<R, T, A, P, Z> LifecycleService<R, T, A, P, Z>
where
    R: PeerRegistry,
    T: ResendTimer,
    A: AdminChannel,
    P: ProcessRegistry,
    Z: Pacer,
{
    pub(super) async fn admin_request(
        &self,
        client: ClientId,
        request: AdminRequest,
    ) -> HandlerStatus {
        self.pacer.pause(self.config.settle.admin).await;
        match (self.config.role, request) {
            (Role::ServiceVm, AdminRequest::SystemShutdown) => self.host_shutdown(client).await,
            (Role::ServiceVm, AdminRequest::UserVmShutdown { vm_name }) => {
                self.guest_shutdown(client, &vm_name)
            }
            (Role::UserVm, AdminRequest::SystemShutdown) => self.forward_system_shutdown(client),
            (Role::UserVm, AdminRequest::UserVmShutdown { vm_name }) => {
                tracing::warn!(
                    "[admin] {} asked a user VM to shut down guest {}, ignored",
                    client,
                    vm_name
                );
                HandlerStatus::Ignored
            }
        }
    }

    fn ack_client(&self, client: ClientId, reply: AdminReply) -> bool {
        match self.admin.reply(client, reply) {
            Ok(()) => {
                tracing::info!("[admin] Sent {} to {}", reply, client);
                true
            }
            Err(e) => {
                tracing::warn!("[admin] Failed to send {} to {}: {}", reply, client, e);
                false
            }
        }
    }

    async fn host_shutdown(&self, client: ClientId) -> HandlerStatus {
        tracing::info!("[admin] System shutdown requested by {}", client);
        if !self.ack_client(client, AdminReply::AckReqSysShutdown) {
            return HandlerStatus::UnknownClient;
        }
        self.broadcast_poweroff();
        // Nothing connected means nothing will ever ack; start right away.
        self.orchestrator.try_start().await;
        HandlerStatus::Handled
    }

    fn guest_shutdown(&self, client: ClientId, vm_name: &str) -> HandlerStatus {
        let Some(peer) = self.registry.lookup_by_name(vm_name) else {
            tracing::info!("[admin] No channel to user VM {}, reporting disconnect", vm_name);
            self.ack_client(client, AdminReply::UserVmDisconnect);
            return HandlerStatus::Handled;
        };
        if !self.ack_client(client, AdminReply::AckReqUserVmShutdown) {
            return HandlerStatus::UnknownClient;
        }
        tracing::info!("[admin] Forwarding guest shutdown to user VM {}", peer.name);
        self.resend
            .arm(peer.conn, Command::UserVmShutdown, self.config.retry.targeted);
        self.send_logged(peer.conn, Command::UserVmShutdown)
    }

    fn forward_system_shutdown(&self, client: ClientId) -> HandlerStatus {
        let Some(upstream) = self.registry.first_connected() else {
            tracing::info!("[admin] Service VM channel is disconnected");
            self.ack_client(client, AdminReply::UserVmDisconnect);
            return HandlerStatus::Handled;
        };
        if !self.ack_client(client, AdminReply::AckReqSysShutdown) {
            return HandlerStatus::UnknownClient;
        }
        tracing::info!("[admin] Forwarding system shutdown request to service VM");
        self.resend
            .arm(upstream.conn, Command::ReqSysShutdown, self.config.retry.targeted);
        self.send_logged(upstream.conn, Command::ReqSysShutdown)
    }
}
