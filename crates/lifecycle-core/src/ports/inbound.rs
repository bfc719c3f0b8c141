//! Driving Ports (API - Inbound)

use async_trait::async_trait;

use crate::domain::{Role, ShutdownPhase};
use crate::events::LifecycleEvent;

/// Advisory result of one handler run.
///
/// Only ever logged by the caller; no status changes control flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandlerStatus {
    /// The handler ran to completion.
    Handled,
    /// The connection id did not resolve to a connected peer.
    UnknownPeer,
    /// The admin client was gone before the reply could be staged.
    UnknownClient,
    /// The peer is not on the allow-list for this request.
    Unauthorized,
    /// The message has no handler in the active role's table.
    Ignored,
    /// The handler ran but a transport write failed.
    WriteFailed,
}

/// Lifecycle manager entry point used by the daemon's event loop.
#[async_trait]
pub trait LifecycleApi: Send + Sync {
    /// Handler table in use.
    fn role(&self) -> Role;

    /// Run the handler for one event to completion.
    async fn dispatch(&self, event: LifecycleEvent) -> HandlerStatus;

    /// User VM startup announcement (SYNC with resend). No-op on the Service VM.
    fn announce(&self) -> HandlerStatus;

    fn shutdown_phase(&self) -> ShutdownPhase;

    /// The outer run loop exits once this is set.
    fn is_shutdown_complete(&self) -> bool {
        self.shutdown_phase() == ShutdownPhase::Complete
    }
}
