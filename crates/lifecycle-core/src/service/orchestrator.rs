//! Shutdown Orchestrator
//!
//! Terminal, single-shot host shutdown sequence:
//!
//! ```text
//! [RUNNING] ──(Connection Set empty | explicit request)──→ [SEQUENCING] ──→ [COMPLETE]
//! ```
//!
//! 1. close the admin socket
//! 2. stop admitting peers
//! 3. wait (bounded) for guest device-model processes to exit
//! 4. set shutdown-complete
//!
//! The bounded wait never blocks past the configured timeout. Exhaustion is a
//! degraded success: the sequence finishes with a forced-poweroff warning.

use std::sync::Arc;

use crate::domain::{PollOutcome, ShutdownPhase, ShutdownPolicy, ShutdownState};
use crate::ports::{AdminChannel, Pacer, PeerRegistry, ProcessRegistry};

pub struct ShutdownOrchestrator<R, A, P, Z>
where
    R: PeerRegistry,
    A: AdminChannel,
    P: ProcessRegistry,
    Z: Pacer,
{
    policy: ShutdownPolicy,
    state: Arc<ShutdownState>,
    registry: Arc<R>,
    admin: Arc<A>,
    processes: Arc<P>,
    pacer: Arc<Z>,
}

impl<R, A, P, Z> ShutdownOrchestrator<R, A, P, Z>
where
    R: PeerRegistry,
    A: AdminChannel,
    P: ProcessRegistry,
    Z: Pacer,
{
    pub fn new(
        policy: ShutdownPolicy,
        state: Arc<ShutdownState>,
        registry: Arc<R>,
        admin: Arc<A>,
        processes: Arc<P>,
        pacer: Arc<Z>,
    ) -> Self {
        Self {
            policy,
            state,
            registry,
            admin,
            processes,
            pacer,
        }
    }

    pub fn phase(&self) -> ShutdownPhase {
        self.state.phase()
    }

    pub fn state(&self) -> Arc<ShutdownState> {
        Arc::clone(&self.state)
    }

    /// Start only once the Connection Set has drained.
    ///
    /// Returns `true` if this call ran the sequence.
    pub async fn try_start(&self) -> bool {
        if !self.registry.is_empty() {
            tracing::debug!(
                "[lifecycle] {} peer(s) still connected, shutdown deferred",
                self.registry.connected().len()
            );
            return false;
        }
        tracing::info!("[lifecycle] Connection set is empty, triggering system shutdown");
        self.start().await
    }

    /// Run the sequence unless it already ran. Returns `true` if this call ran it.
    pub async fn start(&self) -> bool {
        if !self.state.try_begin() {
            tracing::debug!("[lifecycle] Shutdown already in progress, ignoring trigger");
            return false;
        }

        self.admin.close();
        self.registry.stop_listening();

        match self.wait_device_models().await {
            PollOutcome::AllExited { rounds } => {
                tracing::info!(
                    "[lifecycle] All guest VMs exited after {} check(s), service VM powering off",
                    rounds
                );
            }
            PollOutcome::TimedOut { remaining } => {
                tracing::warn!(
                    "[lifecycle] Timeout waiting for VMs poweroff ({} still running), forcing poweroff",
                    remaining.map_or_else(|| "unknown".to_string(), |n| n.to_string())
                );
            }
        }

        self.state.mark_complete();
        true
    }

    /// Poll the process registry every `poll_interval` until the count hits
    /// zero or `timeout` is spent. The last check happens at the deadline.
    pub async fn wait_device_models(&self) -> PollOutcome {
        let rounds = self.policy.rounds();
        let mut remaining = None;

        for round in 0..=rounds {
            match self.processes.count_device_models() {
                Ok(0) => return PollOutcome::AllExited { rounds: round + 1 },
                Ok(count) => remaining = Some(count),
                Err(e) => tracing::warn!("[lifecycle] Failed to count device models: {}", e),
            }
            if round == rounds {
                break;
            }
            tracing::info!(
                "[lifecycle] Waiting for guest VMs to shut down: {} check(s) left, {} running",
                rounds - round,
                remaining.map_or_else(|| "unknown".to_string(), |n| n.to_string())
            );
            self.pacer.pause(self.policy.poll_interval).await;
        }

        PollOutcome::TimedOut { remaining }
    }
}
