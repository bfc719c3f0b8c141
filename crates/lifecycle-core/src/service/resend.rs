//! Resend Policy
//!
//! One outstanding command per peer. Arming records the command and starts
//! the collaborator's retransmission timer; disarming clears both. The policy
//! never looks inside the command beyond remembering which one is pending.
//!
//! Each arm is tagged with a fresh [`ArmId`]. A timeout already queued when
//! its arm was disarmed or replaced no longer matches and is dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::domain::{ArmId, Command, ConnectionId, PendingCommand};
use crate::ports::ResendTimer;

pub struct ResendPolicy<T: ResendTimer> {
    timer: Arc<T>,
    pending: Mutex<HashMap<ConnectionId, PendingCommand>>,
    next_arm: AtomicU64,
}

impl<T: ResendTimer> ResendPolicy<T> {
    pub fn new(timer: Arc<T>) -> Self {
        Self {
            timer,
            pending: Mutex::new(HashMap::new()),
            next_arm: AtomicU64::new(1),
        }
    }

    /// Retransmit `command` to `conn` until acknowledged, at most `budget` times.
    ///
    /// Replaces whatever was pending for `conn`.
    pub fn arm(&self, conn: ConnectionId, command: Command, budget: u32) -> ArmId {
        let arm = ArmId(self.next_arm.fetch_add(1, Ordering::Relaxed));
        let replaced = self.pending.lock().insert(
            conn,
            PendingCommand {
                arm,
                command,
                budget,
            },
        );
        if let Some(previous) = replaced {
            tracing::debug!(
                "[lifecycle] {} replaces pending {} on {}",
                command,
                previous.command,
                conn
            );
            self.timer.cancel(conn);
        }
        self.timer.start(conn, arm, command, budget);
        arm
    }

    /// Stop retransmitting to `conn`. Returns what was pending, if anything.
    pub fn disarm(&self, conn: ConnectionId) -> Option<PendingCommand> {
        let removed = self.pending.lock().remove(&conn);
        if removed.is_some() {
            self.timer.cancel(conn);
        }
        removed
    }

    pub fn pending(&self, conn: ConnectionId) -> Option<PendingCommand> {
        self.pending.lock().get(&conn).copied()
    }

    /// The pending command for `conn`, only if it is still the one armed as `arm`.
    pub fn timed_out(&self, conn: ConnectionId, arm: ArmId) -> Option<PendingCommand> {
        self.pending(conn).filter(|pending| pending.arm == arm)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}
