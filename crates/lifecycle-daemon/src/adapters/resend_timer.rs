//! Resend timer backed by one tokio task per armed connection.
//!
//! The task resends the command every `interval` until its budget is spent,
//! then waits one more interval and reports `LifecycleEvent::AckTimeout`
//! tagged with the arm it was started for. Re-arming or cancelling aborts the
//! previous task; a timeout it already queued is recognised as stale by its arm.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use lifecycle_core::{ArmId, Command, ConnectionId, LifecycleEvent, PeerRegistry, ResendTimer};

pub struct TokioResendTimer<R: PeerRegistry + 'static> {
    registry: Arc<R>,
    events: mpsc::Sender<LifecycleEvent>,
    interval: Duration,
    tasks: Mutex<HashMap<ConnectionId, JoinHandle<()>>>,
}

impl<R: PeerRegistry + 'static> TokioResendTimer<R> {
    pub fn new(registry: Arc<R>, events: mpsc::Sender<LifecycleEvent>, interval: Duration) -> Self {
        Self {
            registry,
            events,
            interval,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Connections with a timer task that has not finished.
    pub fn active(&self) -> usize {
        self.tasks.lock().values().filter(|t| !t.is_finished()).count()
    }
}

impl<R: PeerRegistry + 'static> ResendTimer for TokioResendTimer<R> {
    fn start(&self, conn: ConnectionId, arm: ArmId, command: Command, budget: u32) {
        let registry = Arc::clone(&self.registry);
        let events = self.events.clone();
        let interval = self.interval;

        let task = tokio::spawn(async move {
            for attempt in 1..=budget {
                tokio::time::sleep(interval).await;
                match registry.send(conn, command) {
                    Ok(()) => debug!("[uart] Resent {} to {} ({}/{})", command, conn, attempt, budget),
                    Err(e) => warn!("[uart] Resend of {} to {} failed: {}", command, conn, e),
                }
            }
            tokio::time::sleep(interval).await;
            let _ = events.send(LifecycleEvent::AckTimeout { conn, arm }).await;
        });

        if let Some(previous) = self.tasks.lock().insert(conn, task) {
            previous.abort();
        }
    }

    fn cancel(&self, conn: ConnectionId) {
        if let Some(task) = self.tasks.lock().remove(&conn) {
            task.abort();
        }
    }
}

impl<R: PeerRegistry + 'static> Drop for TokioResendTimer<R> {
    fn drop(&mut self) {
        for (_, task) in self.tasks.lock().drain() {
            task.abort();
        }
    }
}
