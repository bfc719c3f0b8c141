//! # Dispatch Loop
//!
//! ```text
//! uart readers ──┐
//! resend timers ─┼──→ mpsc ──→ run_event_loop ──→ LifecycleApi::dispatch
//! admin clients ─┘                   │
//!                                    └── exits on shutdown-complete or stop signal
//! ```
//!
//! Events are dispatched one at a time; a handler's settle delays and the
//! orchestrator's bounded wait hold the loop, never the producers.

use std::future::Future;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use lifecycle_core::{HandlerStatus, LifecycleApi, LifecycleEvent};

/// Why the dispatch loop returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopExit {
    /// The shutdown sequence finished.
    ShutdownComplete,
    /// The stop future resolved (Ctrl-C or SIGTERM).
    Stopped,
    /// Every producer went away.
    EventsClosed,
}

/// Announce, then dispatch events until shutdown completes or `stop` resolves.
pub async fn run_event_loop<S, F>(
    service: &S,
    events: &mut mpsc::Receiver<LifecycleEvent>,
    stop: F,
) -> LoopExit
where
    S: LifecycleApi + ?Sized,
    F: Future<Output = ()>,
{
    tokio::pin!(stop);

    match service.announce() {
        HandlerStatus::Handled | HandlerStatus::Ignored => {}
        other => warn!("[daemon] Startup announcement failed: {:?}", other),
    }

    loop {
        if service.is_shutdown_complete() {
            info!("[daemon] Shutdown sequence complete");
            return LoopExit::ShutdownComplete;
        }
        tokio::select! {
            biased;
            _ = &mut stop => {
                info!("[daemon] Stop requested, leaving without shutdown sequence");
                return LoopExit::Stopped;
            }
            event = events.recv() => match event {
                Some(event) => {
                    let status = service.dispatch(event).await;
                    debug!("[daemon] Dispatch finished: {:?}", status);
                }
                None => {
                    warn!("[daemon] Event producers closed");
                    return LoopExit::EventsClosed;
                }
            },
        }
    }
}

/// Resolves on Ctrl-C or SIGTERM.
pub async fn stop_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
                return;
            }
            Err(e) => warn!("[daemon] SIGTERM handler unavailable: {}", e),
        }
    }
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("[daemon] Ctrl-C handler unavailable: {}", e);
        std::future::pending::<()>().await;
    }
}
