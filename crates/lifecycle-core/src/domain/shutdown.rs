//! # Shutdown State
//!
//! Two write-once flags shared by the orchestrator, the handlers and the outer
//! run loop:
//!
//! ```text
//! [RUNNING] ──try_begin()──→ [SEQUENCING] ──mark_complete()──→ [COMPLETE]
//!     │                                                            ↑
//!     └──────────────── mark_complete() (User VM path) ────────────┘
//! ```
//!
//! Neither flag is ever reset. `try_begin` is a compare-and-set so concurrent
//! triggers cannot both enter the sequence.

use std::sync::atomic::{AtomicBool, Ordering};

/// Observable phase derived from the two flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShutdownPhase {
    Running,
    Sequencing,
    Complete,
}

/// Process-wide shutdown latch and completion flag.
#[derive(Debug, Default)]
pub struct ShutdownState {
    started: AtomicBool,
    complete: AtomicBool,
}

impl ShutdownState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the shutdown sequence. Returns `true` for exactly one caller.
    pub fn try_begin(&self) -> bool {
        self.started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Signal the outer run loop to exit.
    pub fn mark_complete(&self) {
        self.complete.store(true, Ordering::Release);
    }

    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }

    pub fn phase(&self) -> ShutdownPhase {
        if self.is_complete() {
            ShutdownPhase::Complete
        } else if self.is_started() {
            ShutdownPhase::Sequencing
        } else {
            ShutdownPhase::Running
        }
    }
}

/// Result of the bounded wait for guest device-model processes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    /// Count reached zero after `rounds` queries.
    AllExited { rounds: u32 },
    /// Timeout exhausted; `remaining` is the last count observed, if any query succeeded.
    TimedOut { remaining: Option<usize> },
}

impl PollOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PollOutcome::AllExited { .. })
    }
}
