//! # lifecycle-core
//!
//! Protocol state machine and shutdown orchestrator for the VM lifecycle
//! manager. A Service VM (host supervisor) and its User VMs (guest agents)
//! negotiate an ordered shutdown over one byte-stream channel per guest; a
//! local admin socket can trigger the same flows.
//!
//! ## Architecture
//!
//! Hexagonal, like the other subsystem crates:
//!
//! - **Domain** (`domain/`): `Command`, `AdminRequest`/`AdminReply`,
//!   `PeerInfo`, `ShutdownState`, `LifecycleConfig`. No I/O.
//! - **Ports** (`ports/`): `LifecycleApi` (driving) and `PeerRegistry`,
//!   `ResendTimer`, `AdminChannel`, `ProcessRegistry`, `Pacer` (driven).
//! - **Service** (`service/`): `LifecycleService` with one handler table per
//!   `Role`, the admin bridge, `ResendPolicy` and `ShutdownOrchestrator`.
//! - **Events** (`events/`): `LifecycleEvent`, the only input to dispatch.
//!
//! ## Shutdown Flow (Service VM)
//!
//! ```text
//! admin REQ_SYS_SHUTDOWN ─┐
//!                         ├──→ arm + broadcast POWEROFF_CMD ──→ [guest 1..n]
//! allow-listed guest ─────┘                                        │
//!   REQ_SYS_SHUTDOWN                        ACK_POWEROFF / ack timeout
//!                                                                  │
//!                                       disarm, drop from Connection Set
//!                                                                  │
//!                                              set empty? ──→ ShutdownOrchestrator (once)
//! ```
//!
//! ## Failure Policy
//!
//! - Unknown peer: silent no-op
//! - Unauthorized REQ_SYS_SHUTDOWN: logged, no reply
//! - Write failure: logged, retried only by the resend timer
//! - POWEROFF_CMD ack timeout: treated as ACK_POWEROFF
//! - Process wait timeout: shutdown proceeds with a warning

pub mod domain;
pub mod error;
pub mod events;
pub mod ports;
pub mod service;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use domain::*;
pub use error::{
    ConfigError, LifecycleError, LifecycleResult, ParseError, ProcessQueryError, TransportError,
};
pub use events::LifecycleEvent;
pub use ports::{
    AdminChannel, HandlerStatus, LifecycleApi, Pacer, PeerRegistry, ProcessRegistry, ResendTimer,
};
pub use service::{LifecycleService, ResendPolicy, ShutdownOrchestrator};
