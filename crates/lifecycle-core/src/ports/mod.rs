//! # Ports Layer
//!
//! - `inbound`: the API the daemon drives ([`LifecycleApi`])
//! - `outbound`: the collaborators the core drives (registry, timers, admin
//!   socket, process registry, pacer)

pub mod inbound;
pub mod outbound;

pub use inbound::{HandlerStatus, LifecycleApi};
pub use outbound::{AdminChannel, Pacer, PeerRegistry, ProcessRegistry, ResendTimer};
