//! # Lifecycle Daemon
//!
//! Host side of the VM lifecycle manager: the `life-mngr` binary and the
//! pieces it is assembled from.
//!
//! ## Modular Structure
//!
//! - `container/` - configuration and adapter construction
//! - `adapters/` - tokio implementations of the core's driven ports
//! - `wiring/` - the dispatch loop and stop handling
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (file, then `LM_*` environment overrides)
//! 2. Validate it
//! 3. Open channel devices and bind the admin socket
//! 4. Announce (User VM only) and dispatch events
//! 5. Exit once the shutdown sequence completes or a stop signal arrives

pub mod adapters;
pub mod container;
pub mod wiring;

pub use container::{DaemonConfig, DaemonConfigError, DaemonContainer, DaemonService};
pub use wiring::{run_daemon, run_event_loop, LoopExit};
