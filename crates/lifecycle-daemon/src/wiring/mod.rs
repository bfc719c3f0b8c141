//! # Wiring
//!
//! Connects the adapters' event producers to the lifecycle service and owns
//! the daemon's top-level run/exit sequence.

pub mod event_loop;

pub use event_loop::{run_event_loop, stop_signal, LoopExit};

use anyhow::Result;
use tracing::info;

use crate::container::{DaemonConfig, DaemonContainer};

/// Build the container and run the dispatch loop until it exits.
pub async fn run_daemon(config: DaemonConfig) -> Result<LoopExit> {
    let (container, mut events) = DaemonContainer::build(config)?;
    info!(
        "[daemon] Admin socket at {}, running as {}",
        container.admin.path().display(),
        container.config.role
    );

    let exit = run_event_loop(container.service.as_ref(), &mut events, stop_signal()).await;
    info!("[daemon] Exiting: {:?}", exit);
    Ok(exit)
}
