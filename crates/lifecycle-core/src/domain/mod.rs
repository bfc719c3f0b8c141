//! # Domain Layer
//!
//! Pure types with no I/O: the protocol vocabulary, peer identity, shutdown
//! flags and configuration.

mod command;
mod config;
mod peer;
mod shutdown;

pub use command::*;
pub use config::*;
pub use peer::*;
pub use shutdown::*;

use std::fmt;

/// Identifies one arming of the resend timer.
///
/// Every `arm` gets a fresh id; an ack timeout carrying an older id belongs
/// to a command that has since been acknowledged or replaced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArmId(pub u64);

impl fmt::Display for ArmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "arm#{}", self.0)
    }
}

/// Command awaiting acknowledgment from a peer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingCommand {
    pub arm: ArmId,
    pub command: Command,
    /// Retransmissions allowed before the timer reports an ack timeout.
    pub budget: u32,
}
