//! Error types for the lifecycle core
//!
//! None of these escape a handler: dispatch degrades every failure to a log
//! line and an advisory [`HandlerStatus`](crate::ports::HandlerStatus).

use thiserror::Error;

use crate::domain::{ClientId, ConnectionId};

/// Token parsing failures at the transport boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown protocol command: {0:?}")]
    UnknownCommand(String),

    #[error("unknown admin request: {0:?}")]
    UnknownAdminRequest(String),

    #[error("unknown admin reply: {0:?}")]
    UnknownAdminReply(String),

    #[error("admin request is missing a VM name")]
    MissingVmName,
}

/// Failures writing to a peer channel or admin client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("no channel device for {0}")]
    UnknownPeer(ConnectionId),

    #[error("no admin client {0}")]
    UnknownClient(ClientId),

    #[error("write to {target} failed: {reason}")]
    WriteFailed { target: String, reason: String },

    #[error("channel closed")]
    Closed,
}

/// Failures querying the host process registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessQueryError {
    #[error("process registry unavailable: {0}")]
    Unavailable(String),
}

/// Rejected configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("retry budgets must be at least 1")]
    ZeroRetryBudget,

    #[error("shutdown poll interval must be non-zero")]
    ZeroPollInterval,

    #[error("shutdown poll interval {interval_ms}ms exceeds timeout {timeout_ms}ms")]
    PollIntervalExceedsTimeout { interval_ms: u64, timeout_ms: u64 },

    #[error("service VM role requires an allowed S5 device path")]
    MissingAllowedDevice,
}

/// Umbrella error for callers that wire the core together.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    ProcessQuery(#[from] ProcessQueryError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;
