//! Lifecycle manager configuration and validation
//!
//! Holds the Role, the authorization allow-list, retry budgets, settle delays
//! and the bounded-poll policy. Immutable once handed to the service.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Which handler table this process runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Host-side supervisor tracking many guests.
    #[default]
    ServiceVm,
    /// Guest-side agent tracking exactly one upstream peer.
    UserVm,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::ServiceVm => f.write_str("service_vm"),
            Role::UserVm => f.write_str("user_vm"),
        }
    }
}

/// Retransmission budgets, in attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryBudgets {
    /// POWEROFF_CMD broadcast to every connected guest.
    pub broadcast: u32,
    /// Single-peer requests (USER_VM_SHUTDOWN, forwarded REQ_SYS_SHUTDOWN).
    pub targeted: u32,
    /// User VM startup SYNC.
    pub sync: u32,
}

impl Default for RetryBudgets {
    fn default() -> Self {
        Self {
            broadcast: 10,
            targeted: 3,
            sync: 5,
        }
    }
}

/// Protocol pacing delays.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SettleDelays {
    /// After answering SYNC, and after a User VM acks a poweroff.
    pub after_reply: Duration,
    /// Between the ACK_REQ_SYS_SHUTDOWN reply and the POWEROFF_CMD broadcast.
    pub before_broadcast: Duration,
    /// After ACK_POWEROFF, before checking the Connection Set.
    pub after_poweroff_ack: Duration,
    /// Before serving an admin request.
    pub admin: Duration,
}

impl Default for SettleDelays {
    fn default() -> Self {
        Self {
            after_reply: Duration::from_secs(2),
            before_broadcast: Duration::from_secs(1),
            after_poweroff_ack: Duration::from_secs(10),
            admin: Duration::from_secs(6),
        }
    }
}

/// Bounded wait for guest device-model processes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShutdownPolicy {
    /// Upper bound on the whole wait.
    pub timeout: Duration,
    /// Length of one polling round.
    pub poll_interval: Duration,
}

impl ShutdownPolicy {
    /// Number of polling rounds that fit inside the timeout.
    pub fn rounds(&self) -> u32 {
        let interval = self.poll_interval.as_millis().max(1);
        (self.timeout.as_millis() / interval).min(u32::MAX as u128) as u32
    }
}

impl Default for ShutdownPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            poll_interval: Duration::from_secs(5),
        }
    }
}

/// Complete configuration consumed by the lifecycle service.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct LifecycleConfig {
    pub role: Role,
    /// The one device path allowed to request host shutdown (Service VM only).
    pub allowed_s5_device: PathBuf,
    pub retry: RetryBudgets,
    pub settle: SettleDelays,
    pub shutdown: ShutdownPolicy,
}

impl LifecycleConfig {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            ..Default::default()
        }
    }

    /// Reject configurations that would stall or disable the protocol.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.broadcast == 0 || self.retry.targeted == 0 || self.retry.sync == 0 {
            return Err(ConfigError::ZeroRetryBudget);
        }
        if self.shutdown.poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        if self.shutdown.poll_interval > self.shutdown.timeout {
            return Err(ConfigError::PollIntervalExceedsTimeout {
                interval_ms: self.shutdown.poll_interval.as_millis() as u64,
                timeout_ms: self.shutdown.timeout.as_millis() as u64,
            });
        }
        if self.role == Role::ServiceVm && self.allowed_s5_device.as_os_str().is_empty() {
            return Err(ConfigError::MissingAllowedDevice);
        }
        Ok(())
    }

    pub fn with_allowed_s5_device(mut self, path: impl Into<PathBuf>) -> Self {
        self.allowed_s5_device = path.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryBudgets) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_settle(mut self, settle: SettleDelays) -> Self {
        self.settle = settle;
        self
    }

    pub fn with_shutdown(mut self, shutdown: ShutdownPolicy) -> Self {
        self.shutdown = shutdown;
        self
    }
}
