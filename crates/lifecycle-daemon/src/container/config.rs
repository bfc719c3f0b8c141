//! # Daemon Configuration
//!
//! TOML file with a default for every field, then environment overrides.
//!
//! ```toml
//! role = "service_vm"
//! vm_name = "service_vm"
//! allow_s5_device = "/dev/ttyS1"
//!
//! [[channel]]
//! name = "vm1"
//! device = "/dev/ttyS1"
//!
//! [socket]
//! path = "/var/lib/life_mngr/monitor.sock"
//!
//! [retry]
//! broadcast = 10
//! targeted = 3
//! sync = 5
//! interval_ms = 2000
//!
//! [timing]
//! after_reply_ms = 2000
//! before_broadcast_ms = 1000
//! after_poweroff_ack_ms = 10000
//! admin_ms = 6000
//!
//! [shutdown]
//! timeout_secs = 300
//! poll_interval_secs = 5
//! device_model = "acrn-dm"
//! proc_root = "/proc"
//! ```
//!
//! ## Environment Overrides
//!
//! - `LM_ROLE` - `service_vm` or `user_vm`
//! - `LM_SOCKET_PATH` - admin socket path

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use lifecycle_core::{
    ConfigError, LifecycleConfig, RetryBudgets, Role, SettleDelays, ShutdownPolicy,
};

pub const ENV_ROLE: &str = "LM_ROLE";
pub const ENV_SOCKET_PATH: &str = "LM_SOCKET_PATH";

/// Errors loading or validating the daemon configuration.
#[derive(Debug, Error)]
pub enum DaemonConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid role {0:?}, expected service_vm or user_vm")]
    InvalidRole(String),

    #[error("user VM role needs exactly one channel to the service VM, found {0}")]
    UpstreamChannelCount(usize),

    #[error("duplicate channel name {0:?}")]
    DuplicateChannel(String),

    #[error("retry.interval_ms must be greater than zero")]
    ZeroResendInterval,

    #[error(transparent)]
    Lifecycle(#[from] ConfigError),
}

/// Complete daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    pub role: Role,
    /// This VM's own name, used in log lines.
    pub vm_name: String,
    /// The guest channel device allowed to request host shutdown.
    pub allow_s5_device: PathBuf,
    #[serde(rename = "channel")]
    pub channels: Vec<ChannelConfig>,
    pub socket: SocketConfig,
    pub retry: RetryConfig,
    pub timing: TimingConfig,
    pub shutdown: ShutdownConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            role: Role::ServiceVm,
            vm_name: "service_vm".to_string(),
            allow_s5_device: PathBuf::new(),
            channels: Vec::new(),
            socket: SocketConfig::default(),
            retry: RetryConfig::default(),
            timing: TimingConfig::default(),
            shutdown: ShutdownConfig::default(),
        }
    }
}

/// One serial channel: the Service VM has one per guest, a User VM exactly one.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelConfig {
    /// Peer VM name, matched by targeted shutdown requests.
    pub name: String,
    pub device: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SocketConfig {
    pub path: PathBuf,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/lib/life_mngr/monitor.sock"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub broadcast: u32,
    pub targeted: u32,
    pub sync: u32,
    /// Time between resends of an unacknowledged command.
    pub interval_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let budgets = RetryBudgets::default();
        Self {
            broadcast: budgets.broadcast,
            targeted: budgets.targeted,
            sync: budgets.sync,
            interval_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimingConfig {
    pub after_reply_ms: u64,
    pub before_broadcast_ms: u64,
    pub after_poweroff_ack_ms: u64,
    pub admin_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        let settle = SettleDelays::default();
        Self {
            after_reply_ms: settle.after_reply.as_millis() as u64,
            before_broadcast_ms: settle.before_broadcast.as_millis() as u64,
            after_poweroff_ack_ms: settle.after_poweroff_ack.as_millis() as u64,
            admin_ms: settle.admin.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShutdownConfig {
    pub timeout_secs: u64,
    pub poll_interval_secs: u64,
    /// Executable name of the guest device-model process.
    pub device_model: String,
    pub proc_root: PathBuf,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        let policy = ShutdownPolicy::default();
        Self {
            timeout_secs: policy.timeout.as_secs(),
            poll_interval_secs: policy.poll_interval.as_secs(),
            device_model: "acrn-dm".to_string(),
            proc_root: PathBuf::from("/proc"),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DaemonConfigError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|source| DaemonConfigError::Io {
            path: path.as_ref().display().to_string(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self, DaemonConfigError> {
        toml::from_str(content).map_err(|e| DaemonConfigError::Parse(e.to_string()))
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), DaemonConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), DaemonConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(role) = lookup(ENV_ROLE) {
            self.role = match role.trim() {
                "service_vm" => Role::ServiceVm,
                "user_vm" => Role::UserVm,
                other => return Err(DaemonConfigError::InvalidRole(other.to_string())),
            };
        }
        if let Some(path) = lookup(ENV_SOCKET_PATH) {
            self.socket.path = PathBuf::from(path);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), DaemonConfigError> {
        self.lifecycle_config().validate()?;
        if self.retry.interval_ms == 0 {
            return Err(DaemonConfigError::ZeroResendInterval);
        }
        if self.role == Role::UserVm && self.channels.len() != 1 {
            return Err(DaemonConfigError::UpstreamChannelCount(self.channels.len()));
        }
        let mut names = std::collections::HashSet::new();
        for channel in &self.channels {
            if !names.insert(channel.name.as_str()) {
                return Err(DaemonConfigError::DuplicateChannel(channel.name.clone()));
            }
        }
        Ok(())
    }

    pub fn resend_interval(&self) -> Duration {
        Duration::from_millis(self.retry.interval_ms)
    }

    /// The subset consumed by the lifecycle service.
    pub fn lifecycle_config(&self) -> LifecycleConfig {
        LifecycleConfig::new(self.role)
            .with_allowed_s5_device(self.allow_s5_device.clone())
            .with_retry(RetryBudgets {
                broadcast: self.retry.broadcast,
                targeted: self.retry.targeted,
                sync: self.retry.sync,
            })
            .with_settle(SettleDelays {
                after_reply: Duration::from_millis(self.timing.after_reply_ms),
                before_broadcast: Duration::from_millis(self.timing.before_broadcast_ms),
                after_poweroff_ack: Duration::from_millis(self.timing.after_poweroff_ack_ms),
                admin: Duration::from_millis(self.timing.admin_ms),
            })
            .with_shutdown(ShutdownPolicy {
                timeout: Duration::from_secs(self.shutdown.timeout_secs),
                poll_interval: Duration::from_secs(self.shutdown.poll_interval_secs),
            })
    }
}
