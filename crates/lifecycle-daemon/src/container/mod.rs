//! # Daemon Container
//!
//! Builds every adapter from `DaemonConfig` and hands them to one
//! `LifecycleService`.
//!
//! ## Build Order
//!
//! 1. Event queue shared by all producers
//! 2. Channel registry, then every configured channel device
//! 3. Resend timer over the registry
//! 4. Admin socket
//! 5. Process registry and pacer
//! 6. Lifecycle service

pub mod config;

pub use config::{ChannelConfig, DaemonConfig, DaemonConfigError};

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::info;

use lifecycle_core::{LifecycleEvent, LifecycleService, Role};

use crate::adapters::{
    JoinPolicy, ProcFsRegistry, TokioPacer, TokioResendTimer, UartRegistry, UnixAdminChannel,
};

/// Events queued between producers and the dispatch loop.
pub const EVENT_QUEUE_DEPTH: usize = 256;

pub type DaemonService = LifecycleService<
    UartRegistry,
    TokioResendTimer<UartRegistry>,
    UnixAdminChannel,
    ProcFsRegistry,
    TokioPacer,
>;

pub struct DaemonContainer {
    pub config: DaemonConfig,
    pub service: Arc<DaemonService>,
    pub registry: Arc<UartRegistry>,
    pub admin: Arc<UnixAdminChannel>,
}

impl DaemonContainer {
    /// Open every channel and the admin socket. Must run inside a tokio runtime.
    pub fn build(config: DaemonConfig) -> Result<(Self, mpsc::Receiver<LifecycleEvent>)> {
        config.validate().context("Invalid configuration")?;
        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);

        let registry = Arc::new(UartRegistry::new());
        let policy = match config.role {
            Role::ServiceVm => JoinPolicy::OnFirstMessage,
            Role::UserVm => JoinPolicy::OnOpen,
        };
        for channel in &config.channels {
            registry
                .open(&channel.name, &channel.device, policy, events_tx.clone())
                .with_context(|| format!("Failed to open channel {}", channel.device.display()))?;
        }

        let timer = Arc::new(TokioResendTimer::new(
            Arc::clone(&registry),
            events_tx.clone(),
            config.resend_interval(),
        ));
        let admin = UnixAdminChannel::bind(&config.socket.path, events_tx)
            .with_context(|| format!("Failed to bind {}", config.socket.path.display()))?;
        let processes = Arc::new(ProcFsRegistry::new(
            config.shutdown.proc_root.clone(),
            config.shutdown.device_model.clone(),
        ));

        let service = Arc::new(LifecycleService::new(
            config.lifecycle_config(),
            Arc::clone(&registry),
            timer,
            Arc::clone(&admin),
            processes,
            Arc::new(TokioPacer),
        ));
        info!(
            "[daemon] {} ({}) ready with {} channel(s)",
            config.vm_name,
            config.role,
            registry.channel_count()
        );

        Ok((
            Self {
                config,
                service,
                registry,
                admin,
            },
            events_rx,
        ))
    }
}
