//! # Scenario Harness
//!
//! A `LifecycleService` over a real `UartRegistry`, with each peer on an
//! in-memory duplex stream. Peers write tokens exactly as a serial line would
//! carry them; everything the service writes back is captured per peer.
//! Timers, the admin socket, the process registry and pacing are recording
//! mocks so every step is observable.

use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;

use lifecycle_core::testing::{
    MockAdminChannel, MockResendTimer, RecordingPacer, ScriptedProcessRegistry,
};
use lifecycle_core::{
    AdminRequest, ArmId, ClientId, Command, ConnectionId, HandlerStatus, LifecycleApi, LifecycleConfig,
    LifecycleEvent, LifecycleService, Role,
};
use lifecycle_daemon::adapters::{JoinPolicy, UartRegistry};

pub const ADMIN_CLIENT: ClientId = ClientId(1);

pub type BenchService = LifecycleService<
    UartRegistry,
    MockResendTimer,
    MockAdminChannel,
    ScriptedProcessRegistry,
    RecordingPacer,
>;

/// Captures one direction of a channel.
#[derive(Clone, Default)]
pub struct Wire(Arc<Mutex<Vec<u8>>>);

impl Wire {
    pub fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.0.lock())
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl Write for Wire {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// The far end of one channel.
pub struct Peer {
    pub conn: ConnectionId,
    input: DuplexStream,
    output: Wire,
}

pub struct Bench {
    pub service: BenchService,
    pub registry: Arc<UartRegistry>,
    pub timer: Arc<MockResendTimer>,
    pub admin: Arc<MockAdminChannel>,
    pub processes: Arc<ScriptedProcessRegistry>,
    pub pacer: Arc<RecordingPacer>,
    pub peers: Vec<Peer>,
    events: mpsc::Receiver<LifecycleEvent>,
}

impl Bench {
    /// Service VM with one channel per `(name, device)`.
    pub fn service_vm(
        config: LifecycleConfig,
        guests: &[(&str, &str)],
        processes: ScriptedProcessRegistry,
    ) -> Self {
        Self::build(config, guests, JoinPolicy::OnFirstMessage, processes)
    }

    /// User VM with its single upstream channel.
    pub fn user_vm(config: LifecycleConfig, device: &str) -> Self {
        Self::build(
            config,
            &[("service_vm", device)],
            JoinPolicy::OnOpen,
            ScriptedProcessRegistry::default(),
        )
    }

    fn build(
        config: LifecycleConfig,
        channels: &[(&str, &str)],
        policy: JoinPolicy,
        processes: ScriptedProcessRegistry,
    ) -> Self {
        let (tx, events) = mpsc::channel(64);
        let registry = Arc::new(UartRegistry::new());
        let peers = channels
            .iter()
            .map(|(name, device)| {
                let (input, daemon_side) = tokio::io::duplex(256);
                let output = Wire::default();
                let conn =
                    registry.attach(name, *device, policy, daemon_side, output.clone(), tx.clone());
                Peer {
                    conn,
                    input,
                    output,
                }
            })
            .collect();

        let timer = Arc::new(MockResendTimer::default());
        let admin = Arc::new(MockAdminChannel::with_clients([ADMIN_CLIENT]));
        let processes = Arc::new(processes);
        let pacer = Arc::new(RecordingPacer::default());
        let service = LifecycleService::new(
            config,
            Arc::clone(&registry),
            Arc::clone(&timer),
            Arc::clone(&admin),
            Arc::clone(&processes),
            Arc::clone(&pacer),
        );

        Self {
            service,
            registry,
            timer,
            admin,
            processes,
            pacer,
            peers,
            events,
        }
    }

    pub fn conn(&self, peer: usize) -> ConnectionId {
        self.peers[peer].conn
    }

    /// Write `command` on peer `peer`'s line and dispatch what the registry delivers.
    pub async fn peer_says(&mut self, peer: usize, command: Command) -> HandlerStatus {
        let line = format!("{}\n", command);
        self.peers[peer]
            .input
            .write_all(line.as_bytes())
            .await
            .expect("peer line closed");
        let event = self.events.recv().await.expect("event queue closed");
        self.service.dispatch(event).await
    }

    pub async fn admin_says(&self, request: AdminRequest) -> HandlerStatus {
        self.service
            .dispatch(LifecycleEvent::admin(ADMIN_CLIENT, request))
            .await
    }

    /// What the resend timer would report once the budget of the latest arm on `peer` is spent.
    pub async fn ack_times_out(&self, peer: usize) -> HandlerStatus {
        let conn = self.conn(peer);
        let arm = self.timer.last_arm(conn).unwrap_or(ArmId(0));
        self.service
            .dispatch(LifecycleEvent::AckTimeout { conn, arm })
            .await
    }

    /// Every line the service wrote to peer `peer`.
    pub fn received(&self, peer: usize) -> Vec<String> {
        self.peers[peer].output.lines()
    }

    pub fn announce(&self) -> HandlerStatus {
        self.service.announce()
    }

    pub fn role(&self) -> Role {
        self.service.role()
    }
}
