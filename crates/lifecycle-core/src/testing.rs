//! Centralized Testing Utilities
//!
//! Recording implementations of every outbound port. Available to this
//! crate's tests and, with the `test-utils` feature, to other crates.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::domain::{AdminReply, ArmId, ClientId, Command, ConnectionId, PeerInfo};
use crate::error::{ProcessQueryError, TransportError};
use crate::ports::{AdminChannel, Pacer, PeerRegistry, ProcessRegistry, ResendTimer};

/// In-memory Connection Set that records every write.
#[derive(Default)]
pub struct MockPeerRegistry {
    connected: Mutex<Vec<PeerInfo>>,
    sent: Mutex<Vec<(ConnectionId, Command)>>,
    disconnected: Mutex<Vec<ConnectionId>>,
    failing: Mutex<HashSet<ConnectionId>>,
    listening: Mutex<bool>,
}

impl MockPeerRegistry {
    pub fn with_peers(peers: impl IntoIterator<Item = PeerInfo>) -> Self {
        let registry = Self::default();
        *registry.connected.lock() = peers.into_iter().collect();
        *registry.listening.lock() = true;
        registry
    }

    pub fn connect(&self, peer: PeerInfo) {
        self.connected.lock().push(peer);
    }

    /// Make every write to `conn` fail.
    pub fn fail_writes_to(&self, conn: ConnectionId) {
        self.failing.lock().insert(conn);
    }

    pub fn sent(&self) -> Vec<(ConnectionId, Command)> {
        self.sent.lock().clone()
    }

    pub fn sent_to(&self, conn: ConnectionId) -> Vec<Command> {
        self.sent
            .lock()
            .iter()
            .filter(|(c, _)| *c == conn)
            .map(|(_, command)| *command)
            .collect()
    }

    pub fn disconnected(&self) -> Vec<ConnectionId> {
        self.disconnected.lock().clone()
    }

    pub fn connected_ids(&self) -> Vec<ConnectionId> {
        self.connected.lock().iter().map(|p| p.conn).collect()
    }

    pub fn is_listening(&self) -> bool {
        *self.listening.lock()
    }
}

impl PeerRegistry for MockPeerRegistry {
    fn lookup(&self, conn: ConnectionId) -> Option<PeerInfo> {
        self.connected.lock().iter().find(|p| p.conn == conn).cloned()
    }

    fn lookup_by_name(&self, name: &str) -> Option<PeerInfo> {
        self.connected.lock().iter().find(|p| p.name == name).cloned()
    }

    fn first_connected(&self) -> Option<PeerInfo> {
        self.connected.lock().first().cloned()
    }

    fn connected(&self) -> Vec<PeerInfo> {
        self.connected.lock().clone()
    }

    fn send(&self, conn: ConnectionId, command: Command) -> Result<(), TransportError> {
        if self.failing.lock().contains(&conn) {
            return Err(TransportError::WriteFailed {
                target: conn.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        self.sent.lock().push((conn, command));
        Ok(())
    }

    fn disconnect(&self, conn: ConnectionId) {
        self.connected.lock().retain(|p| p.conn != conn);
        self.disconnected.lock().push(conn);
    }

    fn stop_listening(&self) {
        *self.listening.lock() = false;
    }
}

/// Records timer starts and cancellations without ever firing.
#[derive(Default)]
pub struct MockResendTimer {
    started: Mutex<Vec<(ConnectionId, ArmId, Command, u32)>>,
    cancelled: Mutex<Vec<ConnectionId>>,
}

impl MockResendTimer {
    pub fn started(&self) -> Vec<(ConnectionId, Command, u32)> {
        self.started
            .lock()
            .iter()
            .map(|&(conn, _, command, budget)| (conn, command, budget))
            .collect()
    }

    /// Most recent arm started on `conn`.
    pub fn last_arm(&self, conn: ConnectionId) -> Option<ArmId> {
        self.started
            .lock()
            .iter()
            .rev()
            .find(|(c, ..)| *c == conn)
            .map(|&(_, arm, ..)| arm)
    }

    pub fn cancelled(&self) -> Vec<ConnectionId> {
        self.cancelled.lock().clone()
    }
}

impl ResendTimer for MockResendTimer {
    fn start(&self, conn: ConnectionId, arm: ArmId, command: Command, budget: u32) {
        self.started.lock().push((conn, arm, command, budget));
    }

    fn cancel(&self, conn: ConnectionId) {
        self.cancelled.lock().push(conn);
    }
}

/// Admin socket with a fixed set of live clients.
#[derive(Default)]
pub struct MockAdminChannel {
    clients: Mutex<HashSet<ClientId>>,
    replies: Mutex<Vec<(ClientId, AdminReply)>>,
    closes: Mutex<u32>,
}

impl MockAdminChannel {
    pub fn with_clients(clients: impl IntoIterator<Item = ClientId>) -> Self {
        let channel = Self::default();
        channel.clients.lock().extend(clients);
        channel
    }

    pub fn replies(&self) -> Vec<(ClientId, AdminReply)> {
        self.replies.lock().clone()
    }

    pub fn close_count(&self) -> u32 {
        *self.closes.lock()
    }
}

impl AdminChannel for MockAdminChannel {
    fn reply(&self, client: ClientId, reply: AdminReply) -> Result<(), TransportError> {
        if !self.clients.lock().contains(&client) {
            return Err(TransportError::UnknownClient(client));
        }
        self.replies.lock().push((client, reply));
        Ok(())
    }

    fn close(&self) {
        *self.closes.lock() += 1;
    }
}

/// Replays a scripted sequence of process counts, then repeats the last one.
#[derive(Default)]
pub struct ScriptedProcessRegistry {
    script: Mutex<VecDeque<Result<usize, ProcessQueryError>>>,
    last: Mutex<Option<Result<usize, ProcessQueryError>>>,
    queries: Mutex<u32>,
}

impl ScriptedProcessRegistry {
    pub fn new(script: impl IntoIterator<Item = Result<usize, ProcessQueryError>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            ..Default::default()
        }
    }

    /// Counts down from `start` to zero, one per query.
    pub fn countdown(start: usize) -> Self {
        Self::new((0..=start).rev().map(Ok))
    }

    /// Never reaches zero.
    pub fn stuck(count: usize) -> Self {
        Self::new([Ok(count)])
    }

    pub fn queries(&self) -> u32 {
        *self.queries.lock()
    }
}

impl ProcessRegistry for ScriptedProcessRegistry {
    fn count_device_models(&self) -> Result<usize, ProcessQueryError> {
        *self.queries.lock() += 1;
        let mut last = self.last.lock();
        if let Some(next) = self.script.lock().pop_front() {
            *last = Some(next);
        }
        last.clone().unwrap_or(Ok(0))
    }
}

/// Records requested pauses and returns immediately.
#[derive(Default)]
pub struct RecordingPacer {
    pauses: Mutex<Vec<Duration>>,
}

impl RecordingPacer {
    pub fn pauses(&self) -> Vec<Duration> {
        self.pauses.lock().clone()
    }

    pub fn total(&self) -> Duration {
        self.pauses.lock().iter().sum()
    }
}

#[async_trait]
impl Pacer for RecordingPacer {
    async fn pause(&self, duration: Duration) {
        self.pauses.lock().push(duration);
    }
}
