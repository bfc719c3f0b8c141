//! # Serial Channel Registry
//!
//! Implements `PeerRegistry` over the guest channel devices.
//!
//! Every configured device gets a fixed `ConnectionId` and a reader task that
//! turns newline-terminated tokens into `LifecycleEvent::PeerMessage`. A
//! device is only part of the Connection Set once its peer has spoken, except
//! for the User VM's upstream channel, which is connected as soon as it opens.
//! After `stop_listening`, silent devices can no longer join.
//!
//! Each channel's writer has its own lock. Device writes never hold the
//! registry lock, and on a multi-threaded runtime they run under
//! `block_in_place` so a stalled serial line does not pin a worker.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use lifecycle_core::{Command, ConnectionId, LifecycleEvent, PeerInfo, PeerRegistry, TransportError};

/// How a freshly attached channel enters the Connection Set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinPolicy {
    /// Connected once the first valid token arrives (Service VM guests).
    OnFirstMessage,
    /// Connected immediately (User VM upstream).
    OnOpen,
}

type ChannelWriter = Arc<Mutex<Box<dyn Write + Send>>>;

struct Channel {
    peer: PeerInfo,
    writer: ChannelWriter,
}

/// Connection Set over serial channel devices.
pub struct UartRegistry {
    channels: Mutex<HashMap<ConnectionId, Channel>>,
    /// Connected peers in join order.
    connected: Mutex<Vec<ConnectionId>>,
    listening: AtomicBool,
    next_conn: AtomicU32,
}

impl Default for UartRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl UartRegistry {
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            connected: Mutex::new(Vec::new()),
            listening: AtomicBool::new(true),
            next_conn: AtomicU32::new(1),
        }
    }

    /// Open a channel device read/write and start reading from it.
    pub fn open(
        self: &Arc<Self>,
        name: &str,
        device: &Path,
        policy: JoinPolicy,
        events: mpsc::Sender<LifecycleEvent>,
    ) -> io::Result<ConnectionId> {
        let file = OpenOptions::new().read(true).write(true).open(device)?;
        let writer = file.try_clone()?;
        let reader = tokio::fs::File::from_std(file);
        Ok(self.attach(name, device, policy, reader, writer, events))
    }

    /// Register a channel over arbitrary reader/writer halves.
    pub fn attach<Rd, W>(
        self: &Arc<Self>,
        name: &str,
        device: impl Into<PathBuf>,
        policy: JoinPolicy,
        reader: Rd,
        writer: W,
        events: mpsc::Sender<LifecycleEvent>,
    ) -> ConnectionId
    where
        Rd: AsyncRead + Send + Unpin + 'static,
        W: Write + Send + 'static,
    {
        let conn = ConnectionId(self.next_conn.fetch_add(1, Ordering::Relaxed));
        let peer = PeerInfo::new(conn, name, device);
        info!(
            "[uart] Opened channel {} to {} on {}",
            conn,
            peer.name,
            peer.device_path.display()
        );
        self.channels.lock().insert(
            conn,
            Channel {
                peer,
                writer: Arc::new(Mutex::new(Box::new(writer))),
            },
        );
        if policy == JoinPolicy::OnOpen {
            self.connected.lock().push(conn);
        }

        let registry = Arc::clone(self);
        tokio::spawn(async move {
            registry.read_channel(conn, reader, events).await;
        });
        conn
    }

    async fn read_channel<Rd>(&self, conn: ConnectionId, reader: Rd, events: mpsc::Sender<LifecycleEvent>)
    where
        Rd: AsyncRead + Unpin,
    {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let token = line.trim_matches(['\r', '\n', '\0', ' ']);
                    if token.is_empty() {
                        continue;
                    }
                    let command = match token.parse::<Command>() {
                        Ok(command) => command,
                        Err(e) => {
                            warn!("[uart] Dropping input on {}: {}", conn, e);
                            continue;
                        }
                    };
                    if !self.admit(conn) {
                        debug!("[uart] {} on {} after listening stopped, dropped", command, conn);
                        continue;
                    }
                    if events.send(LifecycleEvent::peer(conn, command)).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    info!("[uart] Channel {} reached end of stream", conn);
                    break;
                }
                Err(e) => {
                    warn!("[uart] Read error on {}: {}", conn, e);
                    break;
                }
            }
        }
    }

    /// Put `conn` into the Connection Set if it is not already there.
    fn admit(&self, conn: ConnectionId) -> bool {
        let mut connected = self.connected.lock();
        if connected.contains(&conn) {
            return true;
        }
        if !self.listening.load(Ordering::Acquire) {
            return false;
        }
        connected.push(conn);
        if let Some(channel) = self.channels.lock().get(&conn) {
            info!("[uart] {} joined as {}", channel.peer.name, conn);
        }
        true
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Acquire)
    }

    /// Every opened channel, connected or not.
    pub fn channel_count(&self) -> usize {
        self.channels.lock().len()
    }

    fn write_line(writer: &ChannelWriter, command: Command) -> io::Result<()> {
        blocking_io(|| {
            let mut writer = writer.lock();
            writer.write_all(command.as_bytes())?;
            writer.write_all(b"\n")?;
            writer.flush()
        })
    }
}

/// Run blocking device I/O, handing the worker thread back to the runtime
/// where the runtime flavor supports it.
fn blocking_io<T>(op: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(op)
        }
        _ => op(),
    }
}

impl PeerRegistry for UartRegistry {
    fn lookup(&self, conn: ConnectionId) -> Option<PeerInfo> {
        if !self.connected.lock().contains(&conn) {
            return None;
        }
        self.channels.lock().get(&conn).map(|c| c.peer.clone())
    }

    fn lookup_by_name(&self, name: &str) -> Option<PeerInfo> {
        self.connected().into_iter().find(|p| p.name == name)
    }

    fn first_connected(&self) -> Option<PeerInfo> {
        let first = self.connected.lock().first().copied()?;
        self.channels.lock().get(&first).map(|c| c.peer.clone())
    }

    fn connected(&self) -> Vec<PeerInfo> {
        let connected = self.connected.lock();
        let channels = self.channels.lock();
        connected
            .iter()
            .filter_map(|conn| channels.get(conn).map(|c| c.peer.clone()))
            .collect()
    }

    fn send(&self, conn: ConnectionId, command: Command) -> Result<(), TransportError> {
        if !self.connected.lock().contains(&conn) {
            return Err(TransportError::UnknownPeer(conn));
        }
        let (name, writer) = {
            let channels = self.channels.lock();
            let channel = channels
                .get(&conn)
                .ok_or(TransportError::UnknownPeer(conn))?;
            (channel.peer.name.clone(), Arc::clone(&channel.writer))
        };
        Self::write_line(&writer, command).map_err(|e| TransportError::WriteFailed {
            target: name.clone(),
            reason: e.to_string(),
        })?;
        debug!("[uart] Sent {} to {}", command, name);
        Ok(())
    }

    fn disconnect(&self, conn: ConnectionId) {
        let mut connected = self.connected.lock();
        let before = connected.len();
        connected.retain(|c| *c != conn);
        if connected.len() != before {
            info!("[uart] {} disconnected, {} peer(s) remain", conn, connected.len());
        }
    }

    fn stop_listening(&self) {
        if self.listening.swap(false, Ordering::AcqRel) {
            info!("[uart] No longer accepting new peers");
        }
    }
}
