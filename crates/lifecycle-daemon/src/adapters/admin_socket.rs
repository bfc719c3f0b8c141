//! # Admin Control Socket
//!
//! Unix stream socket for local operators. Each accepted client gets a
//! `ClientId` and one task that both reads request lines and writes staged
//! replies. Requests become `LifecycleEvent::Admin`; replies are staged by
//! `AdminChannel::reply` and written by the client task.
//!
//! `close` stops accepting, removes the socket file and lets every client task
//! flush its staged replies before it exits.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use lifecycle_core::{AdminChannel, AdminReply, AdminRequest, ClientId, LifecycleEvent, TransportError};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

pub struct UnixAdminChannel {
    path: PathBuf,
    clients: Mutex<HashMap<ClientId, mpsc::UnboundedSender<AdminReply>>>,
    acceptor: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
    next_client: AtomicU64,
}

impl UnixAdminChannel {
    /// Bind the socket and start accepting clients.
    ///
    /// A stale socket file left by a previous run is replaced.
    pub fn bind(path: impl AsRef<Path>, events: mpsc::Sender<LifecycleEvent>) -> io::Result<Arc<Self>> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        match std::fs::remove_file(&path) {
            Ok(()) => debug!("[admin] Removed stale socket {}", path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        let listener = UnixListener::bind(&path)?;
        info!("[admin] Listening on {}", path.display());

        let channel = Arc::new(Self {
            path,
            clients: Mutex::new(HashMap::new()),
            acceptor: Mutex::new(None),
            closed: AtomicBool::new(false),
            next_client: AtomicU64::new(1),
        });
        let acceptor = tokio::spawn(Arc::clone(&channel).accept_loop(listener, events));
        *channel.acceptor.lock() = Some(acceptor);
        Ok(channel)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn client_count(&self) -> usize {
        self.clients.lock().len()
    }

    async fn accept_loop(self: Arc<Self>, listener: UnixListener, events: mpsc::Sender<LifecycleEvent>) {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let client = ClientId(self.next_client.fetch_add(1, Ordering::Relaxed));
                    let (tx, rx) = mpsc::unbounded_channel();
                    self.clients.lock().insert(client, tx);
                    debug!("[admin] Accepted {}", client);
                    tokio::spawn(Arc::clone(&self).serve_client(client, stream, rx, events.clone()));
                }
                Err(e) => {
                    warn!("[admin] Accept failed: {}", e);
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }
    }

    async fn serve_client(
        self: Arc<Self>,
        client: ClientId,
        stream: UnixStream,
        mut replies: mpsc::UnboundedReceiver<AdminReply>,
        events: mpsc::Sender<LifecycleEvent>,
    ) {
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();
        let mut reading = true;

        loop {
            tokio::select! {
                line = lines.next_line(), if reading => match line {
                    Ok(Some(line)) => {
                        let token = line.trim();
                        if token.is_empty() {
                            continue;
                        }
                        match token.parse::<AdminRequest>() {
                            Ok(request) => {
                                if events.send(LifecycleEvent::admin(client, request)).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!("[admin] Bad request from {}: {}", client, e),
                        }
                    }
                    Ok(None) => {
                        debug!("[admin] {} hung up", client);
                        self.clients.lock().remove(&client);
                        reading = false;
                    }
                    Err(e) => {
                        warn!("[admin] Read error on {}: {}", client, e);
                        self.clients.lock().remove(&client);
                        reading = false;
                    }
                },
                reply = replies.recv() => match reply {
                    Some(reply) => {
                        let line = format!("{}\n", reply);
                        if let Err(e) = write_half.write_all(line.as_bytes()).await {
                            warn!("[admin] Write to {} failed: {}", client, e);
                            break;
                        }
                    }
                    // Sender dropped: client hung up or the socket closed.
                    None => break,
                },
            }
        }
        self.clients.lock().remove(&client);
        let _ = write_half.shutdown().await;
    }
}

impl AdminChannel for UnixAdminChannel {
    fn reply(&self, client: ClientId, reply: AdminReply) -> Result<(), TransportError> {
        let clients = self.clients.lock();
        let sender = clients.get(&client).ok_or(TransportError::UnknownClient(client))?;
        sender.send(reply).map_err(|_| TransportError::UnknownClient(client))
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(acceptor) = self.acceptor.lock().take() {
            acceptor.abort();
        }
        self.clients.lock().clear();
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("[admin] Failed to remove {}: {}", self.path.display(), e);
            }
        }
        info!("[admin] Socket {} closed", self.path.display());
    }
}
