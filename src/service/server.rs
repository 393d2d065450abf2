use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc, Semaphore};
use tokio::time::{self, Duration};
use tracing::{debug, error, info, warn};

use crate::network::{Connection, ErrorClass, Listener, SocketError};
use crate::session::{SessionRegistry, UserRef};
use crate::AppError;
use crate::AppResult;

use super::Shutdown;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Outbound queue handle for one connected user.
pub type PeerTx = mpsc::UnboundedSender<Bytes>;

/// Maps user identifiers to their outbound queues. Relayed bytes are
/// dropped into a peer's queue without touching its socket; each
/// connection handler drains its own queue onto its own connection.
#[derive(Debug, Default)]
pub struct PeerMap {
    inner: DashMap<u8, PeerTx>,
}

impl PeerMap {
    pub fn new() -> Self {
        PeerMap {
            inner: DashMap::new(),
        }
    }

    fn insert(&self, user_id: u8, tx: PeerTx) {
        self.inner.insert(user_id, tx);
    }

    fn remove(&self, user_id: u8) {
        self.inner.remove(&user_id);
    }

    fn send(&self, user_id: u8, payload: Bytes) {
        if let Some(tx) = self.inner.get(&user_id) {
            // a closed receiver means the peer is tearing down; its
            // handler removes the entry on exit
            let _ = tx.send(payload);
        }
    }
}

/// Queues `payload` to every user of the session except the sender.
///
/// The member snapshot is taken under the session lock, so it is
/// consistent with the latest completed join/leave; the queue sends
/// happen after the lock is released.
fn relay_to_session(
    registry: &SessionRegistry,
    peers: &PeerMap,
    session_id: u8,
    from_user: u8,
    payload: Bytes,
) {
    let targets = registry
        .with_session(session_id, |session| {
            session
                .users()
                .map(|user| user.id)
                .filter(|id| *id != from_user)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    for user_id in targets {
        peers.send(user_id, payload.clone());
    }
}

/// Writes the whole payload, looping over partial transfers.
///
/// Retryable codes are retried immediately (the blocking-mode send has
/// already waited for readiness); resource exhaustion backs off from
/// 10ms, doubling to a 1s cap. Fatal codes propagate to the caller for
/// teardown.
async fn send_all(connection: &Connection, payload: &[u8]) -> Result<(), SocketError> {
    let mut sent = 0;
    let mut backoff_ms = 10;
    while sent < payload.len() {
        match connection.send(&payload[sent..]).await {
            Ok(n) => {
                sent += n;
                backoff_ms = 10;
            }
            Err(e) if e.is_retryable() => continue,
            Err(e) if e.class() == ErrorClass::ResourceExhaustion => {
                time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms = (backoff_ms * 2).min(1000);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

// handler for each connection
struct ConnectionHandler {
    notify_shutdown: broadcast::Sender<()>,
    _shutdown_complete_tx: mpsc::Sender<()>,
    connection_id: u64,
    connection: Connection,
    user: UserRef,
    session_id: u8,
    registry: Arc<SessionRegistry>,
    peers: Arc<PeerMap>,
    outbound_rx: mpsc::UnboundedReceiver<Bytes>,
    read_buffer_size: usize,
}

impl ConnectionHandler {
    async fn handle_connection(&mut self) -> AppResult<()> {
        let mut shutdown = Shutdown::new(self.notify_shutdown.subscribe());
        let mut buf = vec![0u8; self.read_buffer_size];
        let mut backoff_ms = 10;
        loop {
            tokio::select! {
                res = self.connection.recv(&mut buf) => {
                    match res {
                        // peer closed its sending side
                        Ok(0) => break,
                        Ok(n) => {
                            backoff_ms = 10;
                            let payload = Bytes::copy_from_slice(&buf[..n]);
                            relay_to_session(
                                &self.registry,
                                &self.peers,
                                self.session_id,
                                self.user.id,
                                payload,
                            );
                        }
                        Err(e) if e.class() == ErrorClass::ResourceExhaustion => {
                            time::sleep(Duration::from_millis(backoff_ms)).await;
                            backoff_ms = (backoff_ms * 2).min(1000);
                        }
                        Err(e) => {
                            return Err(AppError::Socket(e));
                        }
                    }
                }
                queued = self.outbound_rx.recv() => {
                    match queued {
                        Some(payload) => {
                            send_all(&self.connection, &payload)
                                .await
                                .map_err(AppError::Socket)?;
                        }
                        // our peer-map entry is gone, nothing left to relay
                        None => break,
                    }
                }
                _ = shutdown.recv() => {
                    debug!(
                        connection = self.connection_id,
                        "connection handler exit after shutdown signal"
                    );
                    return Ok(());
                }
            }
        }
        debug!(connection = self.connection_id, "connection handler exit read loop");

        Ok(())
    }

    /// Unsubscribes the user and releases this handler's descriptor copy.
    fn teardown(&mut self) {
        self.peers.remove(self.user.id);
        if let Err(e) = self.registry.leave(self.session_id, self.user.id) {
            warn!(user = self.user.id, "leave on teardown failed: {e}");
        }
        self.connection.close();
    }
}

#[derive(Debug)]
pub struct Server {
    listener: Listener,
    limit_connections: Arc<Semaphore>,
    notify_shutdown: broadcast::Sender<()>,
    shutdown_complete_tx: mpsc::Sender<()>,
    registry: Arc<SessionRegistry>,
    peers: Arc<PeerMap>,
    default_session: u8,
    conn_read_buffer_size: usize,
}

impl Server {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        listener: Listener,
        limit_connections: Arc<Semaphore>,
        notify_shutdown: broadcast::Sender<()>,
        shutdown_complete_tx: mpsc::Sender<()>,
        registry: Arc<SessionRegistry>,
        default_session: u8,
        conn_read_buffer_size: usize,
    ) -> Self {
        Server {
            listener,
            limit_connections,
            notify_shutdown,
            shutdown_complete_tx,
            registry,
            peers: Arc::new(PeerMap::new()),
            default_session,
            conn_read_buffer_size,
        }
    }

    /// Accepts connections and dispatches each to its own handler task.
    ///
    /// Every accepted connection is subscribed to the default session as a
    /// fresh user and relays its bytes to the session's other subscribers.
    /// A semaphore permit bounds the number of live connections; the
    /// permit travels into the handler task and is released when the
    /// handler finishes, however it finishes.
    ///
    /// # Returns
    /// Under normal operation, never; exits with an error only when the
    /// listening socket itself becomes unusable.
    #[tracing::instrument]
    pub async fn run(&self) -> AppResult<()> {
        loop {
            let permit = self
                .limit_connections
                .clone()
                .acquire_owned()
                .await
                .unwrap();

            debug!("accept new connection");

            let mut connection = self.accept().await?;

            let peer_name = connection
                .peer_addr()
                .map(|addr| addr.to_string())
                .unwrap_or_else(|_| "unknown".to_string());

            let user = match self.registry.join_as_new(self.default_session, peer_name) {
                Ok(user) => user,
                Err(e) => {
                    // session full (or gone): drop the attempt, keep serving
                    warn!("rejecting connection: {e}");
                    connection.close();
                    drop(permit);
                    continue;
                }
            };

            let connection_id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
            let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
            self.peers.insert(user.id, outbound_tx);

            info!(
                connection = connection_id,
                user = user.id,
                session = self.default_session,
                "client subscribed"
            );

            let mut handler = ConnectionHandler {
                _shutdown_complete_tx: self.shutdown_complete_tx.clone(),
                notify_shutdown: self.notify_shutdown.clone(),
                connection_id,
                connection,
                user,
                session_id: self.default_session,
                registry: self.registry.clone(),
                peers: self.peers.clone(),
                outbound_rx,
                read_buffer_size: self.conn_read_buffer_size,
            };

            tokio::spawn(async move {
                if let Err(err) = handler.handle_connection().await {
                    error!("Connection error: {:?}", err);
                }
                // whether gracefully or unexpectedly closed, release the
                // subscription and the connection slot
                handler.teardown();
                drop(permit);
            });
        }
    }

    /// Waits for an inbound connection, absorbing per-attempt failures.
    ///
    /// Retryable codes and fatal codes scoped to the aborted attempt keep
    /// the loop going; resource exhaustion backs off from 1s, doubling up
    /// to 64s before the listener is declared unusable.
    async fn accept(&self) -> AppResult<Connection> {
        let mut backoff = 1;

        loop {
            match self.listener.accept().await {
                Ok(connection) => return Ok(connection),
                Err(err) if err.is_retryable() => continue,
                Err(err) if err.is_fatal() => {
                    // the attempt died, not the listener
                    debug!("inbound connection dropped before accept: {err}");
                    continue;
                }
                Err(err) => {
                    if backoff > 64 {
                        return Err(AppError::Socket(err));
                    }
                    warn!("accept failed: {err}, retrying in {backoff}s");
                }
            }

            time::sleep(Duration::from_secs(backoff)).await;
            backoff *= 2;
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        debug!("tcp server dropped");
    }
}
impl Drop for ConnectionHandler {
    fn drop(&mut self) {
        debug!("connection handler dropped");
    }
}
