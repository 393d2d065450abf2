use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, Semaphore};
use tokio::{runtime, signal};
use tracing::{error, info, trace};

use crate::network::{bootstrap, AddrFamily, Socket};
use crate::service::Server;
use crate::session::SessionRegistry;
use crate::{global_config, AppError, AppResult};

/// Top-level lifecycle of the drawing relay.
///
/// Owns the session registry, brings the network subsystem up before any
/// socket exists, runs the accept loop until ctrl-c, then drains the
/// connection handlers and tears the subsystem down.
pub struct Relay {
    registry: Arc<SessionRegistry>,
}

impl Relay {
    pub fn new() -> Self {
        Relay {
            registry: Arc::new(SessionRegistry::new()),
        }
    }

    pub fn start(&mut self) -> AppResult<()> {
        let (notify_shutdown, _) = broadcast::channel(1);
        let (shutdown_complete_tx, mut shutdown_complete_rx) = mpsc::channel(1);

        // startup tokio runtime
        let rt = runtime::Builder::new_multi_thread().enable_all().build()?;

        // the subsystem gates all socket creation
        bootstrap::start()?;

        let session_conf = &global_config().session;
        let default_session = self.registry.create_session(
            session_conf.default_title.clone(),
            session_conf.user_limit,
            session_conf.canvas_width,
            session_conf.canvas_height,
        )?;

        let run_result = rt.block_on(Self::run_tcp_server(
            self.registry.clone(),
            default_session,
            notify_shutdown.clone(),
            shutdown_complete_tx,
        ));

        // the accept loop is down; tell the connection handlers to stop
        // reading and wait for the last of them to drop
        let _ = notify_shutdown.send(());
        trace!("waiting for shutdown complete...");
        rt.block_on(shutdown_complete_rx.recv());

        bootstrap::stop();
        info!("relay shutdown complete");
        run_result
    }

    async fn run_tcp_server(
        registry: Arc<SessionRegistry>,
        default_session: u8,
        notify_shutdown: broadcast::Sender<()>,
        shutdown_complete_tx: mpsc::Sender<()>,
    ) -> AppResult<()> {
        let network_conf = &global_config().network;
        let listen_address = format!("{}:{}", network_conf.ip, network_conf.port);
        let addr: SocketAddr = listen_address.parse().map_err(|_| {
            AppError::InvalidValue(format!("listen address: {listen_address}"))
        })?;

        let family = match addr {
            SocketAddr::V4(_) => AddrFamily::Ipv4,
            SocketAddr::V6(_) => AddrFamily::Ipv6,
        };
        let socket = Socket::new(family)?;
        socket.set_reuse_addr(true)?;
        if let Err(err) = socket.bind(addr) {
            error!(
                "Failed to bind server to address: {} - Error: {}",
                listen_address, err
            );
            return Err(err.into());
        }
        let listener = socket.listen()?;
        info!("tcp server binding to {} for listening", &listen_address);

        let server = Server::new(
            listener,
            Arc::new(Semaphore::new(network_conf.max_connection)),
            notify_shutdown,
            shutdown_complete_tx,
            registry,
            default_session,
            network_conf.conn_read_buffer_size,
        );
        tokio::select! {
          res = server.run() => {
              if let Err(err) = res {
                  error!(cause = %err, "failed to accept");
              }
          }
          _ = signal::ctrl_c() => {
              info!("get shutdown signal");
          }
        }

        Ok(())
    }
}

impl Default for Relay {
    fn default() -> Self {
        Self::new()
    }
}
