// Copyright 2025 jonefeewang@gmail.com
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpSocket};
use tracing::debug;

use super::bootstrap;
use super::connection::Connection;
use super::error::{SocketError, SocketResult};

/// Address family of a stream socket. Addresses themselves are parsed and
/// formatted elsewhere; this layer consumes [`SocketAddr`] opaquely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrFamily {
    Ipv4,
    Ipv6,
}

/// Pending connections queued by the OS on a listening socket.
const LISTEN_BACKLOG: u32 = 4;

/// An unconnected stream-socket descriptor.
///
/// `Socket` is the builder stage of a connection's lifecycle: create for an
/// address family, apply options, then consume it with [`Socket::listen`]
/// or [`Socket::connect`]. Re-creation is expressed by dropping the old
/// value; the descriptor is released on drop, exactly once.
#[derive(Debug)]
pub struct Socket {
    inner: TcpSocket,
}

impl Socket {
    /// Allocates a fresh stream descriptor for `family`.
    ///
    /// Fails with [`SocketError::SubsystemDown`] if the network subsystem
    /// has not been started, and with a resource-exhaustion code if the
    /// process is out of descriptors or buffer memory.
    pub fn new(family: AddrFamily) -> SocketResult<Socket> {
        if !bootstrap::is_ready() {
            return Err(SocketError::SubsystemDown);
        }

        let inner = match family {
            AddrFamily::Ipv4 => TcpSocket::new_v4(),
            AddrFamily::Ipv6 => TcpSocket::new_v6(),
        }
        .map_err(SocketError::from)?;

        Ok(Socket { inner })
    }

    /// Best-effort `SO_REUSEADDR` toggle.
    pub fn set_reuse_addr(&self, enabled: bool) -> SocketResult<()> {
        self.inner.set_reuseaddr(enabled).map_err(SocketError::from)
    }

    /// Best-effort `SO_REUSEPORT` toggle. Platforms without the option
    /// treat enabling as a no-op success and disabling as unsupported.
    #[cfg(unix)]
    pub fn set_reuse_port(&self, enabled: bool) -> SocketResult<()> {
        self.inner.set_reuseport(enabled).map_err(SocketError::from)
    }

    #[cfg(not(unix))]
    pub fn set_reuse_port(&self, enabled: bool) -> SocketResult<()> {
        if enabled {
            Ok(())
        } else {
            Err(SocketError::OptionNotSupported)
        }
    }

    /// Binds the descriptor to a local address.
    pub fn bind(&self, addr: SocketAddr) -> SocketResult<()> {
        self.inner.bind(addr).map_err(SocketError::from)
    }

    /// Marks the descriptor passive and hands it to the accept side.
    pub fn listen(self) -> SocketResult<Listener> {
        let inner = self.inner.listen(LISTEN_BACKLOG).map_err(SocketError::from)?;
        debug!(addr = ?inner.local_addr(), "listening");
        Ok(Listener { inner })
    }

    /// Initiates an outbound connection and waits for it to complete.
    ///
    /// The in-progress phase of a non-blocking connect is awaited here, so
    /// it never surfaces as an error; what comes back is either an
    /// established [`Connection`] or a terminal code (refused, timed out,
    /// unreachable, permission denied).
    pub async fn connect(self, addr: SocketAddr) -> SocketResult<Connection> {
        let stream = self.inner.connect(addr).await.map_err(SocketError::from)?;
        Connection::connected(stream)
    }

    pub fn local_addr(&self) -> SocketResult<SocketAddr> {
        self.inner.local_addr().map_err(SocketError::from)
    }
}

/// The passive side of the lifecycle: accepts inbound connections.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
}

impl Listener {
    /// Waits for an inbound connection.
    ///
    /// On success the new [`Connection`] carries the accepted descriptor
    /// and the remote peer's address. Failures are reported normalized;
    /// the listening descriptor itself stays open regardless, so the
    /// caller may keep accepting after a dropped attempt.
    pub async fn accept(&self) -> SocketResult<Connection> {
        let (stream, peer) = self.inner.accept().await.map_err(SocketError::from)?;
        debug!(%peer, "accepted connection");
        Ok(Connection::accepted(stream, peer))
    }

    pub fn local_addr(&self) -> SocketResult<SocketAddr> {
        self.inner.local_addr().map_err(SocketError::from)
    }
}
