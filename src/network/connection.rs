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

use std::io;
use std::net::{Shutdown, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;

use super::error::{SocketError, SocketResult};

#[derive(Debug)]
struct Shared {
    stream: TcpStream,
    peer: SocketAddr,
    /// I/O mode of the descriptor; shared by every copy, like the
    /// underlying O_NONBLOCK flag it models.
    nonblocking: AtomicBool,
}

/// One established stream connection.
///
/// Copies of a `Connection` share exactly one live descriptor. The
/// descriptor is released exactly once, when the last owning copy is
/// closed or dropped; [`Connection::close`] detaches only the copy it is
/// called on, so siblings keep a usable connection until they release
/// theirs. A copy is safe to drive from one task at a time; handing a
/// clone to another task is the supported way to share the socket.
///
/// `send`/`recv` move at most the requested number of bytes and report how
/// many actually moved. Partial transfers are normal under both I/O modes;
/// callers loop. In non-blocking mode no call suspends: would-block comes
/// back as the retryable [`SocketError::WouldBlock`] and the caller polls
/// readiness externally before retrying.
#[derive(Debug, Clone)]
pub struct Connection {
    shared: Option<Arc<Shared>>,
}

impl Connection {
    pub(crate) fn accepted(stream: TcpStream, peer: SocketAddr) -> Connection {
        Connection {
            shared: Some(Arc::new(Shared {
                stream,
                peer,
                nonblocking: AtomicBool::new(false),
            })),
        }
    }

    pub(crate) fn connected(stream: TcpStream) -> SocketResult<Connection> {
        let peer = stream.peer_addr().map_err(SocketError::from)?;
        Ok(Connection::accepted(stream, peer))
    }

    fn shared(&self) -> SocketResult<&Arc<Shared>> {
        self.shared.as_ref().ok_or(SocketError::NotConnected)
    }

    /// Whether this copy still holds the descriptor.
    pub fn is_open(&self) -> bool {
        self.shared.is_some()
    }

    /// Sends up to `buf.len()` bytes, returning the count actually sent.
    ///
    /// A short count is not an error. Fatal codes mean the connection is
    /// done and must be closed; retryable codes mean no bytes moved.
    pub async fn send(&self, buf: &[u8]) -> SocketResult<usize> {
        debug_assert!(!buf.is_empty(), "send with an empty buffer");
        let shared = self.shared()?;

        if shared.nonblocking.load(Ordering::Relaxed) {
            return shared.stream.try_write(buf).map_err(SocketError::from);
        }

        loop {
            shared.stream.writable().await.map_err(SocketError::from)?;
            match shared.stream.try_write(buf) {
                Ok(n) => return Ok(n),
                // readiness was stale, or the call was interrupted before
                // transferring anything; neither is progress nor failure
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Receives up to `buf.len()` bytes, returning the count actually
    /// received. `Ok(0)` means the peer shut down its sending side:
    /// end-of-stream, not an error.
    pub async fn recv(&self, buf: &mut [u8]) -> SocketResult<usize> {
        debug_assert!(!buf.is_empty(), "recv with an empty buffer");
        let shared = self.shared()?;

        if shared.nonblocking.load(Ordering::Relaxed) {
            return shared.stream.try_read(buf).map_err(SocketError::from);
        }

        loop {
            shared.stream.readable().await.map_err(SocketError::from)?;
            match shared.stream.try_read(buf) {
                Ok(n) => return Ok(n),
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Waits until the descriptor has bytes to read, transferring nothing.
    ///
    /// The readiness hook for non-blocking callers: park here, then retry
    /// the `recv` that reported would-block.
    pub async fn readable(&self) -> SocketResult<()> {
        self.shared()?.stream.readable().await.map_err(SocketError::from)
    }

    /// Waits until the descriptor can accept bytes, transferring nothing.
    pub async fn writable(&self) -> SocketResult<()> {
        self.shared()?.stream.writable().await.map_err(SocketError::from)
    }

    /// Switches the descriptor between blocking and non-blocking I/O.
    ///
    /// Only the blocking-to-non-blocking direction is supported; going
    /// back is a caller bug.
    pub fn set_blocking(&self, blocking: bool) -> SocketResult<()> {
        let shared = self.shared()?;
        if blocking {
            if shared.nonblocking.load(Ordering::Relaxed) {
                debug_assert!(false, "re-enabling blocking mode is not supported");
                return Err(SocketError::OptionNotSupported);
            }
            return Ok(());
        }
        shared.nonblocking.store(true, Ordering::Relaxed);
        Ok(())
    }

    /// Configures close-time linger: when enabled, a close blocks up to
    /// `delay_secs` seconds while unsent data drains.
    pub fn set_linger(&self, enabled: bool, delay_secs: u16) -> SocketResult<()> {
        let shared = self.shared()?;
        let linger = enabled.then(|| Duration::from_secs(u64::from(delay_secs)));
        shared.stream.set_linger(linger).map_err(SocketError::from)
    }

    /// Half- or full-duplex shutdown without releasing the descriptor.
    ///
    /// Shutting down the write side signals end-of-stream to the peer,
    /// which is the sanctioned way to unblock its blocking `recv`.
    pub fn shutdown(&self, how: Shutdown) -> SocketResult<()> {
        let shared = self.shared()?;
        socket2::SockRef::from(&shared.stream)
            .shutdown(how)
            .map_err(SocketError::from)
    }

    /// Releases this copy's hold on the descriptor. Idempotent. The
    /// descriptor itself is closed when the last copy releases.
    pub fn close(&mut self) {
        self.shared = None;
    }

    /// Remote peer's address.
    pub fn peer_addr(&self) -> SocketResult<SocketAddr> {
        Ok(self.shared()?.peer)
    }

    /// Local address of this endpoint.
    pub fn local_addr(&self) -> SocketResult<SocketAddr> {
        self.shared()?.stream.local_addr().map_err(SocketError::from)
    }

    /// Remote peer's port.
    pub fn port(&self) -> SocketResult<u16> {
        Ok(self.shared()?.peer.port())
    }
}
