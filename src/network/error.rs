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

pub type SocketResult<T> = Result<T, SocketError>;

/// Normalized socket error vocabulary.
///
/// Every fallible socket operation reports one of these codes instead of a
/// platform error, so calling code never branches on `errno` or a WSA code.
/// The variants group into four categories (see [`ErrorClass`]); callers
/// decide retry/teardown policy from the category, not the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SocketError {
    /// transient: no progress made, retry the same call later
    #[error("operation would block")]
    WouldBlock,
    #[error("interrupted before any progress was made")]
    Interrupted,

    /// resource exhaustion
    #[error("process or system descriptor limit reached")]
    DescriptorLimit,
    #[error("out of network buffers")]
    OutOfBuffers,
    #[error("out of memory")]
    OutOfMemory,
    #[error("network subsystem is not running")]
    SubsystemDown,

    /// fatal to the connection
    #[error("connection reset by peer")]
    ConnectionReset,
    #[error("connection broken or aborted")]
    ConnectionBroken,
    #[error("socket is not connected")]
    NotConnected,
    #[error("host unreachable")]
    HostUnreachable,
    #[error("connection refused")]
    ConnectionRefused,
    #[error("connection timed out")]
    TimedOut,

    /// configuration/environment, reported at setup time
    #[error("address already in use")]
    AddrInUse,
    #[error("address not available on this host")]
    AddrNotAvailable,
    #[error("insufficient permissions")]
    PermissionDenied,
    #[error("socket option not supported on this platform")]
    OptionNotSupported,

    /// codes outside the shared vocabulary
    #[error("unclassified socket error: {0:?}")]
    Other(io::ErrorKind),
}

/// Caller-facing policy categories for [`SocketError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// retry the same operation later, nothing was transferred
    Retryable,
    /// retry with backoff or abort, caller's choice
    ResourceExhaustion,
    /// the connection must be torn down, no further I/O on it
    ConnectionFatal,
    /// reported once at setup time, not expected during steady-state I/O
    Configuration,
}

impl SocketError {
    pub fn class(&self) -> ErrorClass {
        match self {
            SocketError::WouldBlock | SocketError::Interrupted => ErrorClass::Retryable,

            SocketError::DescriptorLimit
            | SocketError::OutOfBuffers
            | SocketError::OutOfMemory
            | SocketError::SubsystemDown => ErrorClass::ResourceExhaustion,

            SocketError::ConnectionReset
            | SocketError::ConnectionBroken
            | SocketError::NotConnected
            | SocketError::HostUnreachable
            | SocketError::ConnectionRefused
            | SocketError::TimedOut => ErrorClass::ConnectionFatal,

            SocketError::AddrInUse
            | SocketError::AddrNotAvailable
            | SocketError::PermissionDenied
            | SocketError::OptionNotSupported => ErrorClass::Configuration,

            // unknown codes get the strictest treatment
            SocketError::Other(_) => ErrorClass::ConnectionFatal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Retryable
    }

    pub fn is_fatal(&self) -> bool {
        self.class() == ErrorClass::ConnectionFatal
    }
}

impl From<io::Error> for SocketError {
    fn from(err: io::Error) -> Self {
        use io::ErrorKind::*;

        // Invalid arguments are a caller bug, never a runtime condition.
        debug_assert!(
            err.kind() != InvalidInput,
            "socket operation called with invalid arguments: {err}"
        );

        match err.kind() {
            WouldBlock => SocketError::WouldBlock,
            Interrupted => SocketError::Interrupted,
            OutOfMemory => SocketError::OutOfMemory,
            ConnectionReset => SocketError::ConnectionReset,
            ConnectionAborted | BrokenPipe => SocketError::ConnectionBroken,
            NotConnected => SocketError::NotConnected,
            HostUnreachable | NetworkUnreachable => SocketError::HostUnreachable,
            ConnectionRefused => SocketError::ConnectionRefused,
            TimedOut => SocketError::TimedOut,
            AddrInUse => SocketError::AddrInUse,
            AddrNotAvailable => SocketError::AddrNotAvailable,
            PermissionDenied => SocketError::PermissionDenied,
            Unsupported => SocketError::OptionNotSupported,
            NetworkDown => SocketError::SubsystemDown,
            _ => classify_raw(&err),
        }
    }
}

/// POSIX side of the normalization. Codes the portable `ErrorKind` set does
/// not cover are matched on the raw `errno` value.
#[cfg(unix)]
fn classify_raw(err: &io::Error) -> SocketError {
    match err.raw_os_error() {
        Some(libc::EMFILE) | Some(libc::ENFILE) => SocketError::DescriptorLimit,
        Some(libc::ENOBUFS) => SocketError::OutOfBuffers,
        Some(libc::ENOMEM) => SocketError::OutOfMemory,
        Some(libc::ENETDOWN) => SocketError::SubsystemDown,
        Some(libc::EBADF) | Some(libc::ENOTSOCK) | Some(libc::EFAULT) => {
            debug_assert!(false, "socket operation on a bad descriptor: {err}");
            SocketError::Other(err.kind())
        }
        _ => SocketError::Other(err.kind()),
    }
}

/// Winsock side of the normalization. These codes have no portable
/// `ErrorKind` mapping.
#[cfg(windows)]
fn classify_raw(err: &io::Error) -> SocketError {
    const WSAEMFILE: i32 = 10024;
    const WSAENOBUFS: i32 = 10055;
    const WSAENETDOWN: i32 = 10050;
    const WSAENOTSOCK: i32 = 10038;
    const WSANOTINITIALISED: i32 = 10093;

    match err.raw_os_error() {
        Some(WSAEMFILE) => SocketError::DescriptorLimit,
        Some(WSAENOBUFS) => SocketError::OutOfBuffers,
        Some(WSAENETDOWN) | Some(WSANOTINITIALISED) => SocketError::SubsystemDown,
        Some(WSAENOTSOCK) => {
            debug_assert!(false, "socket operation on a bad descriptor: {err}");
            SocketError::Other(err.kind())
        }
        _ => SocketError::Other(err.kind()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_normalization() {
        let e: SocketError = io::Error::from(io::ErrorKind::WouldBlock).into();
        assert_eq!(e, SocketError::WouldBlock);

        let e: SocketError = io::Error::from(io::ErrorKind::ConnectionReset).into();
        assert_eq!(e, SocketError::ConnectionReset);

        let e: SocketError = io::Error::from(io::ErrorKind::BrokenPipe).into();
        assert_eq!(e, SocketError::ConnectionBroken);

        let e: SocketError = io::Error::from(io::ErrorKind::AddrInUse).into();
        assert_eq!(e, SocketError::AddrInUse);
    }

    #[cfg(unix)]
    #[test]
    fn test_raw_errno_normalization() {
        let e: SocketError = io::Error::from_raw_os_error(libc::EMFILE).into();
        assert_eq!(e, SocketError::DescriptorLimit);

        let e: SocketError = io::Error::from_raw_os_error(libc::ENOBUFS).into();
        assert_eq!(e, SocketError::OutOfBuffers);
    }

    #[test]
    fn test_error_classes() {
        assert_eq!(SocketError::WouldBlock.class(), ErrorClass::Retryable);
        assert_eq!(SocketError::Interrupted.class(), ErrorClass::Retryable);
        assert_eq!(
            SocketError::DescriptorLimit.class(),
            ErrorClass::ResourceExhaustion
        );
        assert_eq!(
            SocketError::ConnectionReset.class(),
            ErrorClass::ConnectionFatal
        );
        assert_eq!(SocketError::AddrInUse.class(), ErrorClass::Configuration);

        assert!(SocketError::WouldBlock.is_retryable());
        assert!(!SocketError::WouldBlock.is_fatal());
        assert!(SocketError::NotConnected.is_fatal());
        assert!(!SocketError::NotConnected.is_retryable());
    }
}
