//! Network Module Implementation
//!
//! This module provides the stream-socket layer for the drawing server,
//! normalizing the divergent native socket APIs into one lifecycle model
//! and one error vocabulary.
//!
//! # Architecture
//!
//! The module is built on tokio's async I/O primitives and consists of:
//! - Bootstrap control of the process-wide networking subsystem
//! - Descriptor lifecycle management (create, bind, listen, accept, connect)
//! - Byte-level transfer with partial-transfer semantics
//!
//! # Components
//!
//! - `bootstrap`: one-time subsystem start/stop gating socket creation
//! - `Socket` / `Listener`: the unconnected and passive descriptor stages
//! - `Connection`: an established stream with shared descriptor ownership
//! - `SocketError`: the normalized, platform-independent error taxonomy
//!
//! # Features
//!
//! - Blocking and non-blocking I/O modes per connection
//! - Reference-counted descriptor release, exactly once on last close
//! - Retryable / resource-exhaustion / fatal / configuration error classes

pub use connection::Connection;
pub use error::{ErrorClass, SocketError, SocketResult};
pub use socket::{AddrFamily, Listener, Socket};

pub mod bootstrap;
mod connection;
mod error;
mod socket;
