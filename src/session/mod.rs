//! Session Module Implementation
//!
//! A session is one collaborative canvas: its identity, display metadata,
//! and the set of currently subscribed users. The registry owns the
//! mapping from session identifier to session and serializes all
//! join/leave mutation; the session entity itself only guarantees the
//! structural integrity of its user mapping.

pub use registry::SessionRegistry;
pub use session::Session;
pub use user::{User, UserRef};

mod registry;
mod session;
mod user;

/// Reserved identifier meaning "no session" or "no user".
pub const NULL_ID: u8 = 255;

/// Default maximum of concurrently subscribed users per session.
pub const DEFAULT_USER_LIMIT: u8 = 10;

/// Session titles travel length-prefixed with a one-byte length field.
pub const MAX_TITLE_LEN: usize = 255;

/// Permission bits applied per session (default mode) or per user
/// (override).
pub mod user_mode {
    /// no restrictions
    pub const NONE: u8 = 0x00;
    /// drawing is locked
    pub const LOCKED: u8 = 0x01;
    /// outgoing chat is dropped
    pub const MUTE: u8 = 0x02;
    /// incoming chat is dropped
    pub const DEAF: u8 = 0x04;
}
