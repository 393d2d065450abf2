use std::sync::Arc;

/// A connected collaborator, shared between the sessions that subscribe it
/// and the dispatch layer that owns its connection.
#[derive(Debug)]
pub struct User {
    /// User identifier, unique within a session.
    pub id: u8,
    /// Display name; the dispatch layer fills in the peer address when the
    /// client has not introduced itself yet.
    pub name: String,
    /// Per-user permission override, see [`super::user_mode`].
    pub mode: u8,
}

pub type UserRef = Arc<User>;

impl User {
    pub fn new(id: u8, name: impl Into<String>) -> Self {
        User {
            id,
            name: name.into(),
            mode: super::user_mode::NONE,
        }
    }
}
