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

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::{AppError, AppResult};

use super::session::Session;
use super::user::{User, UserRef};
use super::NULL_ID;

/// Owner of the session-id-to-session mapping.
///
/// All mutation of a session's user registry goes through here, one
/// mutation at a time per session: the sharded map locates the session,
/// the per-session mutex serializes join/leave/broadcast against it.
/// Guards are never held across an await point.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<u8, Mutex<Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        SessionRegistry {
            sessions: DashMap::new(),
        }
    }

    /// Creates a session under a freshly allocated identifier.
    ///
    /// # Arguments
    /// * `title` - display title, at most 255 bytes
    /// * `limit` - user limit; 0 keeps the session default
    /// * `width`, `height` - canvas size in pixels
    ///
    /// # Returns
    /// The new session's identifier.
    pub fn create_session(
        &self,
        title: impl Into<String>,
        limit: u8,
        width: u16,
        height: u16,
    ) -> AppResult<u8> {
        let id = self
            .free_session_id()
            .ok_or_else(|| AppError::IllegalStateError("session identifiers exhausted".into()))?;

        let mut session = Session::new(id);
        session.set_title(title)?;
        if limit > 0 {
            session.limit = limit;
        }
        session.width = width;
        session.height = height;

        self.sessions.insert(id, Mutex::new(session));
        info!(session = id, "session created");
        Ok(id)
    }

    /// Removes a session, dropping its user mapping and with it the
    /// session's shared reference to every subscribed user.
    pub fn destroy_session(&self, session_id: u8) -> bool {
        let removed = self.sessions.remove(&session_id).is_some();
        if removed {
            info!(session = session_id, "session destroyed");
        }
        removed
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn contains(&self, session_id: u8) -> bool {
        self.sessions.contains_key(&session_id)
    }

    /// Runs `f` with exclusive access to the session, if it exists.
    pub fn with_session<R>(&self, session_id: u8, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        self.sessions
            .get(&session_id)
            .map(|entry| f(&mut entry.lock()))
    }

    /// Subscribes an already-identified user to a session, enforcing the
    /// user limit and rejecting duplicate identifiers.
    pub fn join(&self, session_id: u8, user: UserRef) -> AppResult<()> {
        let entry = self
            .sessions
            .get(&session_id)
            .ok_or(AppError::UnknownSession(session_id))?;
        let mut session = entry.lock();

        if session.is_full() {
            return Err(AppError::SessionFull(session_id));
        }
        if session.has_user(user.id) {
            return Err(AppError::DuplicateUser {
                session: session_id,
                user: user.id,
            });
        }

        debug!(session = session_id, user = user.id, "user joined");
        session.insert_user(user);
        Ok(())
    }

    /// Subscribes a new user under the lowest free identifier.
    ///
    /// # Returns
    /// The shared user it created and inserted.
    pub fn join_as_new(&self, session_id: u8, name: impl Into<String>) -> AppResult<UserRef> {
        let entry = self
            .sessions
            .get(&session_id)
            .ok_or(AppError::UnknownSession(session_id))?;
        let mut session = entry.lock();

        if session.is_full() {
            return Err(AppError::SessionFull(session_id));
        }
        let user_id = (1..NULL_ID)
            .find(|id| !session.has_user(*id))
            .ok_or_else(|| AppError::IllegalStateError("user identifiers exhausted".into()))?;

        let user = UserRef::new(User::new(user_id, name));
        debug!(session = session_id, user = user_id, "user joined");
        session.insert_user(user.clone());
        Ok(user)
    }

    /// Unsubscribes a user.
    ///
    /// # Returns
    /// `true` when the session was left empty by this departure.
    pub fn leave(&self, session_id: u8, user_id: u8) -> AppResult<bool> {
        let entry = self
            .sessions
            .get(&session_id)
            .ok_or(AppError::UnknownSession(session_id))?;
        let mut session = entry.lock();

        session.remove_user(user_id);
        debug!(session = session_id, user = user_id, "user left");
        Ok(session.user_count() == 0)
    }

    fn free_session_id(&self) -> Option<u8> {
        (1..NULL_ID).find(|id| !self.sessions.contains_key(id))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_create_and_destroy() {
        let registry = SessionRegistry::new();

        let first = registry.create_session("one", 0, 800, 600).unwrap();
        let second = registry.create_session("two", 0, 0, 0).unwrap();
        assert_ne!(first, second);
        assert_eq!(registry.session_count(), 2);

        registry
            .with_session(first, |s| {
                assert_eq!(s.title(), "one");
                assert_eq!(s.limit, 10);
                assert_eq!((s.width, s.height), (800, 600));
            })
            .unwrap();

        assert!(registry.destroy_session(first));
        assert!(!registry.destroy_session(first));
        assert_eq!(registry.session_count(), 1);
    }

    #[test]
    fn test_session_id_reuse_after_destroy() {
        let registry = SessionRegistry::new();
        let a = registry.create_session("a", 0, 0, 0).unwrap();
        let b = registry.create_session("b", 0, 0, 0).unwrap();

        registry.destroy_session(a);
        let c = registry.create_session("c", 0, 0, 0).unwrap();
        assert_eq!(c, a);
        assert_ne!(c, b);
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(10)]
    fn test_join_respects_limit(#[case] limit: u8) {
        let registry = SessionRegistry::new();
        let sid = registry.create_session("room", limit, 0, 0).unwrap();

        for _ in 0..limit {
            registry.join_as_new(sid, "guest").unwrap();
        }
        let err = registry.join_as_new(sid, "late").unwrap_err();
        assert!(matches!(err, AppError::SessionFull(s) if s == sid));

        let count = registry.with_session(sid, |s| s.user_count()).unwrap();
        assert_eq!(count, limit as usize);
    }

    #[test]
    fn test_join_rejects_duplicate_user() {
        let registry = SessionRegistry::new();
        let sid = registry.create_session("room", 0, 0, 0).unwrap();

        registry.join(sid, Arc::new(User::new(1, "a"))).unwrap();
        let err = registry.join(sid, Arc::new(User::new(1, "imposter"))).unwrap_err();
        assert!(matches!(
            err,
            AppError::DuplicateUser { session, user } if session == sid && user == 1
        ));
    }

    #[test]
    fn test_leave_reports_emptied() {
        let registry = SessionRegistry::new();
        let sid = registry.create_session("room", 0, 0, 0).unwrap();

        let a = registry.join_as_new(sid, "a").unwrap();
        let b = registry.join_as_new(sid, "b").unwrap();
        assert_ne!(a.id, b.id);

        assert!(!registry.leave(sid, a.id).unwrap());
        assert!(registry.leave(sid, b.id).unwrap());
    }

    #[test]
    fn test_unknown_session_is_rejected() {
        let registry = SessionRegistry::new();
        assert!(matches!(
            registry.join_as_new(42, "nobody").unwrap_err(),
            AppError::UnknownSession(42)
        ));
        assert!(matches!(
            registry.leave(42, 1).unwrap_err(),
            AppError::UnknownSession(42)
        ));
    }
}
