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

use std::collections::HashMap;
use std::sync::Arc;

use crate::{AppError, AppResult};

use super::user::User;
use super::{DEFAULT_USER_LIMIT, MAX_TITLE_LEN, NULL_ID};

/// One collaborative canvas: identity, display metadata, and the registry
/// of currently subscribed users.
///
/// `Session` is a state container; join/leave policy (notably the
/// user-count limit) is enforced by the owning registry, which also
/// serializes concurrent mutation. The session itself guarantees only the
/// structural integrity of the user mapping: unique keys, and no dangling
/// shared references once a user departs.
#[derive(Debug)]
pub struct Session {
    /// Session identifier; [`NULL_ID`] denotes the null session.
    pub id: u8,
    /// Display title, at most [`MAX_TITLE_LEN`] bytes.
    title: String,
    /// Default permission bitmask applied to users joining without an
    /// explicit override.
    pub mode: u8,
    /// Maximum concurrent subscribed users.
    pub limit: u8,
    /// Controlling user, [`NULL_ID`] if none.
    pub owner: u8,
    /// Canvas size in pixels, 0 meaning unset.
    pub width: u16,
    pub height: u16,
    /// Subscribed users keyed by user identifier.
    users: HashMap<u8, Arc<User>>,
}

impl Session {
    /// Creates an empty session: no title, default mode, limit of
    /// [`DEFAULT_USER_LIMIT`], no owner, zero-sized canvas, no users.
    pub fn new(id: u8) -> Self {
        Session {
            id,
            title: String::new(),
            mode: super::user_mode::NONE,
            limit: DEFAULT_USER_LIMIT,
            owner: NULL_ID,
            width: 0,
            height: 0,
            users: HashMap::new(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Replaces the session title.
    ///
    /// The title travels in a length-prefixed field with a one-byte
    /// length, so anything over [`MAX_TITLE_LEN`] bytes is rejected.
    pub fn set_title(&mut self, title: impl Into<String>) -> AppResult<()> {
        let title = title.into();
        if title.len() > MAX_TITLE_LEN {
            return Err(AppError::InvalidValue(format!(
                "session title of {} bytes exceeds the {} byte limit",
                title.len(),
                MAX_TITLE_LEN
            )));
        }
        self.title = title;
        Ok(())
    }

    /// Inserts or replaces the user keyed by its identifier.
    ///
    /// # Returns
    /// The previously subscribed user under that key, if any. Callers that
    /// must not displace an existing entry check [`Session::has_user`]
    /// first; replacement here is always explicit, never silent.
    pub fn insert_user(&mut self, user: Arc<User>) -> Option<Arc<User>> {
        self.users.insert(user.id, user)
    }

    /// Removes the user under `user_id`, dropping this session's shared
    /// reference to it.
    pub fn remove_user(&mut self, user_id: u8) -> Option<Arc<User>> {
        self.users.remove(&user_id)
    }

    pub fn user(&self, user_id: u8) -> Option<&Arc<User>> {
        self.users.get(&user_id)
    }

    pub fn has_user(&self, user_id: u8) -> bool {
        self.users.contains_key(&user_id)
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn users(&self) -> impl Iterator<Item = &Arc<User>> {
        self.users.values()
    }

    /// Whether the subscribed-user count has reached `limit`. The registry
    /// consults this before admitting a join.
    pub fn is_full(&self) -> bool {
        self.users.len() >= self.limit as usize
    }
}
