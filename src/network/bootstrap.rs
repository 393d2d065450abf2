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

//! Process-wide bootstrap of the native networking stack.
//!
//! [`start`] must succeed exactly once before any socket is created and be
//! paired with one [`stop`] at shutdown. While the subsystem is down,
//! [`Socket::new`](crate::Socket::new) fails with
//! [`SocketError::SubsystemDown`](crate::SocketError::SubsystemDown).

use std::sync::atomic::{AtomicU8, Ordering};

use socket2::{Domain, Protocol, Type};
use tracing::debug;

use super::error::{SocketError, SocketResult};
use crate::{AppError, AppResult};

const DOWN: u8 = 0;
const READY: u8 = 1;

static STATE: AtomicU8 = AtomicU8::new(DOWN);

/// Brings the networking subsystem up.
///
/// A second `start` without an intervening [`stop`] is rejected; subsystem
/// state is never corrupted by the attempt. If the native stack probe fails,
/// the subsystem is torn down internally before the failure is reported, so
/// a failed `start` always leaves the uninitialized state behind.
pub fn start() -> AppResult<()> {
    if STATE
        .compare_exchange(DOWN, READY, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        return Err(AppError::IllegalStateError(
            "network subsystem already running".into(),
        ));
    }

    if let Err(e) = probe_stack() {
        stop();
        return Err(AppError::Socket(e));
    }

    debug!("network subsystem started");
    Ok(())
}

/// Tears the subsystem down. Idempotent, safe to call even if [`start`]
/// never succeeded.
pub fn stop() {
    STATE.store(DOWN, Ordering::Release);
    debug!("network subsystem stopped");
}

pub(crate) fn is_ready() -> bool {
    STATE.load(Ordering::Acquire) == READY
}

/// Verifies that the native socket stack is usable by opening and dropping
/// a throwaway stream descriptor. This stands in for the explicit
/// initialization-and-version handshake some platforms used to require;
/// the stacks underneath us initialize implicitly, so an allocation probe
/// is the remaining observable check.
fn probe_stack() -> SocketResult<()> {
    socket2::Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))
        .map_err(SocketError::from)?;
    Ok(())
}
