// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Connection lifecycle states.

use std::time::Duration;

/// State of the client's connection task.
///
/// ```text
/// Idle → Connecting → Subscribing → Streaming ─┐
///          ↑                                    │ failure
///          └────────── BackingOff ←─────────────┘
///
/// any state ── stop() ──→ Draining → Stopped
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not started yet.
    Idle,
    /// Sleeping after failures before the next dial.
    BackingOff {
        /// Consecutive error count driving the delay.
        errors: u32,
        /// Length of this sleep.
        delay: Duration,
    },
    /// WebSocket handshake in progress.
    Connecting,
    /// Socket open, waiting for `connection_opened`.
    Subscribing,
    /// Server ready; subscriptions replayed and messages flowing.
    Streaming,
    /// Closing the socket after a stop request.
    Draining,
    /// Task exited; it will not reconnect.
    Stopped,
}

impl ConnectionState {
    /// Returns true once the server is ready for directives.
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming)
    }

    /// Returns true if the task has exited.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}
