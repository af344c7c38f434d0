// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Protocol control messages.

use serde::Deserialize;

/// Sent by the server once the socket is ready to accept directives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ConnectionOpened {}

/// Acknowledges a directive; `id` echoes the directive's correlation id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Ack {
    /// Correlation id of the acknowledged directive.
    #[serde(default)]
    pub id: String,
}
