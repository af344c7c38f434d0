// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Outbound protocol frames.
//!
//! The client never sends anything but [`Directive`]s: requests to start or
//! stop streaming a device's observations and rapid wind samples.

mod directive;

pub use directive::{Directive, DirectiveKind};
