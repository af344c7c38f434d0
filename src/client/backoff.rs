// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error counter driving reconnect delays.

use std::time::Duration;

use super::config::BackoffPolicy;

/// Consecutive-error counter owned by the connection task.
///
/// Every failure increments it. A dispatched observation resets it to 1,
/// not 0, so two reconnects are always at least one backoff step apart.
#[derive(Debug, Clone)]
pub(crate) struct Backoff {
    policy: BackoffPolicy,
    errors: u32,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self { policy, errors: 0 }
    }

    pub fn errors(&self) -> u32 {
        self.errors
    }

    pub fn record_failure(&mut self) {
        self.errors = self.errors.saturating_add(1);
    }

    pub fn record_success(&mut self) {
        self.errors = 1;
    }

    /// Delay to wait before the next dial.
    pub fn delay(&self) -> Duration {
        self.policy.delay_for(self.errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backoff() -> Backoff {
        Backoff::new(BackoffPolicy::default())
    }

    #[test]
    fn fresh_counter_does_not_sleep() {
        let b = backoff();
        assert_eq!(b.errors(), 0);
        assert_eq!(b.delay(), Duration::ZERO);
    }

    #[test]
    fn failures_grow_delay() {
        let mut b = backoff();
        let mut previous = b.delay();
        for _ in 0..10 {
            b.record_failure();
            assert!(b.delay() >= previous);
            previous = b.delay();
        }
        assert_eq!(b.delay(), Duration::from_secs(32));
    }

    #[test]
    fn success_resets_to_one_not_zero() {
        let mut b = backoff();
        for _ in 0..4 {
            b.record_failure();
        }
        b.record_success();

        assert_eq!(b.errors(), 1);
        assert_eq!(b.delay(), BackoffPolicy::default().delay_for(1));
        assert_ne!(b.delay(), Duration::ZERO);
    }

    #[test]
    fn failures_after_success_start_from_floor() {
        let policy = BackoffPolicy::default();
        let mut b = Backoff::new(policy.clone());
        b.record_success();

        b.record_failure();
        assert_eq!(b.delay(), policy.delay_for(2));
        b.record_failure();
        assert_eq!(b.delay(), policy.delay_for(3));
    }

    #[test]
    fn success_on_fresh_counter_sets_floor() {
        let mut b = backoff();
        b.record_success();
        assert_eq!(b.delay(), Duration::from_secs(2));
    }
}
