// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Registry of subscribed devices.
//!
//! The registry is the only state shared between the connection task and
//! callers. A device is subscribed iff it is in the set; the connection
//! task replays the whole set every time the server signals readiness.

use std::collections::HashSet;

use parking_lot::RwLock;

use crate::types::DeviceId;

/// Thread-safe set of subscribed device ids.
///
/// Reads (`count`, `contains`, snapshots) share the lock; `add` and `remove`
/// take it exclusively. Adding a present id or removing an absent one is a
/// no-op.
///
/// # Examples
///
/// ```
/// use weatherflow_lib::{DeviceId, DeviceRegistry};
///
/// let registry = DeviceRegistry::new();
/// assert!(registry.add(DeviceId::new(1)));
/// assert!(!registry.add(DeviceId::new(1)));
/// assert_eq!(registry.count(), 1);
/// ```
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: RwLock<HashSet<DeviceId>>,
}

impl DeviceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a device. Returns `true` if it was not already present.
    pub fn add(&self, id: DeviceId) -> bool {
        self.devices.write().insert(id)
    }

    /// Removes a device. Returns `true` if it was present.
    pub fn remove(&self, id: DeviceId) -> bool {
        self.devices.write().remove(&id)
    }

    /// Returns whether a device is registered.
    #[must_use]
    pub fn contains(&self, id: DeviceId) -> bool {
        self.devices.read().contains(&id)
    }

    /// Returns the number of registered devices.
    #[must_use]
    pub fn count(&self) -> usize {
        self.devices.read().len()
    }

    /// Returns the registered devices in ascending order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<DeviceId> {
        let mut ids: Vec<_> = self.devices.read().iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Calls `visitor` for every registered device, in ascending order.
    ///
    /// This is how subscriptions are replayed on a fresh connection. Iterates over a snapshot taken under the read lock, so the visitor
    /// may add or remove devices without deadlocking; such changes are not
    /// seen by the current iteration.
    pub fn for_each(&self, mut visitor: impl FnMut(DeviceId)) {
        for id in self.snapshot() {
            visitor(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn add_then_remove_restores_count() {
        let registry = DeviceRegistry::new();
        registry.add(DeviceId::new(1));
        let before = registry.count();

        assert!(registry.add(DeviceId::new(2)));
        assert!(registry.remove(DeviceId::new(2)));
        assert_eq!(registry.count(), before);
    }

    #[test]
    fn duplicate_add_is_noop() {
        let registry = DeviceRegistry::new();
        assert!(registry.add(DeviceId::new(5)));
        assert!(!registry.add(DeviceId::new(5)));
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn removing_absent_is_noop() {
        let registry = DeviceRegistry::new();
        registry.add(DeviceId::new(5));
        assert!(!registry.remove(DeviceId::new(6)));
        assert_eq!(registry.count(), 1);
        assert!(registry.contains(DeviceId::new(5)));
    }

    #[test]
    fn snapshot_is_sorted() {
        let registry = DeviceRegistry::new();
        for id in [30, 10, 20] {
            registry.add(DeviceId::new(id));
        }
        assert_eq!(
            registry.snapshot(),
            vec![DeviceId::new(10), DeviceId::new(20), DeviceId::new(30)]
        );
    }

    #[test]
    fn visitor_may_mutate_registry() {
        let registry = DeviceRegistry::new();
        registry.add(DeviceId::new(1));
        registry.add(DeviceId::new(2));

        let mut visited = Vec::new();
        registry.for_each(|id| {
            visited.push(id);
            registry.remove(id);
            registry.add(DeviceId::new(id.value() + 100));
        });

        assert_eq!(visited, vec![DeviceId::new(1), DeviceId::new(2)]);
        assert_eq!(
            registry.snapshot(),
            vec![DeviceId::new(101), DeviceId::new(102)]
        );
    }

    #[test]
    fn concurrent_mutation() {
        let registry = Arc::new(DeviceRegistry::new());

        let handles: Vec<_> = (0..8u64)
            .map(|t| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        registry.add(DeviceId::new(t * 1000 + i));
                        let _ = registry.count();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.count(), 800);
    }
}
