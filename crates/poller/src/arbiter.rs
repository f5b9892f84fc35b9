// Copyright 2023-, Edge & Node, GraphOps, and Semiotic Labs.
// SPDX-License-Identifier: Apache-2.0

//! Guarantees a single polling loop per process.
//!
//! Every mounted engine gets an [`InstanceId`] and must hold the arbiter's
//! token before it starts polling. The arbiter is an ordinary value shared
//! through an `Arc`, so tests and embedders decide what "process-wide" means.

use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use tokio::sync::watch;

/// Process-unique identity of one mounted engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(u64);

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl InstanceId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        InstanceId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "poller-{}", self.0)
    }
}

#[derive(Debug)]
pub struct PollingArbiter {
    owner: watch::Sender<Option<InstanceId>>,
}

impl Default for PollingArbiter {
    fn default() -> Self {
        Self::new()
    }
}

impl PollingArbiter {
    pub fn new() -> Self {
        let (owner, _) = watch::channel(None);
        Self { owner }
    }

    /// Succeeds when the token is free or already held by `instance`.
    pub fn try_claim(&self, instance: InstanceId) -> bool {
        let mut claimed = false;
        self.owner.send_if_modified(|owner| match owner {
            Some(current) => {
                claimed = *current == instance;
                false
            }
            None => {
                *owner = Some(instance);
                claimed = true;
                true
            }
        });
        claimed
    }

    /// Frees the token, but only if `instance` holds it.
    pub fn release(&self, instance: InstanceId) -> bool {
        self.owner.send_if_modified(|owner| {
            if *owner == Some(instance) {
                *owner = None;
                true
            } else {
                false
            }
        })
    }

    pub fn owner(&self) -> Option<InstanceId> {
        *self.owner.borrow()
    }

    /// Receiver that observes every claim and release.
    pub fn watch_owner(&self) -> watch::Receiver<Option<InstanceId>> {
        self.owner.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_claim_wins() {
        let arbiter = PollingArbiter::new();
        let (a, b) = (InstanceId::new(), InstanceId::new());

        assert!(arbiter.try_claim(a));
        assert!(!arbiter.try_claim(b));
        assert_eq!(arbiter.owner(), Some(a));
    }

    #[test]
    fn test_reclaim_is_idempotent() {
        let arbiter = PollingArbiter::new();
        let a = InstanceId::new();

        assert!(arbiter.try_claim(a));
        assert!(arbiter.try_claim(a));
        assert_eq!(arbiter.owner(), Some(a));
    }

    #[test]
    fn test_only_owner_can_release() {
        let arbiter = PollingArbiter::new();
        let (a, b) = (InstanceId::new(), InstanceId::new());
        arbiter.try_claim(a);

        assert!(!arbiter.release(b));
        assert_eq!(arbiter.owner(), Some(a));

        assert!(arbiter.release(a));
        assert_eq!(arbiter.owner(), None);
        assert!(arbiter.try_claim(b));
    }

    #[tokio::test]
    async fn test_release_is_observable() {
        let arbiter = PollingArbiter::new();
        let a = InstanceId::new();
        arbiter.try_claim(a);
        let mut owner = arbiter.watch_owner();

        arbiter.release(a);

        let free = owner.wait_for(Option::is_none).await.unwrap();
        assert!(free.is_none());
    }

    #[test]
    fn test_instance_ids_are_unique() {
        let ids: std::collections::HashSet<_> = (0..100).map(|_| InstanceId::new()).collect();
        assert_eq!(ids.len(), 100);
    }
}
