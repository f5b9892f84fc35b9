// Copyright 2023-, Edge & Node, GraphOps, and Semiotic Labs.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use tokio::sync::watch;

/// Whether the surface showing notifications is currently visible.
///
/// The embedding environment flips it with [`VisibilityGate::set_visible`];
/// polling reads it at every tick. Clones share the same signal.
#[derive(Debug, Clone)]
pub struct VisibilityGate {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for VisibilityGate {
    fn default() -> Self {
        Self::new(true)
    }
}

impl VisibilityGate {
    pub fn new(visible: bool) -> Self {
        let (tx, _) = watch::channel(visible);
        Self { tx: Arc::new(tx) }
    }

    pub fn is_visible(&self) -> bool {
        *self.tx.borrow()
    }

    /// Only notifies subscribers on an actual transition.
    pub fn set_visible(&self, visible: bool) {
        self.tx.send_if_modified(|current| {
            if *current == visible {
                false
            } else {
                tracing::debug!(visible, "Visibility changed");
                *current = visible;
                true
            }
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_transitions_notify_subscribers() {
        let gate = VisibilityGate::default();
        let mut rx = gate.subscribe();
        assert!(gate.is_visible());

        gate.set_visible(false);
        rx.changed().await.unwrap();
        assert!(!*rx.borrow_and_update());
        assert!(!gate.clone().is_visible());
    }

    #[tokio::test]
    async fn test_repeated_value_is_not_a_transition() {
        let gate = VisibilityGate::new(false);
        let rx = gate.subscribe();

        gate.set_visible(false);

        assert!(!rx.has_changed().unwrap());
    }
}
