// Copyright 2023-, Edge & Node, GraphOps, and Semiotic Labs.
// SPDX-License-Identifier: Apache-2.0

use chrono::Utc;
use tokio::sync::watch;

use crate::{
    backoff::NextAction,
    client::Outcome,
    record::{ConnectionStatus, PollingState},
};

const RATE_LIMITED_MESSAGE: &str = "Too many requests, notifications will refresh later";
const DISCONNECTED_MESSAGE: &str = "Unable to load notifications";

/// Holds the published [`PollingState`].
///
/// Every update is a single `send_modify`/`send_if_modified`, so observers
/// never see a partially applied change.
#[derive(Debug)]
pub struct StateStore {
    tx: watch::Sender<PollingState>,
}

impl StateStore {
    pub fn new(initial: PollingState) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    pub fn snapshot(&self) -> PollingState {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PollingState> {
        self.tx.subscribe()
    }

    pub fn set_loading(&self, loading: bool) {
        self.tx.send_if_modified(|state| {
            let changed = state.is_loading != loading;
            state.is_loading = loading;
            changed
        });
    }

    /// Applies the result of one fetch cycle.
    ///
    /// Isolated errors leave the last good data and status in place; only
    /// what the controller escalated becomes visible.
    pub fn apply(&self, outcome: &Outcome, action: &NextAction) {
        if matches!(outcome, Outcome::Cancelled) {
            return;
        }

        self.tx.send_modify(|state| {
            state.is_loading = false;
            if let Some(status) = action.connection_status {
                state.connection_status = status;
            }

            match outcome {
                Outcome::Success(page) => {
                    state.notifications = page.notifications.clone();
                    state.unread_count = page.unread_count;
                    state.error = None;
                    state.last_updated = Some(Utc::now());
                }
                Outcome::RateLimited => {
                    state.error = Some(RATE_LIMITED_MESSAGE.to_string());
                }
                // Retrying cannot help until the user signs in again
                Outcome::AuthError(_) => {
                    state.error = None;
                }
                Outcome::HttpError(_) | Outcome::NetworkError(_) => {
                    if action.clear_notifications {
                        state.notifications.clear();
                        state.unread_count = 0;
                        state.error = Some(DISCONNECTED_MESSAGE.to_string());
                    }
                }
                Outcome::Cancelled => {}
            }
        });
    }

    /// Flips the matching record to read.
    ///
    /// The count only drops when a record actually changes, so repeating the
    /// call for the same id is harmless.
    pub fn mark_read_locally(&self, id: &str) -> bool {
        self.tx.send_if_modified(|state| {
            let Some(record) = state
                .notifications
                .iter_mut()
                .find(|record| record.id == id && !record.is_read)
            else {
                return false;
            };
            record.is_read = true;
            state.unread_count = state.unread_count.saturating_sub(1);
            true
        })
    }

    pub fn mark_all_read_locally(&self) {
        self.tx.send_if_modified(|state| {
            let changed = state.unread_count != 0 || state.unread_in_list() != 0;
            for record in state.notifications.iter_mut() {
                record.is_read = true;
            }
            state.unread_count = 0;
            changed
        });
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.tx.borrow().connection_status
    }
}
