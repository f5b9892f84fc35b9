// Copyright 2023-, Edge & Node, GraphOps, and Semiotic Labs.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use notification_watcher::{map_watcher, watch_pipe};
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::{
    arbiter::{InstanceId, PollingArbiter},
    backoff::IntervalController,
    client::{FetchExecutor, NotificationApi},
    polling_loop::{Command, PollingLoop},
    record::PollingState,
    settings::PollerSettings,
    store::StateStore,
    visibility::VisibilityGate,
};

const COMMAND_BUFFER: usize = 8;

/// Handle to one mounted notification engine.
///
/// Mounting spawns the polling task. Only the instance holding the
/// [`PollingArbiter`] token polls; the others stand by and take over once the
/// owner is unmounted. Dropping the handle stops the task as well.
pub struct NotificationCenter {
    instance: InstanceId,
    store: Arc<StateStore>,
    api: Arc<dyn NotificationApi>,
    polling: watch::Receiver<bool>,
    /// Keeps the visibility sender alive for as long as the engine runs.
    visibility: VisibilityGate,
    /// `None` when notifications are disabled for this session.
    commands: Option<mpsc::Sender<Command>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl NotificationCenter {
    /// Starts the engine. Must be called within a tokio runtime.
    pub fn mount(
        api: Arc<dyn NotificationApi>,
        arbiter: Arc<PollingArbiter>,
        visibility: VisibilityGate,
        settings: PollerSettings,
    ) -> Self {
        let instance = InstanceId::new();
        let cancel = CancellationToken::new();
        let (polling_tx, polling) = watch::channel(false);

        if !settings.can_show_notifications {
            tracing::debug!(%instance, "Notifications disabled, engine stays inert");
            return Self {
                instance,
                store: Arc::new(StateStore::new(PollingState::inert())),
                api,
                polling,
                visibility,
                commands: None,
                cancel,
                task: None,
            };
        }

        let store = Arc::new(StateStore::new(PollingState::default()));
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let polling_loop = PollingLoop {
            instance,
            executor: Arc::new(FetchExecutor::new(api.clone(), settings.request_timeout)),
            controller: IntervalController::new(settings.base_interval, settings.max_interval),
            store: store.clone(),
            arbiter,
            visibility: visibility.subscribe(),
            commands: command_rx,
            cancel: cancel.clone(),
            polling: polling_tx,
            debug_mode: settings.debug_mode,
        };
        let task = tokio::spawn(polling_loop.run());

        Self {
            instance,
            store,
            api,
            polling,
            visibility,
            commands: Some(command_tx),
            cancel,
            task: Some(task),
        }
    }

    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    /// The gate this engine was mounted with. Clones share the signal.
    pub fn visibility(&self) -> &VisibilityGate {
        &self.visibility
    }

    pub fn state(&self) -> PollingState {
        self.store.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<PollingState> {
        self.store.subscribe()
    }

    pub fn unread_count(&self) -> u64 {
        self.store.snapshot().unread_count
    }

    /// Receiver that only wakes up when the unread count changes.
    pub fn watch_unread_count(&self) -> watch::Receiver<u64> {
        map_watcher(self.store.subscribe(), |state| state.unread_count)
    }

    /// Calls `listener` with the current state and after every change until
    /// the returned [`Subscription`] is dropped.
    pub fn on_change<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&PollingState) + Send + Sync + 'static,
    {
        let task = watch_pipe(self.store.subscribe(), move |state| {
            listener(&state);
            std::future::ready(())
        });
        Subscription { task }
    }

    /// Whether this instance is the one currently polling.
    pub fn is_polling(&self) -> bool {
        *self.polling.borrow()
    }

    /// Fetches right away with backoff reset, restarting a loop that was
    /// stopped or suspended. Resolves once the result has been applied.
    pub async fn refetch(&self) {
        let Some(commands) = &self.commands else {
            return;
        };
        let (ack_tx, ack_rx) = oneshot::channel();
        if commands.send(Command::Refetch(ack_tx)).await.is_err() {
            tracing::debug!(instance = %self.instance, "Polling task gone, refetch ignored");
            return;
        }
        // a dropped sender means the task stopped first
        let _ = ack_rx.await;
    }

    /// Marks one notification read on the portal, then locally.
    ///
    /// Failures are logged and otherwise ignored; the next successful fetch
    /// brings the list back in sync.
    pub async fn mark_as_read(&self, id: &str) {
        if self.commands.is_none() {
            return;
        }
        match self.api.mark_read(id).await {
            Ok(()) => {
                if !self.store.mark_read_locally(id) {
                    tracing::trace!(instance = %self.instance, id, "Notification already read");
                }
            }
            Err(err) => tracing::warn!(
                instance = %self.instance,
                id,
                error = %err,
                "Failed to mark notification as read"
            ),
        }
    }

    pub async fn mark_all_as_read(&self) {
        if self.commands.is_none() {
            return;
        }
        match self.api.mark_all_read().await {
            Ok(()) => self.store.mark_all_read_locally(),
            Err(err) => tracing::warn!(
                instance = %self.instance,
                error = %err,
                "Failed to mark all notifications as read"
            ),
        }
    }

    /// Stops polling, cancels any request in flight and hands the arbiter
    /// token to the next instance.
    pub async fn unmount(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                tracing::error!(instance = %self.instance, error = %err, "Polling task failed");
            }
        }
    }
}

impl Drop for NotificationCenter {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Keeps an [`NotificationCenter::on_change`] listener registered.
#[must_use = "the listener is removed when the subscription is dropped"]
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
