// Copyright 2023-, Edge & Node, GraphOps, and Semiotic Labs.
// SPDX-License-Identifier: Apache-2.0

//! The task behind a mounted [`NotificationCenter`](crate::NotificationCenter).
//!
//! The loop first waits for the arbiter token, then reschedules itself after
//! every fetch using the interval the controller hands back. Everything runs
//! on this one task; the only concurrent piece is the fetch itself, which is
//! spawned so commands and visibility changes are still handled while a
//! request is slow.

use std::sync::Arc;

use futures::future::OptionFuture;
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::{JoinError, JoinHandle},
    time::{sleep_until, Instant},
};
use tokio_util::sync::CancellationToken;

use crate::{
    arbiter::{InstanceId, PollingArbiter},
    backoff::{IntervalController, NextAction},
    client::{FetchExecutor, Outcome},
    store::StateStore,
};

#[derive(Debug)]
pub(crate) enum Command {
    /// Reset backoff and fetch now; the sender is answered once the result
    /// has been applied.
    Refetch(oneshot::Sender<()>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Schedule {
    Active { next_tick: Instant },
    /// Rate limited hard; a single resume is pending.
    Suspended { resume_at: Instant },
    /// Stopped until an explicit refetch.
    Halted,
}

impl Schedule {
    fn deadline(&self) -> Option<Instant> {
        match self {
            Self::Active { next_tick } => Some(*next_tick),
            Self::Suspended { resume_at } => Some(*resume_at),
            Self::Halted => None,
        }
    }
}

pub(crate) struct PollingLoop {
    pub(crate) instance: InstanceId,
    pub(crate) executor: Arc<FetchExecutor>,
    pub(crate) controller: IntervalController,
    pub(crate) store: Arc<StateStore>,
    pub(crate) arbiter: Arc<PollingArbiter>,
    pub(crate) visibility: watch::Receiver<bool>,
    pub(crate) commands: mpsc::Receiver<Command>,
    pub(crate) cancel: CancellationToken,
    pub(crate) polling: watch::Sender<bool>,
    pub(crate) debug_mode: bool,
}

struct Running {
    schedule: Schedule,
    in_flight: Option<JoinHandle<Outcome>>,
    waiters: Vec<oneshot::Sender<()>>,
}

impl PollingLoop {
    pub(crate) async fn run(mut self) {
        if !self.claim().await {
            return;
        }
        tracing::info!(instance = %self.instance, "Notification polling started");

        let mut running = Running {
            schedule: Schedule::Active {
                next_tick: Instant::now() + self.controller.current_interval(),
            },
            in_flight: None,
            waiters: Vec::new(),
        };
        self.polling.send_replace(true);
        // edges seen while standing by are covered by this first fetch
        if *self.visibility.borrow_and_update() {
            self.start_fetch(&mut running);
        }

        loop {
            // the next tick is planned from the outcome of the fetch in flight
            let deadline = match running.in_flight {
                Some(_) => None,
                None => running.schedule.deadline(),
            };
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                Some(command) = self.commands.recv() => self.handle_command(&mut running, command),
                Ok(()) = self.visibility.changed() => self.on_visibility_change(&mut running),
                Some(joined) = OptionFuture::from(running.in_flight.as_mut()) => {
                    running.in_flight = None;
                    self.on_fetch_done(&mut running, joined);
                }
                Some(()) = OptionFuture::from(deadline.map(sleep_until)) => self.on_deadline(&mut running),
            }
        }

        self.executor.cancel_in_flight();
        if let Some(in_flight) = running.in_flight.take() {
            in_flight.abort();
        }
        self.polling.send_replace(false);
        if self.arbiter.release(self.instance) {
            tracing::info!(instance = %self.instance, "Notification polling stopped");
        }
    }

    /// Waits until this instance owns the polling token. Returns `false` if
    /// the engine was unmounted first.
    async fn claim(&mut self) -> bool {
        let mut owner = self.arbiter.watch_owner();
        let mut announced = false;
        loop {
            if self.arbiter.try_claim(self.instance) {
                return true;
            }
            if !announced {
                tracing::info!(
                    instance = %self.instance,
                    owner = ?self.arbiter.owner(),
                    "Another instance is already polling, standing by"
                );
                self.store.set_loading(false);
                announced = true;
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return false,
                Some(Command::Refetch(ack)) = self.commands.recv() => {
                    tracing::debug!(instance = %self.instance, "Not polling, ignoring refetch");
                    let _ = ack.send(());
                }
                released = async { owner.wait_for(Option::is_none).await.map(|_| ()) } => {
                    if released.is_err() {
                        return false;
                    }
                }
            }
        }
    }

    fn is_visible(&self) -> bool {
        *self.visibility.borrow()
    }

    fn start_fetch(&self, running: &mut Running) {
        let executor = self.executor.clone();
        self.store.set_loading(true);
        // The superseded task is cancelled by the executor and its result is
        // never looked at.
        running.in_flight = Some(tokio::spawn(async move { executor.fetch_once().await }));
    }

    fn handle_command(&mut self, running: &mut Running, command: Command) {
        match command {
            Command::Refetch(ack) => {
                tracing::debug!(instance = %self.instance, "Refetch requested");
                self.controller.reset();
                running.schedule = Schedule::Active {
                    next_tick: Instant::now() + self.controller.current_interval(),
                };
                self.polling.send_replace(true);

                if self.is_visible() {
                    self.start_fetch(running);
                    running.waiters.push(ack);
                } else {
                    tracing::debug!(instance = %self.instance, "Surface hidden, not fetching");
                    let _ = ack.send(());
                }
            }
        }
    }

    fn on_visibility_change(&mut self, running: &mut Running) {
        let visible = *self.visibility.borrow_and_update();
        if visible && matches!(running.schedule, Schedule::Active { .. }) {
            tracing::debug!(instance = %self.instance, "Surface visible again, fetching now");
            self.start_fetch(running);
        }
    }

    fn on_deadline(&mut self, running: &mut Running) {
        let now = Instant::now();
        match running.schedule {
            Schedule::Active { .. } => {
                running.schedule = Schedule::Active {
                    next_tick: now + self.controller.current_interval(),
                };
                if self.is_visible() {
                    self.start_fetch(running);
                } else {
                    tracing::trace!(instance = %self.instance, "Surface hidden, skipping tick");
                }
            }
            Schedule::Suspended { .. } => {
                tracing::info!(
                    instance = %self.instance,
                    "Rate limit cooldown elapsed, resuming notification polling"
                );
                running.schedule = Schedule::Active {
                    next_tick: now + self.controller.current_interval(),
                };
                self.polling.send_replace(true);
                if self.is_visible() {
                    self.start_fetch(running);
                }
            }
            Schedule::Halted => {}
        }
    }

    fn on_fetch_done(&mut self, running: &mut Running, joined: Result<Outcome, JoinError>) {
        let outcome = joined.unwrap_or_else(|err| {
            tracing::error!(instance = %self.instance, error = %err, "Notification fetch task failed");
            Outcome::NetworkError(err.to_string())
        });
        if outcome == Outcome::Cancelled {
            self.store.set_loading(false);
            return;
        }

        let action = self.controller.on_outcome(&outcome);
        self.log_outcome(&outcome, &action);
        self.store.apply(&outcome, &action);

        let now = Instant::now();
        running.schedule = match (action.should_stop_polling, action.resume_after) {
            (false, _) => Schedule::Active {
                next_tick: now + action.next_interval,
            },
            (true, Some(delay)) => Schedule::Suspended {
                resume_at: now + delay,
            },
            (true, None) => Schedule::Halted,
        };
        self.polling.send_replace(!action.should_stop_polling);

        for waiter in running.waiters.drain(..) {
            let _ = waiter.send(());
        }
    }

    fn log_outcome(&self, outcome: &Outcome, action: &NextAction) {
        let interval_ms = action.next_interval.as_millis() as u64;
        match outcome {
            Outcome::Success(page) => tracing::debug!(
                instance = %self.instance,
                notifications = page.notifications.len(),
                unread = page.unread_count,
                "Fetched notifications"
            ),
            Outcome::RateLimited if action.should_stop_polling => tracing::warn!(
                instance = %self.instance,
                resume_in_ms = interval_ms,
                "Notification endpoint keeps rate limiting, suspending polling"
            ),
            Outcome::RateLimited => tracing::warn!(
                instance = %self.instance,
                interval_ms,
                "Notification endpoint is rate limiting, slowing down"
            ),
            Outcome::AuthError(status) => tracing::warn!(
                instance = %self.instance,
                status = %status,
                "Notification endpoint rejected the session, polling stopped"
            ),
            Outcome::HttpError(_) | Outcome::NetworkError(_) if action.clear_notifications => {
                tracing::warn!(
                    instance = %self.instance,
                    errors = self.controller.consecutive_errors(),
                    interval_ms,
                    "Lost connection to the notification endpoint"
                )
            }
            Outcome::HttpError(status) => tracing::debug!(
                instance = %self.instance,
                status = %status,
                "Notification request failed, keeping last known data"
            ),
            Outcome::NetworkError(error) => tracing::debug!(
                instance = %self.instance,
                error = %error,
                "Notification request failed, keeping last known data"
            ),
            Outcome::Cancelled => {}
        }

        if self.debug_mode {
            tracing::info!(
                instance = %self.instance,
                outcome = outcome.name(),
                interval_ms,
                consecutive_errors = self.controller.consecutive_errors(),
                rate_limit_multiplier = self.controller.rate_limit_multiplier(),
                status = %self.store.connection_status(),
                "Poll cycle"
            );
        }
    }
}
