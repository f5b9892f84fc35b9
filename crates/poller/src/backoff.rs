// Copyright 2023-, Edge & Node, GraphOps, and Semiotic Labs.
// SPDX-License-Identifier: Apache-2.0

//! Adaptive polling interval.
//!
//! Each fetch [`Outcome`] moves the controller and yields a [`NextAction`]
//! telling the loop when to poll again and whether to keep polling at all.
//! The failure classes are handled differently:
//!
//! - rate limiting multiplies the interval hard and, past a threshold,
//!   suspends polling until a one-shot resume fires;
//! - auth errors stop polling until someone restarts it explicitly;
//! - HTTP and network errors are tolerated quietly until
//!   [`MAX_CONSECUTIVE_ERRORS`] in a row, then the data is dropped as stale
//!   and the interval grows.

use std::time::Duration;

use crate::{client::Outcome, record::ConnectionStatus};

/// Factor applied to the rate limit multiplier on every 429.
const RATE_LIMIT_GROWTH: u32 = 3;
const RATE_LIMIT_MULTIPLIER_CAP: u32 = 20;
/// Past this multiplier the regular loop is suspended.
const RATE_LIMIT_SUSPEND_THRESHOLD: u32 = 5;
pub const MAX_CONSECUTIVE_ERRORS: u32 = 3;
const ERROR_INTERVAL_GROWTH: f64 = 1.5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextAction {
    pub next_interval: Duration,
    pub should_stop_polling: bool,
    /// Set when stopping is temporary: restart once this much time passed.
    pub resume_after: Option<Duration>,
    /// `None` keeps whatever status was shown before.
    pub connection_status: Option<ConnectionStatus>,
    /// The cached notifications can no longer be trusted.
    pub clear_notifications: bool,
}

impl NextAction {
    fn keep_polling(next_interval: Duration, connection_status: Option<ConnectionStatus>) -> Self {
        Self {
            next_interval,
            should_stop_polling: false,
            resume_after: None,
            connection_status,
            clear_notifications: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IntervalController {
    base_interval: Duration,
    max_interval: Duration,
    current_interval: Duration,
    rate_limit_multiplier: u32,
    consecutive_errors: u32,
}

impl IntervalController {
    /// `max_interval` below `base_interval` is raised to it.
    pub fn new(base_interval: Duration, max_interval: Duration) -> Self {
        let max_interval = max_interval.max(base_interval);
        Self {
            base_interval,
            max_interval,
            current_interval: base_interval,
            rate_limit_multiplier: 1,
            consecutive_errors: 0,
        }
    }

    pub fn current_interval(&self) -> Duration {
        self.current_interval
    }

    pub fn rate_limit_multiplier(&self) -> u32 {
        self.rate_limit_multiplier
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    /// Back to the state of a freshly started loop.
    pub fn reset(&mut self) {
        self.current_interval = self.base_interval;
        self.rate_limit_multiplier = 1;
        self.consecutive_errors = 0;
    }

    pub fn on_outcome(&mut self, outcome: &Outcome) -> NextAction {
        match outcome {
            Outcome::Success(_) => {
                self.reset();
                NextAction::keep_polling(self.current_interval, Some(ConnectionStatus::Connected))
            }
            Outcome::RateLimited => self.on_rate_limited(),
            Outcome::AuthError(_) => NextAction {
                next_interval: self.current_interval,
                should_stop_polling: true,
                resume_after: None,
                connection_status: Some(ConnectionStatus::AuthError),
                clear_notifications: false,
            },
            Outcome::HttpError(_) | Outcome::NetworkError(_) => self.on_error(),
            Outcome::Cancelled => NextAction::keep_polling(self.current_interval, None),
        }
    }

    fn on_rate_limited(&mut self) -> NextAction {
        self.rate_limit_multiplier =
            (self.rate_limit_multiplier * RATE_LIMIT_GROWTH).min(RATE_LIMIT_MULTIPLIER_CAP);
        self.current_interval = self.clamp(self.base_interval * self.rate_limit_multiplier);
        self.consecutive_errors += 1;

        let suspend = self.rate_limit_multiplier > RATE_LIMIT_SUSPEND_THRESHOLD;
        NextAction {
            next_interval: self.current_interval,
            should_stop_polling: suspend,
            resume_after: suspend.then_some(self.current_interval),
            connection_status: Some(ConnectionStatus::RateLimited),
            clear_notifications: false,
        }
    }

    fn on_error(&mut self) -> NextAction {
        self.consecutive_errors += 1;
        if self.consecutive_errors < MAX_CONSECUTIVE_ERRORS {
            return NextAction::keep_polling(self.current_interval, None);
        }

        self.current_interval = self.clamp(self.current_interval.mul_f64(ERROR_INTERVAL_GROWTH));
        NextAction {
            next_interval: self.current_interval,
            should_stop_polling: false,
            resume_after: None,
            connection_status: Some(ConnectionStatus::Disconnected),
            clear_notifications: true,
        }
    }

    fn clamp(&self, interval: Duration) -> Duration {
        interval.clamp(self.base_interval, self.max_interval)
    }
}
