// Copyright 2023-, Edge & Node, GraphOps, and Semiotic Labs.
// SPDX-License-Identifier: Apache-2.0

//! # notification-poller
//!
//! Keeps a local copy of a user's portal notifications fresh by polling the
//! portal, backing off when it is unhappy and pausing while nobody is
//! looking.
//!
//! The pieces, bottom-up:
//!
//! - [`client`]: the [`NotificationApi`] seam, its HTTP implementation and
//!   the [`FetchExecutor`] that classifies each attempt into an [`Outcome`];
//! - [`backoff`]: the [`IntervalController`] deciding when to poll next;
//! - [`VisibilityGate`] and [`PollingArbiter`]: when polling may happen and
//!   which instance does it;
//! - [`StateStore`]: the published [`PollingState`];
//! - [`NotificationCenter`]: the mounted engine tying everything together.

pub mod arbiter;
pub mod backoff;
mod center;
pub mod client;
mod polling_loop;
pub mod record;
mod settings;
pub mod store;
#[cfg(any(test, feature = "test"))]
pub mod test_utils;
mod visibility;

pub use arbiter::{InstanceId, PollingArbiter};
pub use backoff::{IntervalController, NextAction};
pub use center::{NotificationCenter, Subscription};
pub use client::{ApiError, FetchExecutor, HttpNotificationClient, NotificationApi, Outcome};
pub use record::{
    ConnectionStatus, NotificationKind, NotificationRecord, NotificationsPage, PollingState,
};
pub use settings::PollerSettings;
pub use store::StateStore;
pub use visibility::VisibilityGate;
