// Copyright 2023-, Edge & Node, GraphOps, and Semiotic Labs.
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use notification_config::Config;

/// Knobs of one mounted engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerSettings {
    pub base_interval: Duration,
    pub max_interval: Duration,
    pub request_timeout: Duration,
    pub can_show_notifications: bool,
    pub debug_mode: bool,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_secs(30),
            max_interval: Duration::from_secs(300),
            request_timeout: Duration::from_secs(30),
            can_show_notifications: true,
            debug_mode: false,
        }
    }
}

impl From<&Config> for PollerSettings {
    fn from(config: &Config) -> Self {
        Self {
            base_interval: config.polling.base_interval_secs,
            max_interval: config.polling.max_interval_secs,
            request_timeout: config.endpoint.request_timeout_secs,
            can_show_notifications: config.features.can_show_notifications,
            debug_mode: config.features.debug_mode,
        }
    }
}
