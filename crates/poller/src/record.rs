// Copyright 2023-, Edge & Node, GraphOps, and Semiotic Labs.
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The business event a notification was raised for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ReviewRequested,
    ReviewCompleted,
    ApplicationApproved,
    ApplicationRejected,
    FollowUpReminder,
    FollowUpEscalation,
    #[default]
    #[serde(other)]
    Unknown,
}

impl NotificationKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::ReviewRequested => "Review requested",
            Self::ReviewCompleted => "Review completed",
            Self::ApplicationApproved => "Application approved",
            Self::ApplicationRejected => "Application rejected",
            Self::FollowUpReminder => "Follow-up reminder",
            Self::FollowUpEscalation => "Follow-up escalation",
            Self::Unknown => "Notification",
        }
    }

    /// Review notifications carry the submitter in their metadata.
    pub fn is_review(&self) -> bool {
        matches!(self, Self::ReviewRequested | Self::ReviewCompleted)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl NotificationRecord {
    /// Display name of whoever triggered the notification, if the portal sent one.
    pub fn submitter(&self) -> Option<&str> {
        ["submitter_name", "submitted_by"]
            .iter()
            .find_map(|key| self.metadata.get(*key).and_then(Value::as_str))
    }
}

/// Body of the notification list endpoint.
///
/// `unread_count` is tracked independently from the records because the
/// portal may page the list while counting every unread notification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationsPage {
    #[serde(default)]
    pub notifications: Vec<NotificationRecord>,
    #[serde(default)]
    pub unread_count: u64,
}

/// Coarse health of the polling loop as shown to the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Connected,
    RateLimited,
    AuthError,
    Disconnected,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self {
            Self::Connected => "connected",
            Self::RateLimited => "rate_limited",
            Self::AuthError => "auth_error",
            Self::Disconnected => "disconnected",
        };
        f.write_str(status)
    }
}

/// Observable state published to consumers.
#[derive(Debug, Clone, PartialEq)]
pub struct PollingState {
    /// Newest first, in the order the portal returned them.
    pub notifications: Vec<NotificationRecord>,
    pub unread_count: u64,
    pub is_loading: bool,
    pub error: Option<String>,
    /// Time of the last successful fetch.
    pub last_updated: Option<DateTime<Utc>>,
    pub connection_status: ConnectionStatus,
}

impl Default for PollingState {
    fn default() -> Self {
        Self {
            notifications: Vec::new(),
            unread_count: 0,
            is_loading: true,
            error: None,
            last_updated: None,
            connection_status: ConnectionStatus::Connected,
        }
    }
}

impl PollingState {
    /// State of a consumer that is not allowed to see notifications.
    pub fn inert() -> Self {
        Self {
            is_loading: false,
            connection_status: ConnectionStatus::Disconnected,
            ..Default::default()
        }
    }

    /// Number of records in the current list that are still unread.
    ///
    /// This can differ from `unread_count` for a moment after a local
    /// mark-as-read, or when the portal pages the list.
    pub fn unread_in_list(&self) -> usize {
        self.notifications.iter().filter(|n| !n.is_read).count()
    }
}
