// Copyright 2023-, Edge & Node, GraphOps, and Semiotic Labs.
// SPDX-License-Identifier: Apache-2.0

mod executor;
mod http_client;

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

pub use executor::{FetchExecutor, Outcome};
pub use http_client::HttpNotificationClient;

use crate::record::NotificationsPage;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("portal responded with status {0}")]
    Status(StatusCode),
    #[error("request failed: {0}")]
    Transport(String),
    #[error("could not decode response: {0}")]
    Decode(String),
}

/// The portal endpoints the notification engine talks to.
#[async_trait]
pub trait NotificationApi: Send + Sync + 'static {
    async fn list_notifications(&self) -> Result<NotificationsPage, ApiError>;

    async fn mark_read(&self, id: &str) -> Result<(), ApiError>;

    async fn mark_all_read(&self) -> Result<(), ApiError>;
}
