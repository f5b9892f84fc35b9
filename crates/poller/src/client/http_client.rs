// Copyright 2023-, Edge & Node, GraphOps, and Semiotic Labs.
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use reqwest::{header, RequestBuilder, Url};

use super::{ApiError, NotificationApi};
use crate::record::NotificationsPage;

const LIST_PATH: &str = "notifications-list";
const MARK_ALL_READ_PATH: &str = "notifications/mark-all-read";
const USER_AGENT: &str = "notification-poller";

/// [`NotificationApi`] over the portal's HTTP endpoints.
#[derive(Debug, Clone)]
pub struct HttpNotificationClient {
    http_client: reqwest::Client,
    base_url: Url,
    list_url: Url,
    mark_all_read_url: Url,
    auth_token: Option<String>,
}

impl HttpNotificationClient {
    pub fn new(
        http_client: reqwest::Client,
        base_url: Url,
        auth_token: Option<String>,
    ) -> Result<Self, url::ParseError> {
        Ok(Self {
            http_client,
            list_url: base_url.join(LIST_PATH)?,
            mark_all_read_url: base_url.join(MARK_ALL_READ_PATH)?,
            base_url,
            auth_token,
        })
    }

    pub fn for_base_url(base_url: &str) -> Result<Self, url::ParseError> {
        Self::new(reqwest::Client::new(), Url::parse(base_url)?, None)
    }

    fn mark_read_url(&self, id: &str) -> Result<Url, ApiError> {
        let mut url = self
            .base_url
            .join("notifications/")
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::Transport(format!("`{}` cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .push(id)
            .push("mark-read");
        Ok(url)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        let req = req.header(header::USER_AGENT, USER_AGENT);
        match self.auth_token.as_ref() {
            Some(token) => req.header(header::AUTHORIZATION, format!("Bearer {token}")),
            None => req,
        }
    }

    async fn send(&self, req: RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let response = self
            .authorize(req)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status(status));
        }
        Ok(response)
    }
}

#[async_trait]
impl NotificationApi for HttpNotificationClient {
    async fn list_notifications(&self) -> Result<NotificationsPage, ApiError> {
        let req = self
            .http_client
            .get(self.list_url.clone())
            .header(header::CACHE_CONTROL, "no-cache")
            .header(header::PRAGMA, "no-cache");

        let body = self
            .send(req)
            .await?
            .bytes()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        serde_json::from_slice(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn mark_read(&self, id: &str) -> Result<(), ApiError> {
        let url = self.mark_read_url(id)?;
        self.send(self.http_client.post(url)).await?;
        Ok(())
    }

    async fn mark_all_read(&self) -> Result<(), ApiError> {
        self.send(self.http_client.post(self.mark_all_read_url.clone()))
            .await?;
        Ok(())
    }
}
