// Copyright 2023-, Edge & Node, GraphOps, and Semiotic Labs.
// SPDX-License-Identifier: Apache-2.0

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use reqwest::StatusCode;
use tokio::time::{error::Elapsed, timeout};
use tokio_util::sync::CancellationToken;

use super::{ApiError, NotificationApi};
use crate::record::NotificationsPage;

/// Result of a single fetch attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(NotificationsPage),
    RateLimited,
    AuthError(StatusCode),
    HttpError(StatusCode),
    NetworkError(String),
    /// Superseded by a newer request or stopped on teardown. Not an error.
    Cancelled,
}

impl Outcome {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::RateLimited => "rate_limited",
            Self::AuthError(_) => "auth_error",
            Self::HttpError(_) => "http_error",
            Self::NetworkError(_) => "network_error",
            Self::Cancelled => "cancelled",
        }
    }

    fn classify(
        result: Result<Result<NotificationsPage, ApiError>, Elapsed>,
        limit: Duration,
    ) -> Self {
        match result {
            Ok(Ok(page)) => Self::Success(page),
            Ok(Err(ApiError::Status(status))) => match status {
                StatusCode::TOO_MANY_REQUESTS => Self::RateLimited,
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Self::AuthError(status),
                _ => Self::HttpError(status),
            },
            Ok(Err(ApiError::Transport(message) | ApiError::Decode(message))) => {
                Self::NetworkError(message)
            }
            Err(_) => Self::NetworkError(format!("request timed out after {limit:?}")),
        }
    }
}

/// Issues list requests with at most one of them in flight.
///
/// Starting a fetch cancels whatever fetch is still running, so a slow stale
/// response can never land after a newer one.
pub struct FetchExecutor {
    api: Arc<dyn NotificationApi>,
    request_timeout: Duration,
    in_flight: Mutex<InFlight>,
}

#[derive(Default)]
struct InFlight {
    generation: u64,
    token: Option<CancellationToken>,
}

impl FetchExecutor {
    pub fn new(api: Arc<dyn NotificationApi>, request_timeout: Duration) -> Self {
        Self {
            api,
            request_timeout,
            in_flight: Mutex::new(InFlight::default()),
        }
    }

    pub async fn fetch_once(&self) -> Outcome {
        let token = CancellationToken::new();
        let generation = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(previous) = in_flight.token.replace(token.clone()) {
                tracing::debug!("Cancelling superseded notification request");
                previous.cancel();
            }
            in_flight.generation += 1;
            in_flight.generation
        };

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            result = timeout(self.request_timeout, self.api.list_notifications()) => Some(result),
        };

        {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            if in_flight.generation == generation {
                in_flight.token = None;
            }
        }

        match result {
            // a response that raced with its own cancellation is still stale
            Some(_) if token.is_cancelled() => Outcome::Cancelled,
            Some(result) => Outcome::classify(result, self.request_timeout),
            None => Outcome::Cancelled,
        }
    }

    /// Cancels the request in flight, if any, without issuing a new one.
    pub fn cancel_in_flight(&self) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(token) = in_flight.token.take() {
            token.cancel();
        }
    }
}
