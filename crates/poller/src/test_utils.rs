// Copyright 2023-, Edge & Node, GraphOps, and Semiotic Labs.
// SPDX-License-Identifier: Apache-2.0

//! In-memory [`NotificationApi`] with scripted responses, so scheduling can be
//! tested under a paused clock without sockets.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::StatusCode;

use crate::{
    client::{ApiError, NotificationApi},
    record::{NotificationKind, NotificationRecord, NotificationsPage},
};

/// One scripted reply to a list call.
#[derive(Debug, Clone)]
pub enum Scripted {
    Page(NotificationsPage),
    Fail(ApiError),
    /// Never answers.
    Stall,
}

impl Scripted {
    pub fn status(code: u16) -> Self {
        Self::Fail(ApiError::Status(
            StatusCode::from_u16(code).expect("valid status code"),
        ))
    }
}

pub struct ScriptedApi {
    script: Mutex<VecDeque<Scripted>>,
    fallback: Mutex<Scripted>,
    list_calls: AtomicUsize,
    mark_read_calls: Mutex<Vec<String>>,
    mark_all_read_calls: AtomicUsize,
    fail_mutations: AtomicBool,
}

impl ScriptedApi {
    /// Replies with an empty page once the script runs out.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(Scripted::Page(NotificationsPage::default())),
            list_calls: AtomicUsize::new(0),
            mark_read_calls: Mutex::new(Vec::new()),
            mark_all_read_calls: AtomicUsize::new(0),
            fail_mutations: AtomicBool::new(false),
        })
    }

    pub fn push(&self, reply: Scripted) {
        self.script.lock().unwrap().push_back(reply);
    }

    pub fn set_fallback(&self, reply: Scripted) {
        *self.fallback.lock().unwrap() = reply;
    }

    pub fn fail_mutations(&self, fail: bool) {
        self.fail_mutations.store(fail, Ordering::SeqCst);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn mark_read_calls(&self) -> Vec<String> {
        self.mark_read_calls.lock().unwrap().clone()
    }

    pub fn mark_all_read_calls(&self) -> usize {
        self.mark_all_read_calls.load(Ordering::SeqCst)
    }

    fn mutation_result(&self) -> Result<(), ApiError> {
        if self.fail_mutations.load(Ordering::SeqCst) {
            Err(ApiError::Status(StatusCode::INTERNAL_SERVER_ERROR))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl NotificationApi for ScriptedApi {
    async fn list_notifications(&self) -> Result<NotificationsPage, ApiError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.lock().unwrap().clone());
        match reply {
            Scripted::Page(page) => Ok(page),
            Scripted::Fail(err) => Err(err),
            Scripted::Stall => futures::future::pending().await,
        }
    }

    async fn mark_read(&self, id: &str) -> Result<(), ApiError> {
        self.mark_read_calls.lock().unwrap().push(id.to_string());
        self.mutation_result()
    }

    async fn mark_all_read(&self) -> Result<(), ApiError> {
        self.mark_all_read_calls.fetch_add(1, Ordering::SeqCst);
        self.mutation_result()
    }
}

pub fn record(id: &str, is_read: bool) -> NotificationRecord {
    NotificationRecord {
        id: id.to_string(),
        kind: NotificationKind::ReviewRequested,
        title: format!("Review {id}"),
        message: format!("Application {id} is waiting for review"),
        is_read,
        created_at: Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap(),
        metadata: Default::default(),
    }
}

/// A page whose `unread_count` matches its unread records.
pub fn page(records: Vec<NotificationRecord>) -> NotificationsPage {
    let unread_count = records.iter().filter(|r| !r.is_read).count() as u64;
    NotificationsPage {
        notifications: records,
        unread_count,
    }
}
