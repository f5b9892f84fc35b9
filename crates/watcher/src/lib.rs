// Copyright 2023-, Edge & Node, GraphOps, and Semiotic Labs.
// SPDX-License-Identifier: Apache-2.0

//! Small helpers on top of `tokio::sync::watch` used to publish state to
//! observers without tying the publisher to any particular UI framework.
//!
//! A publisher owns a `watch::Sender`; observers either hold a receiver
//! directly, derive a narrower receiver with [`map_watcher`], or register a
//! callback with [`watch_pipe`].

use std::future::Future;

use tokio::{
    select,
    sync::watch::{self, Ref},
    task::JoinHandle,
};

/// Derives a receiver that carries `map_function` applied to every value of
/// `receiver`.
///
/// The derived receiver only notifies when the mapped value actually changes,
/// so observers of a single field are not woken by unrelated updates.
pub fn map_watcher<T1, T2, F>(
    mut receiver: watch::Receiver<T1>,
    map_function: F,
) -> watch::Receiver<T2>
where
    T1: Send + Sync + 'static,
    T2: PartialEq + Send + Sync + 'static,
    F: Fn(&T1) -> T2 + Send + 'static,
{
    let initial_value = map_function(&receiver.borrow_and_update());
    let (tx, rx) = watch::channel(initial_value);

    tokio::spawn(async move {
        loop {
            select! {
                changed = receiver.changed() => {
                    if changed.is_err() {
                        tracing::debug!("Watcher source dropped, stopping mapped watcher task");
                        break;
                    }
                }
                _ = tx.closed() => {
                    tracing::debug!("All mapped receivers dropped, stopping mapped watcher task");
                    break;
                }
            }

            let mapped_value = map_function(&receiver.borrow_and_update());
            tx.send_if_modified(|current| {
                if *current == mapped_value {
                    false
                } else {
                    *current = mapped_value;
                    true
                }
            });
        }
    });
    rx
}

/// Runs `function` with the current value, then again on every change.
///
/// The returned handle owns the listener: aborting it unsubscribes. The task
/// also ends on its own once the publisher is dropped.
pub fn watch_pipe<T, F, Fut>(rx: watch::Receiver<T>, function: F) -> JoinHandle<()>
where
    T: Send + Sync + 'static,
    F: Fn(Ref<'_, T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut rx = rx;
        let value = rx.borrow_and_update();
        function(value).await;
        loop {
            match rx.changed().await {
                Ok(()) => {
                    let value = rx.borrow_and_update();
                    function(value).await;
                }
                Err(_) => {
                    tracing::debug!("Watcher source dropped, stopping listener");
                    break;
                }
            }
        }
    })
}
